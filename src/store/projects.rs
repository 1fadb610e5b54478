// src/store/projects.rs
// Project collection: upsert keyed by slug, filtered retrieval sorted by
// recency. Status and priority round-trip as strings; unknown stored values
// fall back to their defaults on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::records::{Priority, Project, ProjectStatus};

/// Whitelisted exact-match predicates for project queries. Unknown query
/// parameters are dropped at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub stakeholder: Option<String>,
    pub planner: Option<String>,
}

impl ProjectFilter {
    /// In-memory equivalent of the SQL predicates, used by the cache-backed
    /// deployment variant.
    pub fn matches(&self, project: &Project) -> bool {
        self.status
            .as_deref()
            .is_none_or(|v| project.status.to_string() == v)
            && self
                .priority
                .as_deref()
                .is_none_or(|v| project.priority.to_string() == v)
            && self
                .stakeholder
                .as_deref()
                .is_none_or(|v| project.stakeholder.as_deref() == Some(v))
            && self
                .planner
                .as_deref()
                .is_none_or(|v| project.planner.as_deref() == Some(v))
    }
}

const UPSERT: &str = r#"
INSERT INTO projects
    (slug, title, objective, success_metrics, status, priority,
     stakeholder, planner, target_date, last_updated, path)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(slug) DO UPDATE SET
    title = excluded.title,
    objective = excluded.objective,
    success_metrics = excluded.success_metrics,
    status = excluded.status,
    priority = excluded.priority,
    stakeholder = excluded.stakeholder,
    planner = excluded.planner,
    target_date = excluded.target_date,
    last_updated = excluded.last_updated,
    path = excluded.path
"#;

const SELECT: &str = "SELECT slug, title, objective, success_metrics, status, priority, \
     stakeholder, planner, target_date, last_updated, path FROM projects";

#[derive(Clone)]
pub struct ProjectStore {
    pool: SqlitePool,
}

impl ProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-replace by slug.
    pub async fn store(&self, project: &Project) -> Result<()> {
        upsert_query(project)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store project {}", project.slug))?;
        Ok(())
    }

    pub async fn get(&self, slug: &str) -> Result<Option<Project>> {
        let row = sqlx::query(&format!("{SELECT} WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch project")?;
        Ok(row.as_ref().map(row_to_project))
    }

    /// All projects matching the filter, most recently updated first.
    pub async fn get_all(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("{SELECT} WHERE 1 = 1"));
        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = &filter.priority {
            query.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(stakeholder) = &filter.stakeholder {
            query.push(" AND stakeholder = ").push_bind(stakeholder.as_str());
        }
        if let Some(planner) = &filter.planner {
            query.push(" AND planner = ").push_bind(planner.as_str());
        }
        query.push(" ORDER BY last_updated DESC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list projects")?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    /// Idempotent; reports whether a record actually existed.
    pub async fn delete(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await
            .context("Failed to delete project")?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert a whole scan's worth of projects in one transaction.
    pub async fn store_batch(&self, projects: &[Project]) -> Result<usize> {
        if projects.is_empty() {
            return Ok(0);
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin project batch")?;
        for project in projects {
            upsert_query(project)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to store project {}", project.slug))?;
        }
        tx.commit().await.context("Failed to commit project batch")?;
        Ok(projects.len())
    }
}

fn upsert_query(
    project: &Project,
) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(UPSERT)
        .bind(&project.slug)
        .bind(&project.title)
        .bind(&project.objective)
        .bind(serde_json::to_string(&project.success_metrics).unwrap_or_else(|_| "[]".into()))
        .bind(project.status.to_string())
        .bind(project.priority.to_string())
        .bind(&project.stakeholder)
        .bind(&project.planner)
        .bind(&project.target_date)
        .bind(project.last_updated.timestamp())
        .bind(&project.path)
}

fn row_to_project(row: &SqliteRow) -> Project {
    let metrics_json: String = row.get("success_metrics");
    Project {
        slug: row.get("slug"),
        title: row.get("title"),
        objective: row.get("objective"),
        success_metrics: serde_json::from_str(&metrics_json).unwrap_or_default(),
        status: row
            .get::<String, _>("status")
            .parse()
            .unwrap_or(ProjectStatus::Active),
        priority: row
            .get::<String, _>("priority")
            .parse()
            .unwrap_or(Priority::P2),
        stakeholder: row.get("stakeholder"),
        planner: row.get("planner"),
        target_date: row.get("target_date"),
        last_updated: DateTime::from_timestamp(row.get("last_updated"), 0)
            .unwrap_or_else(Utc::now),
        path: row.get("path"),
    }
}
