//! Minimal job snapshot reads. Job CRUD lives outside this core; the
//! notification paths only need to resolve and snapshot job rows.

use sqlx::PgPool;
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::Job;

pub struct JobService;

impl JobService {
    /// Fetch a job by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Job, AppError> {
        let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        Ok(job)
    }
}
