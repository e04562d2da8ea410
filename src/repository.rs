use crate::db_types::{CandidateRecord, JobDescriptionRecord, NewCandidate, NewJobDescription};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::{debug, error};

pub type DbResult<T> = Result<T, sqlx::Error>;

/// Candidate and job description persistence.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn insert_candidate(&self, candidate: &NewCandidate) -> DbResult<i64>;
    /// Whether a candidate with this (non-empty) email or phone number is already stored.
    async fn candidate_exists(&self, email: &str, phone_number: &str) -> DbResult<bool>;
    async fn get_candidate(&self, id: i64) -> DbResult<Option<CandidateRecord>>;
    async fn list_candidates(&self) -> DbResult<Vec<CandidateRecord>>;
    /// Returns `false` when no candidate has this id.
    async fn update_status(&self, id: i64, status: &str) -> DbResult<bool>;
    async fn insert_job_description(&self, jd: &NewJobDescription) -> DbResult<i64>;
    async fn get_job_description(&self, id: i64) -> DbResult<Option<JobDescriptionRecord>>;
    async fn list_job_descriptions(&self) -> DbResult<Vec<JobDescriptionRecord>>;
}

pub async fn connect(database_url: &str) -> DbResult<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to connect to database");
            e
        })?;
    sqlx::migrate!().run(&pool).await.map_err(|e| {
        error!(error=%e, "failed to run migrations");
        sqlx::Error::from(e)
    })?;
    Ok(pool)
}

pub struct PgCandidateRepository {
    pool: Pool<Postgres>,
}

impl PgCandidateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn insert_candidate(&self, candidate: &NewCandidate) -> DbResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "
            insert into candidates (
              name,
              skills,
              education,
              certifications,
              experience,
              email,
              phone_number,
              linkedin,
              score,
              status
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
            )
            returning id
            ",
        )
        .bind(&candidate.name)
        .bind(&candidate.skills)
        .bind(&candidate.education)
        .bind(&candidate.certifications)
        .bind(&candidate.experience)
        .bind(&candidate.email)
        .bind(&candidate.phone_number)
        .bind(&candidate.linkedin)
        .bind(candidate.score)
        .bind(&candidate.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to insert candidate row");
            e
        })?;
        debug!(id, name=%candidate.name, "inserted candidate");
        Ok(id)
    }

    async fn candidate_exists(&self, email: &str, phone_number: &str) -> DbResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "
            select exists (
              select 1
              from candidates
              where ($1 <> '' and email = $1)
                 or ($2 <> '' and phone_number = $2)
            )
            ",
        )
        .bind(email)
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_candidate(&self, id: i64) -> DbResult<Option<CandidateRecord>> {
        sqlx::query_as::<_, CandidateRecord>(
            "
            select *
            from candidates
            where id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_candidates(&self) -> DbResult<Vec<CandidateRecord>> {
        sqlx::query_as::<_, CandidateRecord>("select * from candidates order by id")
            .fetch_all(&self.pool)
            .await
    }

    async fn update_status(&self, id: i64, status: &str) -> DbResult<bool> {
        let result = sqlx::query("update candidates set status = $1 where id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error=%e, id, "failed to update candidate status");
                e
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_job_description(&self, jd: &NewJobDescription) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "
            insert into job_descriptions (
              title,
              company,
              location,
              employment_type,
              salary,
              experience,
              description,
              requirements,
              responsibilities,
              skills,
              benefits
            ) values (
              $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11
            )
            returning id
            ",
        )
        .bind(&jd.title)
        .bind(&jd.company)
        .bind(&jd.location)
        .bind(&jd.employment_type)
        .bind(&jd.salary)
        .bind(&jd.experience)
        .bind(&jd.description)
        .bind(&jd.requirements)
        .bind(&jd.responsibilities)
        .bind(&jd.skills)
        .bind(&jd.benefits)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error=%e, "failed to insert job description row");
            e
        })
    }

    async fn get_job_description(&self, id: i64) -> DbResult<Option<JobDescriptionRecord>> {
        sqlx::query_as::<_, JobDescriptionRecord>("select * from job_descriptions where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_job_descriptions(&self) -> DbResult<Vec<JobDescriptionRecord>> {
        sqlx::query_as::<_, JobDescriptionRecord>("select * from job_descriptions order by id")
            .fetch_all(&self.pool)
            .await
    }
}
