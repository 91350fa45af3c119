use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{Bootcamp, Course, NewCourse, UpdateCourseRequest, User},
    query::{Filter, ListQuery},
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Persistence failures. Unique-key violations are split out so the API can report them
/// as client errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate key violates `{0}`")]
    Duplicate(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode record: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                return RepoError::Duplicate(db.constraint().unwrap_or("unique").to_string());
            }
        }
        RepoError::Database(err)
    }
}

/// Repository
///
/// Every persistence operation the courses API needs. Handlers, the authentication
/// extractor and the advanced-results interceptor only ever see `Arc<dyn Repository>`,
/// so tests can substitute any implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    // --- Bootcamps (read-only here) ---
    async fn get_bootcamp(&self, id: Uuid) -> Result<Option<Bootcamp>, RepoError>;
    // Batch lookup used to populate course listings. Unknown ids are skipped.
    async fn get_bootcamps(&self, ids: &[Uuid]) -> Result<Vec<Bootcamp>, RepoError>;

    // --- Course listing ---
    // Total number of courses matching `filters`, ignoring paging.
    async fn count_courses(&self, filters: &[Filter]) -> Result<u64, RepoError>;
    // One page of courses, filtered and sorted as requested.
    async fn find_courses(&self, query: &ListQuery) -> Result<Vec<Course>, RepoError>;
    async fn get_bootcamp_courses(&self, bootcamp_id: Uuid) -> Result<Vec<Course>, RepoError>;

    // --- Course CRUD ---
    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepoError>;
    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError>;
    // Partial update; `None` when the course does not exist.
    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepoError>;
    // True when a row was removed.
    async fn delete_course(&self, id: Uuid) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
