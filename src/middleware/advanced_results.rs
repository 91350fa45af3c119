//! Listing augmentation.
//!
//! [`AdvancedResults`] answers the query-string language of [`crate::query`] for one model
//! before the handler runs: it counts, fetches the requested page, projects `select`,
//! resolves the configured reference and leaves an [`AdvancedResultsBody`] in the request
//! extensions for the handler to return. Requests routed with the link's scoping parameter
//! (see [`AdvancedResults::skip_under`]) pass through untouched.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, RawPathParams},
    http::{Uri, request::Parts},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Flow, Interceptor, RequestContext};
use crate::{
    AppState,
    error::ApiResult,
    models::COURSE_SCHEMA,
    query::{Filter, ListQuery, Pagination, Populate, Schema, retain_fields},
    repository::{RepoError, Repository},
};

/// Model
///
/// The collection an `AdvancedResults` link queries. Records travel as their serialized
/// JSON form so projection and population stay model-agnostic.
#[async_trait]
pub trait Model: Send + Sync + 'static {
    fn schema(&self) -> &'static Schema;

    async fn count(&self, repo: &dyn Repository, filters: &[Filter]) -> Result<u64, RepoError>;

    async fn find(&self, repo: &dyn Repository, query: &ListQuery)
    -> Result<Vec<Value>, RepoError>;

    /// Loads the records referenced through `path`, keyed by id. `None` if `path` is not a
    /// reference of this model.
    async fn resolve(
        &self,
        repo: &dyn Repository,
        path: &str,
        ids: &[Uuid],
    ) -> Result<Option<HashMap<Uuid, Value>>, RepoError>;
}

/// Courses, with `bootcamp` as their only resolvable reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseModel;

#[async_trait]
impl Model for CourseModel {
    fn schema(&self) -> &'static Schema {
        &COURSE_SCHEMA
    }

    async fn count(&self, repo: &dyn Repository, filters: &[Filter]) -> Result<u64, RepoError> {
        repo.count_courses(filters).await
    }

    async fn find(
        &self,
        repo: &dyn Repository,
        query: &ListQuery,
    ) -> Result<Vec<Value>, RepoError> {
        let courses = repo.find_courses(query).await?;
        courses
            .iter()
            .map(|course| serde_json::to_value(course).map_err(RepoError::from))
            .collect()
    }

    async fn resolve(
        &self,
        repo: &dyn Repository,
        path: &str,
        ids: &[Uuid],
    ) -> Result<Option<HashMap<Uuid, Value>>, RepoError> {
        if path != "bootcamp" {
            return Ok(None);
        }

        let mut resolved = HashMap::with_capacity(ids.len());
        for bootcamp in repo.get_bootcamps(ids).await? {
            resolved.insert(bootcamp.id, serde_json::to_value(&bootcamp)?);
        }
        Ok(Some(resolved))
    }
}

/// AdvancedResultsBody
///
/// The finished listing, exactly as `GET` returns it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvancedResultsBody {
    pub success: bool,
    /// Records on this page.
    pub count: usize,
    pub pagination: Pagination,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Value>,
}

/// AdvancedResults
///
/// Interceptor running a listing query for model `M`, optionally populating one reference.
pub struct AdvancedResults<M> {
    model: M,
    populate: Option<Populate>,
    skip_under: Option<&'static str>,
}

impl<M: Model> AdvancedResults<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            populate: None,
            skip_under: None,
        }
    }

    /// Leaves requests whose route captured `param` to the handler, without parsing the
    /// query string or touching the store.
    pub fn skip_under(mut self, param: &'static str) -> Self {
        self.skip_under = Some(param);
        self
    }

    async fn skipped(&self, parts: &mut Parts) -> bool {
        let Some(param) = self.skip_under else {
            return false;
        };
        RawPathParams::from_request_parts(parts, &())
            .await
            .is_ok_and(|params| params.iter().any(|(key, _)| key == param))
    }

    /// Replaces the `path` reference of every record with the referenced record, reduced
    /// to the space separated `select` fields.
    pub fn populate(mut self, path: &'static str, select: &'static str) -> Self {
        self.populate = Some(Populate::new(path, select));
        self
    }

    async fn run(&self, uri: &Uri, state: &AppState) -> ApiResult<AdvancedResultsBody> {
        let repo = state.repo.as_ref();
        let query = ListQuery::from_uri(uri, self.model.schema())?;

        let total = self.model.count(repo, &query.filters).await?;
        let mut data = self.model.find(repo, &query).await?;

        if let Some(fields) = &query.select {
            let mut keep: Vec<&str> = fields.iter().map(|f| f.name).collect();
            keep.push("id");
            for doc in &mut data {
                retain_fields(doc, &keep);
            }
        }

        if let Some(populate) = &self.populate {
            self.populate_docs(repo, populate, &mut data).await?;
        }

        tracing::debug!(
            table = self.model.schema().table,
            total,
            page = query.page,
            limit = query.limit,
            returned = data.len(),
            "advanced results"
        );

        Ok(AdvancedResultsBody {
            success: true,
            count: data.len(),
            pagination: query.pagination(total),
            data,
        })
    }

    async fn populate_docs(
        &self,
        repo: &dyn Repository,
        populate: &Populate,
        data: &mut [Value],
    ) -> ApiResult<()> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = data
            .iter()
            .filter_map(|doc| reference(doc, populate.path))
            .filter(|id| seen.insert(*id))
            .collect();

        let Some(mut resolved) = self.model.resolve(repo, populate.path, &ids).await? else {
            tracing::warn!(path = populate.path, "populate path is not a reference");
            return Ok(());
        };

        for target in resolved.values_mut() {
            retain_fields(target, &populate.select);
        }

        for doc in data.iter_mut() {
            // Projected away by `select`.
            let Some(slot) = doc.get_mut(populate.path) else {
                continue;
            };
            let replacement = slot
                .as_str()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .and_then(|id| resolved.get(&id).cloned())
                .unwrap_or(Value::Null);
            *slot = replacement;
        }
        Ok(())
    }
}

fn reference(doc: &Value, path: &str) -> Option<Uuid> {
    doc.get(path)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[async_trait]
impl<M: Model> Interceptor for AdvancedResults<M> {
    fn name(&self) -> &'static str {
        "advanced_results"
    }

    async fn handle(&self, ctx: &mut RequestContext<'_>) -> Flow {
        if self.skipped(&mut *ctx.parts).await {
            return Flow::Continue;
        }

        match self.run(&ctx.parts.uri, ctx.state).await {
            Ok(body) => {
                ctx.parts.extensions.insert(body);
                Flow::Continue
            }
            Err(err) => Flow::ShortCircuit(err.into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::{
        AppConfig,
        error::ApiError,
        models::{Bootcamp, Course},
        repository::InMemoryRepository,
    };

    fn seeded() -> (AppState, Bootcamp) {
        let repo = InMemoryRepository::new();
        let camp = Bootcamp {
            id: Uuid::new_v4(),
            user: Uuid::new_v4(),
            name: "Devworks Bootcamp".into(),
            description: "Full stack".into(),
        };
        repo.insert_bootcamp(camp.clone());

        let now = Utc::now();
        for (i, tuition) in [8000.0, 12000.0, 6000.0].into_iter().enumerate() {
            repo.insert_course(Course {
                id: Uuid::new_v4(),
                title: format!("Course {i}"),
                tuition,
                bootcamp: camp.id,
                created_at: now - Duration::minutes(i as i64),
                ..Course::default()
            });
        }
        // Points at a bootcamp that no longer exists.
        repo.insert_course(Course {
            id: Uuid::new_v4(),
            title: "Orphan".into(),
            tuition: 1.0,
            bootcamp: Uuid::new_v4(),
            created_at: now - Duration::hours(1),
            ..Course::default()
        });

        let state = AppState {
            repo: Arc::new(repo),
            config: AppConfig::default(),
        };
        (state, camp)
    }

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn populates_bootcamp_with_name_and_description_only() {
        let (state, camp) = seeded();
        let results = AdvancedResults::new(CourseModel).populate("bootcamp", "name description");

        let body = results.run(&uri("/?sort=-tuition&limit=1"), &state).await.unwrap();

        assert_eq!(body.count, 1);
        assert_eq!(body.data[0]["title"], "Course 1");
        assert_eq!(
            body.data[0]["bootcamp"],
            json!({ "name": camp.name, "description": camp.description })
        );
        assert_eq!(body.pagination.next.map(|p| p.page), Some(2));
        assert!(body.pagination.prev.is_none());
    }

    #[tokio::test]
    async fn dangling_reference_populates_as_null() {
        let (state, _) = seeded();
        let results = AdvancedResults::new(CourseModel).populate("bootcamp", "name description");

        let body = results.run(&uri("/?title=Orphan"), &state).await.unwrap();

        assert_eq!(body.count, 1);
        assert!(body.data[0]["bootcamp"].is_null());
    }

    #[tokio::test]
    async fn select_projects_fields_and_keeps_id() {
        let (state, _) = seeded();
        let results = AdvancedResults::new(CourseModel).populate("bootcamp", "name description");

        let body = results
            .run(&uri("/?select=title&tuition%5Bgte%5D=7000"), &state)
            .await
            .unwrap();

        assert_eq!(body.count, 2);
        for doc in &body.data {
            let keys: HashSet<_> = doc.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys, HashSet::from(["id".to_string(), "title".to_string()]));
        }
    }

    #[tokio::test]
    async fn bad_query_is_a_bad_request() {
        let (state, _) = seeded();
        let results = AdvancedResults::new(CourseModel);

        let err = results.run(&uri("/?secret=1"), &state).await.unwrap_err();
        assert!(matches!(err, ApiError::Query(_)));
    }
}
