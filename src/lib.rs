use axum::{Router, extract::FromRef, http::HeaderName, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod repository;

// Per-route interceptor chains (authentication, authorization, advanced results).
pub mod middleware;

// One router per resource.
pub mod routes;
use routes::courses;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// Mount point of the standalone course router.
pub const COURSES_PATH: &str = "/api/v1/courses";
/// Mount point of the course router nested under its bootcamp.
pub const BOOTCAMP_COURSES_PATH: &str = "/api/v1/bootcamps/{bootcamp_id}/courses";

const X_REQUEST_ID: &str = "x-request-id";

/// ApiDoc
///
/// OpenAPI document for the course endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_courses, handlers::get_course, handlers::add_course,
        handlers::update_course, handlers::delete_course
    ),
    components(
        schemas(
            models::Course, models::PopulatedCourse, models::BootcampSummary,
            models::MinimumSkill, models::CreateCourseRequest, models::UpdateCourseRequest,
            models::CourseResponse, models::PopulatedCourseResponse,
            models::CourseListResponse, models::DeletedResponse,
            middleware::AdvancedResultsBody, query::Pagination, query::PageRef,
        )
    ),
    tags(
        (name = "devcamper-courses", description = "DevCamper Courses API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable application state. Cloning is cheap: the repository sits behind an
/// `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Mounts the course router twice (standalone and under its bootcamp), then applies the
/// request-id, tracing and CORS layers. The request span is built by [`request_span`].
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static(X_REQUEST_ID);

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        // Each mount gets its own router instance; nothing per-request is shared.
        .nest(COURSES_PATH, courses::course_routes(&state))
        .nest(BOOTCAMP_COURSES_PATH, courses::course_routes(&state))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// request_span
///
/// Builds the `TraceLayer` span of one request.
///
/// The path and the query string are separate fields so listing queries (filters, `select`,
/// paging) can be searched on their own. `req_id` is the `x-request-id` stamped by
/// `SetRequestIdLayer`, so every line logged while the request is in flight correlates.
/// `user_id` starts empty and is recorded by the `Authenticate` link once the caller is known;
/// public routes leave it empty.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let req_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "course_api",
        method = %request.method(),
        path = %request.uri().path(),
        query = request.uri().query().unwrap_or(""),
        req_id,
        user_id = tracing::field::Empty,
    )
}
