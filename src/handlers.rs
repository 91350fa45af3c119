use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    middleware::AdvancedResultsBody,
    models::{
        BootcampSummary, Course, CourseListResponse, CourseResponse, CreateCourseRequest,
        DeletedResponse, NewCourse, PopulatedCourse, PopulatedCourseResponse,
        UpdateCourseRequest,
    },
};

// --- Path Structs ---

/// CourseListPath
///
/// Path parameters of the collection routes. `bootcamp_id` is only present when the router
/// is mounted under `/bootcamps/{bootcamp_id}/courses`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct CourseListPath {
    /// Parent bootcamp id (nested mount only).
    pub bootcamp_id: Option<String>,
}

/// CoursePath
///
/// Path parameters of the `/{id}` routes, merged with the parent mount's.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct CoursePath {
    /// Course id.
    pub id: String,
    /// Parent bootcamp id (nested mount only).
    pub bootcamp_id: Option<String>,
}

// --- Helpers ---

/// Ids arrive as raw strings so malformed ones answer 404 instead of a path rejection.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::resource_not_found(raw))
}

fn no_course(id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("No course with the id of {id}"))
}

fn no_bootcamp(id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("No bootcamp with the id of {id}"))
}

/// Admins act on anything; everyone else only on what they own.
fn ensure_owner(
    user: &AuthUser,
    owner: Uuid,
    action: &'static str,
    target: impl std::fmt::Display,
) -> ApiResult<()> {
    if user.is_admin() || user.id == owner {
        Ok(())
    } else {
        Err(ApiError::NotOwner {
            user: user.id,
            action,
            target: target.to_string(),
        })
    }
}

/// load_course
///
/// Shared lookup of the `/{id}` handlers.
///
/// The raw id is parsed first, so a malformed id reads as a missing record. Under the
/// bootcamp mount the course must also belong to the bootcamp in the path; a course from
/// another bootcamp answers exactly like a missing one, so the nested URL never reveals
/// courses outside its parent.
async fn load_course(state: &AppState, path: &CoursePath) -> ApiResult<Course> {
    let id = parse_id(&path.id)?;
    let course = state
        .repo
        .get_course(id)
        .await?
        .ok_or_else(|| no_course(id))?;

    if let Some(raw) = &path.bootcamp_id {
        let bootcamp_id = parse_id(raw)?;
        if course.bootcamp != bootcamp_id {
            tracing::debug!(course_id = %id, %bootcamp_id, "course belongs to another bootcamp");
            return Err(no_course(id));
        }
    }
    Ok(course)
}

// --- Handlers ---

/// get_courses
///
/// [Public Route] Lists courses.
///
/// Standalone, returns the listing prepared by the `AdvancedResults` link (filters, sort,
/// select, paging, populated bootcamp). Nested under a bootcamp, returns every course of that
/// bootcamp instead and ignores the query string.
#[utoipa::path(
    get,
    path = "/api/v1/courses",
    responses(
        (status = 200, description = "Course listing", body = AdvancedResultsBody),
        (status = 400, description = "Invalid query string")
    )
)]
pub async fn get_courses(
    State(state): State<AppState>,
    parent: Option<Path<CourseListPath>>,
    results: Option<Extension<AdvancedResultsBody>>,
) -> ApiResult<Response> {
    let Some(raw) = parent.and_then(|Path(p)| p.bootcamp_id) else {
        let Extension(results) =
            results.ok_or(ApiError::Internal("listing route has no advanced results link"))?;
        return Ok(Json(results).into_response());
    };

    let bootcamp_id = parse_id(&raw)?;
    let courses = state.repo.get_bootcamp_courses(bootcamp_id).await?;

    Ok(Json(CourseListResponse {
        success: true,
        count: courses.len(),
        data: courses,
    })
    .into_response())
}

/// get_course
///
/// [Public Route] Fetches one course with its bootcamp reduced to name and description.
#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    responses(
        (status = 200, description = "Course", body = PopulatedCourseResponse),
        (status = 404, description = "No such course")
    )
)]
pub async fn get_course(
    State(state): State<AppState>,
    Path(path): Path<CoursePath>,
) -> ApiResult<Json<PopulatedCourseResponse>> {
    let course = load_course(&state, &path).await?;
    let bootcamp = state
        .repo
        .get_bootcamp(course.bootcamp)
        .await?
        .map(BootcampSummary::from);

    Ok(Json(PopulatedCourseResponse {
        success: true,
        data: PopulatedCourse::new(course, bootcamp),
    }))
}

/// add_course
///
/// [Publisher/Admin Route] Creates a course in a bootcamp the caller owns.
///
/// Reached only after `authenticate` and `authorize(publisher, admin)`, so the `AuthUser`
/// extractor finds the identity already attached.
///
/// Steps, in order (the first failure answers):
/// 1. Body: malformed JSON or a failed field check is 400.
/// 2. Bootcamp: taken from the nested path, or from the body's `bootcamp` field on the
///    standalone mount. Neither present is 400; an unknown bootcamp is 404.
/// 3. Ownership: admins pass, anyone else must own the bootcamp (401 otherwise).
///
/// The new course is owned by the caller.
#[utoipa::path(
    post,
    path = "/api/v1/bootcamps/{bootcamp_id}/courses",
    params(("bootcamp_id" = String, Path, description = "Parent bootcamp id")),
    request_body = CreateCourseRequest,
    responses(
        (status = 200, description = "Course created", body = CourseResponse),
        (status = 400, description = "Invalid body"),
        (status = 401, description = "Not authenticated, or not the bootcamp owner"),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "No such bootcamp")
    )
)]
pub async fn add_course(
    State(state): State<AppState>,
    user: AuthUser,
    parent: Option<Path<CourseListPath>>,
    payload: Result<Json<CreateCourseRequest>, JsonRejection>,
) -> ApiResult<Json<CourseResponse>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let bootcamp_id = match parent.and_then(|Path(p)| p.bootcamp_id) {
        Some(raw) => parse_id(&raw)?,
        None => payload
            .bootcamp
            .ok_or_else(|| ApiError::BadRequest("Please add a bootcamp".to_string()))?,
    };

    let bootcamp = state
        .repo
        .get_bootcamp(bootcamp_id)
        .await?
        .ok_or_else(|| no_bootcamp(bootcamp_id))?;

    ensure_owner(&user, bootcamp.user, "add a course to bootcamp", bootcamp.id)?;

    let course = state
        .repo
        .create_course(NewCourse::from_request(payload, bootcamp.id, user.id))
        .await?;

    tracing::info!(course_id = %course.id, bootcamp_id = %bootcamp.id, user_id = %user.id, "course created");

    Ok(Json(CourseResponse {
        success: true,
        data: course,
    }))
}

/// update_course
///
/// [Publisher/Admin Route] Partially updates a course. Owner or admin only.
#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 400, description = "Invalid body"),
        (status = 401, description = "Not authenticated, or not the course owner"),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "No such course")
    )
)]
pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(path): Path<CoursePath>,
    payload: Result<Json<UpdateCourseRequest>, JsonRejection>,
) -> ApiResult<Json<CourseResponse>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let course = load_course(&state, &path).await?;
    ensure_owner(&user, course.user, "update course", course.id)?;
    payload.validate().map_err(ApiError::BadRequest)?;

    // Gone between the read and the write.
    let updated = state
        .repo
        .update_course(course.id, payload)
        .await?
        .ok_or_else(|| no_course(course.id))?;

    Ok(Json(CourseResponse {
        success: true,
        data: updated,
    }))
}

/// delete_course
///
/// [Publisher/Admin Route] Deletes a course. Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    responses(
        (status = 200, description = "Course deleted", body = DeletedResponse),
        (status = 401, description = "Not authenticated, or not the course owner"),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "No such course")
    )
)]
pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(path): Path<CoursePath>,
) -> ApiResult<Json<DeletedResponse>> {
    let course = load_course(&state, &path).await?;
    ensure_owner(&user, course.user, "delete course", course.id)?;

    if !state.repo.delete_course(course.id).await? {
        return Err(no_course(course.id));
    }

    tracing::info!(course_id = %course.id, user_id = %user.id, "course deleted");

    Ok(Json(DeletedResponse {
        success: true,
        data: json!({}),
    }))
}
