use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Role,
    query::{Field, FieldKind, Schema},
};

/// Raised when a stored or submitted string does not name a known enum variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{value}` is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// --- Referenced records ---

/// User
///
/// The identity record behind a bearer token. Only what authentication and the ownership
/// checks need is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Stored as TEXT; decoded through `Role: TryFrom<String>`.
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Bootcamp
///
/// Parent resource of a course. Owned by the publisher who created it (`user`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Bootcamp {
    pub id: Uuid,
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
    pub name: String,
    pub description: String,
}

/// BootcampSummary
///
/// The populated form of a course's `bootcamp` reference: name and description only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct BootcampSummary {
    pub name: String,
    pub description: String,
}

impl From<Bootcamp> for BootcampSummary {
    fn from(bootcamp: Bootcamp) -> Self {
        Self {
            name: bootcamp.name,
            description: bootcamp.description,
        }
    }
}

// --- Course ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MinimumSkill {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl MinimumSkill {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinimumSkill::Beginner => "beginner",
            MinimumSkill::Intermediate => "intermediate",
            MinimumSkill::Advanced => "advanced",
        }
    }
}

impl fmt::Display for MinimumSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinimumSkill {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(MinimumSkill::Beginner),
            "intermediate" => Ok(MinimumSkill::Intermediate),
            "advanced" => Ok(MinimumSkill::Advanced),
            other => Err(UnknownVariant {
                kind: "minimum skill",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for MinimumSkill {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Course
///
/// A course record from the `courses` table. `bootcamp` and `user` are references
/// (foreign keys), serialized as plain ids.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Duration as entered by the publisher, e.g. "8".
    pub weeks: String,
    pub tuition: f64,
    #[sqlx(try_from = "String")]
    pub minimum_skill: MinimumSkill,
    pub scholarship_available: bool,
    #[sqlx(rename = "bootcamp_id")]
    pub bootcamp: Uuid,
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Fields of `Course` that listings may filter, sort and select on, keyed by their JSON
/// names.
pub static COURSE_SCHEMA: Schema = Schema {
    table: "courses",
    fields: &[
        Field { name: "id", column: "id", kind: FieldKind::Uuid },
        Field { name: "title", column: "title", kind: FieldKind::Text },
        Field { name: "description", column: "description", kind: FieldKind::Text },
        Field { name: "weeks", column: "weeks", kind: FieldKind::Text },
        Field { name: "tuition", column: "tuition", kind: FieldKind::Number },
        Field { name: "minimumSkill", column: "minimum_skill", kind: FieldKind::Text },
        Field {
            name: "scholarshipAvailable",
            column: "scholarship_available",
            kind: FieldKind::Bool,
        },
        Field { name: "bootcamp", column: "bootcamp_id", kind: FieldKind::Uuid },
        Field { name: "user", column: "user_id", kind: FieldKind::Uuid },
        Field { name: "createdAt", column: "created_at", kind: FieldKind::Timestamp },
    ],
    default_sort: "-createdAt",
};

/// PopulatedCourse
///
/// A course whose `bootcamp` reference was resolved to its summary. `None` when the
/// referenced bootcamp no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PopulatedCourse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub weeks: String,
    pub tuition: f64,
    pub minimum_skill: MinimumSkill,
    pub scholarship_available: bool,
    pub bootcamp: Option<BootcampSummary>,
    pub user: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl PopulatedCourse {
    pub fn new(course: Course, bootcamp: Option<BootcampSummary>) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            weeks: course.weeks,
            tuition: course.tuition,
            minimum_skill: course.minimum_skill,
            scholarship_available: course.scholarship_available,
            bootcamp,
            user: course.user,
            created_at: course.created_at,
        }
    }
}

// --- Request payloads ---

/// CreateCourseRequest
///
/// Body of `POST /courses`. When the route is nested under a bootcamp, the path's
/// bootcamp id wins over `bootcamp`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub weeks: String,
    pub tuition: f64,
    pub minimum_skill: MinimumSkill,
    #[serde(default)]
    pub scholarship_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootcamp: Option<Uuid>,
}

impl CreateCourseRequest {
    /// Checks the required fields; returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Please add a course title".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Please add a description".to_string());
        }
        if self.weeks.trim().is_empty() {
            return Err("Please add number of weeks".to_string());
        }
        validate_tuition(self.tuition)
    }
}

/// UpdateCourseRequest
///
/// Partial update payload for `PUT /courses/{id}`; absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCourseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weeks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuition: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_skill: Option<MinimumSkill>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scholarship_available: Option<bool>,
}

impl UpdateCourseRequest {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err("Please add a course title".to_string());
        }
        if matches!(&self.description, Some(d) if d.trim().is_empty()) {
            return Err("Please add a description".to_string());
        }
        if matches!(&self.weeks, Some(w) if w.trim().is_empty()) {
            return Err("Please add number of weeks".to_string());
        }
        match self.tuition {
            Some(tuition) => validate_tuition(tuition),
            None => Ok(()),
        }
    }

    pub fn apply_to(self, course: &mut Course) {
        if let Some(title) = self.title {
            course.title = title;
        }
        if let Some(description) = self.description {
            course.description = description;
        }
        if let Some(weeks) = self.weeks {
            course.weeks = weeks;
        }
        if let Some(tuition) = self.tuition {
            course.tuition = tuition;
        }
        if let Some(skill) = self.minimum_skill {
            course.minimum_skill = skill;
        }
        if let Some(scholarship) = self.scholarship_available {
            course.scholarship_available = scholarship;
        }
    }
}

fn validate_tuition(tuition: f64) -> Result<(), String> {
    if !tuition.is_finite() || tuition < 0.0 {
        return Err("Please add a tuition cost".to_string());
    }
    Ok(())
}

/// NewCourse
///
/// A validated course ready for insertion, with both references resolved.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub weeks: String,
    pub tuition: f64,
    pub minimum_skill: MinimumSkill,
    pub scholarship_available: bool,
    pub bootcamp: Uuid,
    pub user: Uuid,
}

impl NewCourse {
    pub fn from_request(req: CreateCourseRequest, bootcamp: Uuid, user: Uuid) -> Self {
        Self {
            title: req.title,
            description: req.description,
            weeks: req.weeks,
            tuition: req.tuition,
            minimum_skill: req.minimum_skill,
            scholarship_available: req.scholarship_available,
            bootcamp,
            user,
        }
    }
}

// --- Response envelopes ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub success: bool,
    pub data: Course,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PopulatedCourseResponse {
    pub success: bool,
    pub data: PopulatedCourse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Course>,
}

/// Returned by `DELETE`; `data` is always an empty object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}
