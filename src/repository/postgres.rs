use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{RepoError, Repository};
use crate::{
    models::{Bootcamp, Course, NewCourse, UpdateCourseRequest, User},
    query::{Filter, FilterOp, FilterValue, ListQuery},
};

const COURSE_COLUMNS: &str = "id, title, description, weeks, tuition, minimum_skill, \
     scholarship_available, bootcamp_id, user_id, created_at";

/// PostgresRepository
///
/// `Repository` backed by the `users`, `bootcamps` and `courses` tables (see
/// `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `AND <column> <op> <value>` for every filter. Column names come from the
/// static schema table, never from the request; values are always bound.
fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, filters: &[Filter]) {
    for filter in filters {
        builder.push(" AND ").push(filter.field.column);

        if filter.op == FilterOp::In {
            builder.push(" IN (");
            for (i, value) in filter.values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, value);
            }
            builder.push(")");
        } else if let Some(value) = filter.values.first() {
            builder.push(filter.op.sql());
            push_value(builder, value);
        }
    }
}

fn push_value(builder: &mut QueryBuilder<'static, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(s) => builder.push_bind(s.clone()),
        FilterValue::Number(n) => builder.push_bind(*n),
        FilterValue::Bool(b) => builder.push_bind(*b),
        FilterValue::Timestamp(t) => builder.push_bind(*t),
        FilterValue::Uuid(u) => builder.push_bind(*u),
    };
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_bootcamp(&self, id: Uuid) -> Result<Option<Bootcamp>, RepoError> {
        let bootcamp = sqlx::query_as::<_, Bootcamp>(
            "SELECT id, user_id, name, description FROM bootcamps WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bootcamp)
    }

    async fn get_bootcamps(&self, ids: &[Uuid]) -> Result<Vec<Bootcamp>, RepoError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let bootcamps = sqlx::query_as::<_, Bootcamp>(
            "SELECT id, user_id, name, description FROM bootcamps WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(bootcamps)
    }

    /// count_courses
    ///
    /// Same WHERE clause as `find_courses`, so pagination links agree with the page.
    async fn count_courses(&self, filters: &[Filter]) -> Result<u64, RepoError> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM courses WHERE TRUE");
        push_filters(&mut builder, filters);

        let total = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// find_courses
    ///
    /// Builds the listing query with `QueryBuilder`: bound filter values, schema-checked
    /// ORDER BY columns, `id` as the final tie-breaker so pages never overlap.
    async fn find_courses(&self, query: &ListQuery) -> Result<Vec<Course>, RepoError> {
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("SELECT {COURSE_COLUMNS} FROM courses WHERE TRUE"));
        push_filters(&mut builder, &query.filters);

        builder.push(" ORDER BY ");
        for key in &query.sort {
            builder
                .push(key.field.column)
                .push(if key.descending { " DESC, " } else { " ASC, " });
        }
        builder.push("id ASC");

        builder
            .push(" LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let courses = builder
            .build_query_as::<Course>()
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    async fn get_bootcamp_courses(&self, bootcamp_id: Uuid) -> Result<Vec<Course>, RepoError> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE bootcamp_id = $1 ORDER BY created_at ASC"
        ))
        .bind(bootcamp_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepoError> {
        let course =
            sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(course)
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError> {
        let created = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (id, title, description, weeks, tuition, minimum_skill,
                                 scholarship_available, bootcamp_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(course.title)
        .bind(course.description)
        .bind(course.weeks)
        .bind(course.tuition)
        .bind(course.minimum_skill.as_str())
        .bind(course.scholarship_available)
        .bind(course.bootcamp)
        .bind(course.user)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_course
    ///
    /// `COALESCE` keeps the stored value for every field the request leaves out.
    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepoError> {
        let updated = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                weeks = COALESCE($4, weeks),
                tuition = COALESCE($5, tuition),
                minimum_skill = COALESCE($6, minimum_skill),
                scholarship_available = COALESCE($7, scholarship_available)
            WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.weeks)
        .bind(req.tuition)
        .bind(req.minimum_skill.map(|s| s.as_str()))
        .bind(req.scholarship_available)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
