use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{RepoError, Repository};
use crate::{
    models::{Bootcamp, Course, NewCourse, UpdateCourseRequest, User},
    query::{Filter, ListQuery},
};

/// InMemoryRepository
///
/// `Repository` over plain collections. Filtering and sorting run on the serialized
/// form of each course, so it answers listing queries exactly like the SQL backend.
///
/// Intended for tests and local experiments. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    bootcamps: RwLock<HashMap<Uuid, Bootcamp>>,
    // Insertion order doubles as the id tie-breaker for sorting.
    courses: RwLock<Vec<Course>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepoError> {
    lock.read()
        .map_err(|_| RepoError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepoError> {
    lock.write()
        .map_err(|_| RepoError::Unavailable("lock poisoned".to_string()))
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers. A poisoned lock is recovered: seeding only ever inserts.

    pub fn insert_user(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
    }

    pub fn insert_bootcamp(&self, bootcamp: Bootcamp) {
        self.bootcamps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bootcamp.id, bootcamp);
    }

    pub fn insert_course(&self, course: Course) {
        self.courses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(course);
    }

    pub fn course_count(&self) -> usize {
        self.courses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Courses matching `filters`, paired with their serialized form.
    fn matching(&self, filters: &[Filter]) -> Result<Vec<(Course, serde_json::Value)>, RepoError> {
        let courses = read(&self.courses)?;
        let mut out = Vec::new();
        for course in courses.iter() {
            let doc = serde_json::to_value(course)?;
            if filters.iter().all(|f| f.matches(&doc)) {
                out.push((course.clone(), doc));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(read(&self.users)?.get(&id).cloned())
    }

    async fn get_bootcamp(&self, id: Uuid) -> Result<Option<Bootcamp>, RepoError> {
        Ok(read(&self.bootcamps)?.get(&id).cloned())
    }

    async fn get_bootcamps(&self, ids: &[Uuid]) -> Result<Vec<Bootcamp>, RepoError> {
        let bootcamps = read(&self.bootcamps)?;
        Ok(ids.iter().filter_map(|id| bootcamps.get(id).cloned()).collect())
    }

    async fn count_courses(&self, filters: &[Filter]) -> Result<u64, RepoError> {
        Ok(self.matching(filters)?.len() as u64)
    }

    async fn find_courses(&self, query: &ListQuery) -> Result<Vec<Course>, RepoError> {
        let mut rows = self.matching(&query.filters)?;
        // Stable sort keeps insertion order between equal keys.
        rows.sort_by(|(_, a), (_, b)| query.compare(a, b));

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .map(|(course, _)| course)
            .collect())
    }

    async fn get_bootcamp_courses(&self, bootcamp_id: Uuid) -> Result<Vec<Course>, RepoError> {
        Ok(read(&self.courses)?
            .iter()
            .filter(|c| c.bootcamp == bootcamp_id)
            .cloned()
            .collect())
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, RepoError> {
        Ok(read(&self.courses)?.iter().find(|c| c.id == id).cloned())
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, RepoError> {
        let created = Course {
            id: Uuid::new_v4(),
            title: course.title,
            description: course.description,
            weeks: course.weeks,
            tuition: course.tuition,
            minimum_skill: course.minimum_skill,
            scholarship_available: course.scholarship_available,
            bootcamp: course.bootcamp,
            user: course.user,
            created_at: Utc::now(),
        };
        write(&self.courses)?.push(created.clone());
        Ok(created)
    }

    async fn update_course(
        &self,
        id: Uuid,
        req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepoError> {
        let mut courses = write(&self.courses)?;
        Ok(courses.iter_mut().find(|c| c.id == id).map(|course| {
            req.apply_to(course);
            course.clone()
        }))
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, RepoError> {
        let mut courses = write(&self.courses)?;
        let before = courses.len();
        courses.retain(|c| c.id != id);
        Ok(courses.len() != before)
    }
}
