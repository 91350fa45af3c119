#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use devcamper_courses::{
    AppConfig, AppState, InMemoryRepository, RepositoryState,
    auth::{Claims, Role},
    config::Env,
    create_router,
    models::{Bootcamp, Course, MinimumSkill, User},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use std::{sync::Arc, time::SystemTime};
use tower::ServiceExt;
use uuid::Uuid;

// --- Shared fixtures for the HTTP-level tests ---

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

/// Production config: no `x-user-id` bypass, only bearer tokens count.
pub fn test_config() -> AppConfig {
    AppConfig {
        env: Env::Production,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn bearer(user: &User) -> String {
    format!("Bearer {}", create_token(user.id, 3600))
}

pub fn user(name: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{name}@devcamper.io"),
        role,
    }
}

pub fn course(title: &str, tuition: f64, bootcamp: &Bootcamp) -> Course {
    Course {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{title} description"),
        weeks: "8".to_string(),
        tuition,
        minimum_skill: MinimumSkill::Beginner,
        scholarship_available: false,
        bootcamp: bootcamp.id,
        user: bootcamp.user,
        created_at: Utc::now(),
    }
}

/// World
///
/// A small seeded data set: one bootcamp per publisher, two courses in the first one.
pub struct World {
    pub repo: Arc<InMemoryRepository>,
    pub publisher: User,
    pub other_publisher: User,
    pub admin: User,
    pub member: User,
    pub bootcamp: Bootcamp,
    pub other_bootcamp: Bootcamp,
    pub courses: Vec<Course>,
}

impl World {
    pub fn seed() -> Self {
        let repo = Arc::new(InMemoryRepository::new());

        let publisher = user("publisher", Role::Publisher);
        let other_publisher = user("other", Role::Publisher);
        let admin = user("admin", Role::Admin);
        let member = user("member", Role::User);
        for u in [&publisher, &other_publisher, &admin, &member] {
            repo.insert_user(u.clone());
        }

        let bootcamp = Bootcamp {
            id: Uuid::new_v4(),
            user: publisher.id,
            name: "Devworks Bootcamp".to_string(),
            description: "Devworks is a full stack JavaScript Bootcamp".to_string(),
        };
        let other_bootcamp = Bootcamp {
            id: Uuid::new_v4(),
            user: other_publisher.id,
            name: "ModernTech Bootcamp".to_string(),
            description: "ModernTech has one goal".to_string(),
        };
        repo.insert_bootcamp(bootcamp.clone());
        repo.insert_bootcamp(other_bootcamp.clone());

        let mut front = course("Front End Web Development", 8000.0, &bootcamp);
        front.created_at = Utc::now() - Duration::days(1);
        let full = course("Full Stack Web Development", 10000.0, &bootcamp);
        let courses = vec![front, full];
        for c in &courses {
            repo.insert_course(c.clone());
        }

        Self {
            repo,
            publisher,
            other_publisher,
            admin,
            member,
            bootcamp,
            other_bootcamp,
            courses,
        }
    }

    pub fn app(&self) -> Router {
        app_with(self.repo.clone())
    }
}

pub fn app_with(repo: RepositoryState) -> Router {
    create_router(AppState {
        repo,
        config: test_config(),
    })
}

pub fn request(method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends one request through the router and decodes the JSON body (`Null` if empty).
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
