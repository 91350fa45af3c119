use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use devcamper_courses::{
    AppState,
    auth::{AuthUser, Claims, Role},
    config::{AppConfig, Env},
    models::{Bootcamp, Course, NewCourse, UpdateCourseRequest, User},
    query::{Filter, ListQuery},
    repository::{RepoError, Repository},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    user_to_return: Option<User>,
    fail: bool,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, RepoError> {
        if self.fail {
            return Err(RepoError::Unavailable("connection refused".into()));
        }
        Ok(self.user_to_return.clone())
    }
    // Unused by authentication.
    async fn get_bootcamp(&self, _id: Uuid) -> Result<Option<Bootcamp>, RepoError> {
        Ok(None)
    }
    async fn get_bootcamps(&self, _ids: &[Uuid]) -> Result<Vec<Bootcamp>, RepoError> {
        Ok(vec![])
    }
    async fn count_courses(&self, _filters: &[Filter]) -> Result<u64, RepoError> {
        Ok(0)
    }
    async fn find_courses(&self, _query: &ListQuery) -> Result<Vec<Course>, RepoError> {
        Ok(vec![])
    }
    async fn get_bootcamp_courses(&self, _bootcamp_id: Uuid) -> Result<Vec<Course>, RepoError> {
        Ok(vec![])
    }
    async fn get_course(&self, _id: Uuid) -> Result<Option<Course>, RepoError> {
        Ok(None)
    }
    async fn create_course(&self, _course: NewCourse) -> Result<Course, RepoError> {
        Ok(Course::default())
    }
    async fn update_course(
        &self,
        _id: Uuid,
        _req: UpdateCourseRequest,
    ) -> Result<Option<Course>, RepoError> {
        Ok(None)
    }
    async fn delete_course(&self, _id: Uuid) -> Result<bool, RepoError> {
        Ok(false)
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn create_token(user_id: Uuid, exp_offset: i64, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn stored_user(id: Uuid, role: Role) -> User {
    User {
        id,
        name: "Test User".to_string(),
        email: "test@example.com".to_string(),
        role,
    }
}

fn create_app_state(env: Env, repo: MockAuthRepo) -> AppState {
    AppState {
        repo: Arc::new(repo),
        config: AppConfig {
            env,
            jwt_secret: TEST_JWT_SECRET.to_string(),
            ..AppConfig::default()
        },
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    parts
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo {
            user_to_return: Some(stored_user(TEST_USER_ID, Role::Publisher)),
            ..MockAuthRepo::default()
        },
    );

    let mut parts = with_bearer(&token);
    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::Publisher);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, MockAuthRepo::default());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let token = create_token(TEST_USER_ID, -3600, TEST_JWT_SECRET);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo {
            user_to_return: Some(stored_user(TEST_USER_ID, Role::Admin)),
            ..MockAuthRepo::default()
        },
    );

    let mut parts = with_bearer(&token);
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let token = create_token(TEST_USER_ID, 3600, "some-other-secret");
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo {
            user_to_return: Some(stored_user(TEST_USER_ID, Role::Admin)),
            ..MockAuthRepo::default()
        },
    );

    let mut parts = with_bearer(&token);
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_deleted_user() {
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(Env::Production, MockAuthRepo::default());

    let mut parts = with_bearer(&token);
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repository_failure_is_a_server_error() {
    let token = create_token(TEST_USER_ID, 3600, TEST_JWT_SECRET);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo {
            fail: true,
            ..MockAuthRepo::default()
        },
    );

    let mut parts = with_bearer(&token);
    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_attached_identity_is_reused() {
    // No credentials at all: the identity already on the request wins.
    let app_state = create_app_state(Env::Production, MockAuthRepo::default());
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let attached = AuthUser {
        id: TEST_USER_ID,
        role: Role::Admin,
    };
    parts.extensions.insert(attached.clone());

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user, attached);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let mock_user_id = Uuid::new_v4();
    let app_state = create_app_state(
        Env::Local,
        MockAuthRepo {
            user_to_return: Some(stored_user(mock_user_id, Role::Admin)),
            ..MockAuthRepo::default()
        },
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&mock_user_id.to_string()).unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, mock_user_id);
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let mock_user_id = Uuid::new_v4();
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo {
            user_to_return: Some(stored_user(mock_user_id, Role::Admin)),
            ..MockAuthRepo::default()
        },
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Only the bypass header, which production ignores.
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&mock_user_id.to_string()).unwrap(),
    );

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
}
