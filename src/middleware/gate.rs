use async_trait::async_trait;
use axum::{extract::FromRequestParts, response::IntoResponse};

use super::{Flow, Interceptor, RequestContext};
use crate::{
    AppState,
    auth::{AuthUser, RoleSet},
    error::ApiError,
};

/// Authenticate
///
/// Resolves the caller through the `AuthUser` extractor and attaches the identity to the
/// request. Any credential problem ends the chain with 401.
pub struct Authenticate;

#[async_trait]
impl Interceptor for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn handle(&self, ctx: &mut RequestContext<'_>) -> Flow {
        let resolved =
            <AuthUser as FromRequestParts<AppState>>::from_request_parts(&mut *ctx.parts, ctx.state)
                .await;

        match resolved {
            Ok(user) => {
                tracing::Span::current().record("user_id", tracing::field::display(user.id));
                tracing::debug!(user_id = %user.id, role = %user.role, "request authenticated");
                ctx.parts.extensions.insert(user);
                Flow::Continue
            }
            Err(err) => Flow::ShortCircuit(err.into_response()),
        }
    }
}

/// Authorize
///
/// Admits the request only if the attached identity holds one of `roles`. Must follow
/// `Authenticate`: without an identity it ends the chain with 401 and never looks at roles.
pub struct Authorize {
    roles: RoleSet,
}

impl Authorize {
    pub fn new(roles: impl Into<RoleSet>) -> Self {
        Self {
            roles: roles.into(),
        }
    }

    pub fn roles(&self) -> RoleSet {
        self.roles
    }
}

#[async_trait]
impl Interceptor for Authorize {
    fn name(&self) -> &'static str {
        "authorize"
    }

    async fn handle(&self, ctx: &mut RequestContext<'_>) -> Flow {
        let Some(user) = ctx.identity() else {
            tracing::warn!("authorize reached without an authenticated identity");
            return Flow::ShortCircuit(ApiError::Unauthorized.into_response());
        };

        if self.roles.contains(user.role) {
            Flow::Continue
        } else {
            tracing::debug!(
                user_id = %user.id,
                role = %user.role,
                allowed = %self.roles,
                "role not permitted"
            );
            Flow::ShortCircuit(ApiError::Forbidden { role: user.role }.into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use uuid::Uuid;

    use super::*;
    use crate::{AppConfig, auth::Role, repository::InMemoryRepository};

    fn state() -> AppState {
        AppState {
            repo: Arc::new(InMemoryRepository::new()),
            config: AppConfig::default(),
        }
    }

    fn parts() -> axum::http::request::Parts {
        Request::get("/").body(()).unwrap().into_parts().0
    }

    fn status(flow: Flow) -> Option<StatusCode> {
        match flow {
            Flow::Continue => None,
            Flow::ShortCircuit(response) => Some(response.status()),
        }
    }

    #[tokio::test]
    async fn authorize_without_identity_is_unauthorized() {
        let state = state();
        let mut parts = parts();
        let mut ctx = RequestContext {
            parts: &mut parts,
            state: &state,
        };

        let gate = Authorize::new([Role::Publisher, Role::Admin]);
        assert_eq!(status(gate.handle(&mut ctx).await), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn authorize_checks_role_membership() {
        let state = state();
        let gate = Authorize::new([Role::Publisher, Role::Admin]);

        for (role, expected) in [
            (Role::User, Some(StatusCode::FORBIDDEN)),
            (Role::Publisher, None),
            (Role::Admin, None),
        ] {
            let mut parts = parts();
            parts.extensions.insert(AuthUser {
                id: Uuid::new_v4(),
                role,
            });
            let mut ctx = RequestContext {
                parts: &mut parts,
                state: &state,
            };
            assert_eq!(status(gate.handle(&mut ctx).await), expected, "role {role}");
        }
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_credentials() {
        let state = state();
        let mut parts = parts();
        let mut ctx = RequestContext {
            parts: &mut parts,
            state: &state,
        };

        assert_eq!(
            status(Authenticate.handle(&mut ctx).await),
            Some(StatusCode::UNAUTHORIZED)
        );
        assert!(ctx.identity().is_none());
    }
}
