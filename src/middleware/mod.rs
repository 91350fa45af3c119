//! Per-route interceptor chains.
//!
//! A route's pre-handler steps are an explicit, ordered [`Chain`] of [`Interceptor`]s.
//! [`run_chain`] evaluates them one by one against the request head and stops at the first
//! [`Flow::ShortCircuit`]; only when every link continues does the request reach the
//! terminal handler. Links communicate through the request extensions (the authenticated
//! identity, the listing results).

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{AppState, auth::AuthUser};

pub mod advanced_results;
pub mod gate;

pub use advanced_results::{AdvancedResults, AdvancedResultsBody, CourseModel, Model};
pub use gate::{Authenticate, Authorize};

/// Outcome of one chain link.
pub enum Flow {
    /// Hand the request to the next link (or the handler).
    Continue,
    /// Answer now; later links and the handler never run.
    ShortCircuit(Response),
}

/// RequestContext
///
/// What a link sees of the in-flight request: its head (headers, uri, extensions) and the
/// shared application state. One context per request; nothing in it outlives the request.
pub struct RequestContext<'a> {
    pub parts: &'a mut Parts,
    pub state: &'a AppState,
}

impl RequestContext<'_> {
    /// The identity attached by `Authenticate`, if it has run.
    pub fn identity(&self) -> Option<&AuthUser> {
        self.parts.extensions.get::<AuthUser>()
    }
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: &mut RequestContext<'_>) -> Flow;
}

/// Chain
///
/// Ordered, immutable list of links. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Chain {
    links: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a link; links run in the order they were added.
    pub fn then(mut self, link: impl Interceptor + 'static) -> Self {
        self.links.push(Arc::new(link));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.name()).collect()
    }

    /// Pairs the chain with the application state, ready for
    /// `axum::middleware::from_fn_with_state(.., run_chain)`.
    pub fn bind(self, app: AppState) -> ChainState {
        ChainState { app, chain: self }
    }
}

#[derive(Clone)]
pub struct ChainState {
    app: AppState,
    chain: Chain,
}

/// run_chain
///
/// Middleware function driving a bound chain for one request.
pub async fn run_chain(State(bound): State<ChainState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut ctx = RequestContext {
        parts: &mut parts,
        state: &bound.app,
    };

    for link in &bound.chain.links {
        if let Flow::ShortCircuit(response) = link.handle(&mut ctx).await {
            tracing::debug!(
                link = link.name(),
                status = %response.status(),
                "chain short-circuited"
            );
            return response;
        }
    }

    next.run(Request::from_parts(parts, body)).await
}
