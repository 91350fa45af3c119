use crate::{
    AppState,
    auth::Role,
    handlers,
    middleware::{AdvancedResults, Authenticate, Authorize, Chain, CourseModel, Model, run_chain},
};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

/// Roles allowed through the gate on every mutating course route.
pub const PUBLISHING_ROLES: [Role; 2] = [Role::Publisher, Role::Admin];

/// gate_chain
///
/// `authenticate` then `authorize(publisher, admin)`.
pub fn gate_chain() -> Chain {
    Chain::new()
        .then(Authenticate)
        .then(publishing_gate())
}

/// publishing_gate
///
/// The role check of [`gate_chain`].
pub fn publishing_gate() -> Authorize {
    Authorize::new(PUBLISHING_ROLES)
}

/// listing_chain
///
/// Advanced results over `model`, with `bootcamp` populated to its name and description.
/// Under a bootcamp mount the handler lists that bootcamp's courses itself.
pub fn listing_chain(model: impl Model) -> Chain {
    Chain::new().then(
        AdvancedResults::new(model)
            .populate("bootcamp", "name description")
            .skip_under("bootcamp_id"),
    )
}

/// Course Router Module
///
/// Mountable on any parent path. Under `/bootcamps/{bootcamp_id}/courses` the handlers see
/// the parent's `bootcamp_id` alongside their own `id`.
///
/// Access Control Strategy:
/// Each method carries its own chain through `route_layer`, so gates never leak from a
/// mutating method onto the public `GET`s that share its path.
pub fn course_routes(state: &AppState) -> Router<AppState> {
    course_routes_with(state, CourseModel)
}

/// course_routes_with
///
/// Same routes, listing through the given model instead of `CourseModel`.
pub fn course_routes_with(state: &AppState, model: impl Model) -> Router<AppState> {
    let gate = || from_fn_with_state(gate_chain().bind(state.clone()), run_chain);

    Router::<AppState>::new()
        // GET /
        // Public listing. The advanced-results link answers the query string first.
        // POST /
        // Creates a course. Publisher/admin only; bootcamp ownership checked in the handler.
        .route(
            "/",
            get(handlers::get_courses)
                .route_layer(from_fn_with_state(
                    listing_chain(model).bind(state.clone()),
                    run_chain,
                ))
                .merge(post(handlers::add_course).route_layer(gate())),
        )
        // GET /{id}
        // Public, with the bootcamp populated.
        // PUT/DELETE /{id}
        // Publisher/admin only; course ownership checked in the handler.
        .route(
            "/{id}",
            get(handlers::get_course).merge(
                put(handlers::update_course)
                    .delete(handlers::delete_course)
                    .route_layer(gate()),
            ),
        )
}
