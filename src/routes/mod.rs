/// Router Module Index
///
/// One module per resource. Each exposes a `Router<AppState>` that the application mounts
/// (possibly more than once, under different parents) in `create_router`.

/// Course routes, mounted standalone and nested under a bootcamp.
pub mod courses;
