use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

use crate::adapter::web::app_state::AppState;
use crate::adapter::web::middleware::{unit_of_work, UnitOfWorkLayer};
use crate::adapter::web::route::{saga, users};

/// Saga branch routes open their own unit of work through the barrier, so only
/// the plain user routes sit behind the unit of work middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let layer = UnitOfWorkLayer::new(state.manager.clone());

    let users = Router::new()
        .route("/users", post(users::post))
        .route_layer(from_fn_with_state(layer, unit_of_work));

    let saga = Router::new()
        .route("/saga/users/action", post(saga::action))
        .route("/saga/users/compensate", post(saga::compensate));

    users.merge(saga).with_state(state)
}
