use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::adapter::web::app_state::AppState;
use crate::adapter::web::dto::branch_query::BranchQuery;
use crate::adapter::web::dto::create_user_web_input::{CreateUserWebInput, UserIdWebInput};
use crate::adapter::web::handler::saga::users::SagaUserHandler;
use crate::core::domain::context::Context;

fn handler(state: &AppState) -> SagaUserHandler {
    SagaUserHandler::new(
        state.saga_user_use_case.clone(),
        state.barrier_dialect,
        state.barrier_table.as_str(),
    )
}

pub async fn action(
    State(state): State<Arc<AppState>>,
    ctx: Option<Extension<Context>>,
    Query(query): Query<BranchQuery>,
    Json(user): Json<CreateUserWebInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let ctx = ctx.map(|Extension(ctx)| ctx).unwrap_or_default();
    handler(&state).action(&ctx, query, user).await
}

pub async fn compensate(
    State(state): State<Arc<AppState>>,
    ctx: Option<Extension<Context>>,
    Query(query): Query<BranchQuery>,
    Json(user): Json<UserIdWebInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let ctx = ctx.map(|Extension(ctx)| ctx).unwrap_or_default();
    handler(&state).compensate(&ctx, query, user).await
}
