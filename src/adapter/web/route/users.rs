use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::adapter::web::app_state::AppState;
use crate::adapter::web::dto::create_user_web_input::CreateUserWebInput;
use crate::adapter::web::handler::users::post::UserHandler;
use crate::core::domain::context::Context;

pub async fn post(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<Context>,
    Json(user): Json<CreateUserWebInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let handler = UserHandler::new(state.create_user_use_case.clone());
    handler.create_user(&ctx, user).await
}
