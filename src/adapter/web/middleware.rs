//! Wraps mutating requests in a unit of work.
//!
//! The request's [`Context`], with the new unit of work bound, is handed to the
//! handler as a request extension. A response with a 4xx or 5xx status rolls
//! the unit of work back but is still returned to the client.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::core::domain::context::Context;
use crate::core::domain::transaction::TransactionOptions;
use crate::core::domain::transaction_manager::{TransactionManagerError, UnitOfWorkManager};
use crate::core::domain::transaction_operation::TransactionOperationError;

/// Decides whether a request runs without a unit of work.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

const SAFE_METHODS: [Method; 4] = [Method::GET, Method::HEAD, Method::OPTIONS, Method::TRACE];

#[derive(Clone)]
pub struct UnitOfWorkLayer {
    manager: Arc<UnitOfWorkManager>,
    skip: SkipFn,
    options: Option<TransactionOptions>,
}

impl UnitOfWorkLayer {
    pub fn new(manager: Arc<UnitOfWorkManager>) -> Self {
        Self {
            manager,
            skip: Arc::new(default_skip),
            options: None,
        }
    }

    pub fn with_skip(mut self, skip: SkipFn) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// True when the last segment of `operation` starts with `get` or `list`,
/// ignoring case.
pub fn skip_operation(operation: &str) -> bool {
    let action = operation
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    action.starts_with("get") || action.starts_with("list")
}

/// Skips read-only operations and safe HTTP methods.
pub fn default_skip(request: &Request) -> bool {
    let path = request.uri().path();
    if skip_operation(path) {
        debug!(operation = %path, "safe operation, skip unit of work");
        return true;
    }
    if SAFE_METHODS.contains(request.method()) {
        debug!(method = %request.method(), "safe method, skip unit of work");
        return true;
    }
    false
}

pub async fn unit_of_work(
    State(layer): State<UnitOfWorkLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = request
        .extensions()
        .get::<Context>()
        .cloned()
        .unwrap_or_default();

    if (layer.skip)(&request) {
        request.extensions_mut().insert(ctx);
        return next.run(request).await;
    }

    debug!("run into unit of work");
    let mut rejected = None;
    let result = layer
        .manager
        .with_new(&ctx, layer.options.clone(), |ctx| {
            let rejected = &mut rejected;
            async move {
                request.extensions_mut().insert(ctx);
                let response = next.run(request).await;
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    *rejected = Some(response);
                    return Err(anyhow::anyhow!("handler responded with {status}").into());
                }
                Ok::<_, TransactionOperationError>(response)
            }
        })
        .await;

    match (result, rejected) {
        (Ok(response), _) => response,
        (Err(TransactionManagerError::RollbackFailed { rollback, .. }), Some(response)) => {
            warn!(error = %rollback, "rollback after rejected request failed");
            response
        }
        (Err(_), Some(response)) => response,
        (Err(e), None) => {
            error!(error = %e, "unit of work failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
