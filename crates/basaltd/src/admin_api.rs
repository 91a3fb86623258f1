//! Admin REST API for the `lambdas` collection.
//!
//! Every mutation goes through the hook-firing path, so the lambda
//! runtime has mirrored the change before the HTTP response returns.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/lambdas` | List all function records |
//! | POST | `/api/v1/lambdas` | Create a function record |
//! | GET | `/api/v1/lambdas/{id}` | Get one function record |
//! | PUT | `/api/v1/lambdas/{id}` | Update a function record |
//! | DELETE | `/api/v1/lambdas/{id}` | Delete a function record |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use basalt_core::FunctionDef;
use basalt_state::{CollectionOps, StateError};

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub ops: CollectionOps,
}

/// Build the admin API router.
pub fn build_router(ops: CollectionOps) -> Router {
    let state = AdminState { ops };
    Router::new()
        .route("/api/v1/lambdas", get(list_functions).post(create_function))
        .route(
            "/api/v1/lambdas/{id}",
            get(get_function).put(update_function).delete(delete_function),
        )
        .with_state(state)
}

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// GET /api/v1/lambdas
async fn list_functions(State(state): State<AdminState>) -> impl IntoResponse {
    match state.ops.store().list_functions() {
        Ok(functions) => ApiResponse::ok(functions).into_response(),
        // A never-written collection is just an empty one to admins.
        Err(StateError::CollectionMissing(_)) => {
            ApiResponse::ok(Vec::<FunctionDef>::new()).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/lambdas/:id
async fn get_function(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.ops.store().get_function(&id) {
        Ok(Some(def)) => ApiResponse::ok(def).into_response(),
        Ok(None) => error_response("function not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// POST /api/v1/lambdas
async fn create_function(
    State(state): State<AdminState>,
    Json(def): Json<FunctionDef>,
) -> impl IntoResponse {
    match state.ops.save_function(&def).await {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(def)).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// PUT /api/v1/lambdas/:id
async fn update_function(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(mut def): Json<FunctionDef>,
) -> impl IntoResponse {
    // The path id wins over whatever the body claims.
    def.id = id;
    match state.ops.save_function(&def).await {
        Ok(()) => ApiResponse::ok(def).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/lambdas/:id
async fn delete_function(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.ops.delete_function(&id).await {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("function not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
