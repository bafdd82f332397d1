use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self},
    services::OrderWithItems,
};

/// Defines all admin-facing order routes (read-only oversight + authorization).
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/admin/orders",
        Router::new()
            .route("/", routing::get(get_all_orders))
            .route("/{id}", routing::get(get_order))
            .route_layer(axum::middleware::from_fn(middleware::admins_authorization)),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/admin/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_all_orders))
            .routes(utoipa_axum::routes!(get_order))
            .route_layer(axum::middleware::from_fn(middleware::admins_authorization)),
    )
}

/// Fetch every order in the system, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Orders fetched successfully", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_all_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders().list_all().await?;

    Ok(StdResponse {
        success: true,
        data: Some(orders),
        message: Some("Orders fetched successfully"),
    })
}

/// Fetch any order by id, regardless of buyer.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Order fetched successfully", body = StdResponse<OrderWithItems, String>)
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders().get_any(id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(order),
        message: Some("Order fetched successfully"),
    })
}
