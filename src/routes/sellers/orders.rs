use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::Actor,
    middleware::{self},
    models::OrderEntity,
    services::OrderWithItems,
};

/// Defines all seller-facing order routes (fulfilment + authorization).
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/sellers/orders",
        Router::new()
            .route("/", routing::get(get_seller_orders))
            .route("/{id}/status", routing::patch(update_order_status))
            .route_layer(axum::middleware::from_fn(middleware::sellers_authorization)),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/sellers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_seller_orders))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn(middleware::sellers_authorization)),
    )
}

/// Fetch every order containing at least one of the seller's products, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Orders fetched successfully", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_seller_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders().list_for_seller(actor.user_id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(orders),
        message: Some("Orders fetched successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    pub status: String,
}

/// Move an order containing the seller's products to a new fulfilment status.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to transition")
    ),
    responses(
        (status = 200, description = "Order status updated successfully", body = StdResponse<OrderEntity, String>)
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders()
        .transition_by_seller(actor.user_id, id, &body.status)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(order),
        message: Some("Order status updated successfully"),
    })
}
