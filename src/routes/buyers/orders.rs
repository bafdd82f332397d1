use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::Actor,
    middleware::{self},
    services::{OrderWithItems, payments::PaymentOutcome},
};

/// Defines all buyer-facing order routes (checkout, reads, cancellation, payment).
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/buyers/orders",
        Router::new()
            .route("/", routing::get(get_my_orders))
            .route("/", routing::post(create_order))
            .route("/{id}", routing::get(get_order))
            .route("/{id}", routing::delete(cancel_order))
            .route("/{id}/payment", routing::post(create_payment_for_order))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/buyers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(cancel_order))
            .routes(utoipa_axum::routes!(create_payment_for_order))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

/// Fetch every order belonging to the authenticated buyer, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Orders fetched successfully", body = StdResponse<Vec<OrderWithItems>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.orders().list_for_buyer(actor.user_id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(orders),
        message: Some("Orders fetched successfully"),
    })
}

/// Fetch a specific order belonging to the authenticated buyer.
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
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders().get_for_buyer(actor.user_id, id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(order),
        message: Some("Order fetched successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CheckoutReq {
    pub delivery_method: String,
    pub delivery_address: Option<String>,
    pub pickup_location: Option<String>,
}

/// Convert the buyer's cart into an order, decrementing stock atomically.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Order created successfully", body = StdResponse<OrderWithItems, String>)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CheckoutReq>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .checkout()
        .checkout(
            actor.user_id,
            &body.delivery_method,
            body.delivery_address,
            body.pickup_location,
        )
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(order),
        message: Some("Order created successfully"),
    })
}

/// Cancel a pending order belonging to the buyer, releasing its stock.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Order cancelled successfully", body = StdResponse<OrderWithItems, String>)
    )
)]
async fn cancel_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.orders().cancel_by_buyer(actor.user_id, id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(order),
        message: Some("Order cancelled successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreatePaymentReq {
    pub method: String,
    pub amount: Decimal,
    pub status: Option<String>,
}

/// Register a payment for the buyer's order, syncing the order status when completed.
#[utoipa::path(
    post,
    path = "/{id}/payment",
    tags = ["Payments"],
    params(
        ("id" = i32, Path, description = "Order ID to pay for")
    ),
    responses(
        (status = 200, description = "Payment created successfully", body = StdResponse<PaymentOutcome, String>)
    )
)]
async fn create_payment_for_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CreatePaymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .payments()
        .create(
            actor.user_id,
            id,
            &body.method,
            body.amount,
            body.status.as_deref(),
        )
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(outcome),
        message: Some("Payment created successfully"),
    })
}
