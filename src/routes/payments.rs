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
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::Actor,
    middleware::{self},
    services::payments::PaymentOutcome,
};

/// Defines all payment routes: buyer-owned updates plus the gateway callback.
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/payments",
        Router::new()
            .route("/{id}/mock-pay", routing::post(mock_pay))
            .merge(
                Router::new()
                    .route("/{id}", routing::patch(update_payment))
                    .route("/{id}", routing::delete(delete_payment))
                    .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
            ),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/payments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(mock_pay))
            .merge(
                OpenApiRouter::new()
                    .routes(utoipa_axum::routes!(update_payment))
                    .routes(utoipa_axum::routes!(delete_payment))
                    .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
            ),
    )
}

/// Gateway callback that completes a pending payment. Stands in for the real
/// wallet gateway, so it carries no identity headers.
#[utoipa::path(
    post,
    path = "/{id}/mock-pay",
    tags = ["Payments"],
    params(
        ("id" = Uuid, Path, description = "Payment ID to mark as completed")
    ),
    responses(
        (status = 200, description = "Payment completed successfully", body = StdResponse<PaymentOutcome, String>)
    )
)]
pub async fn mock_pay(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.payments().gateway_complete(id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(outcome),
        message: Some("Payment completed successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdatePaymentReq {
    pub status: String,
    pub amount: Option<Decimal>,
}

/// Move the buyer's payment to a new status, syncing the order both ways.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Payments"],
    params(
        ("id" = Uuid, Path, description = "Payment ID to update")
    ),
    responses(
        (status = 200, description = "Payment updated successfully", body = StdResponse<PaymentOutcome, String>)
    )
)]
async fn update_payment(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<UpdatePaymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .payments()
        .update(actor.user_id, id, &body.status, body.amount)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(outcome),
        message: Some("Payment updated successfully"),
    })
}

/// Delete the buyer's payment while it is still pending.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Payments"],
    params(
        ("id" = Uuid, Path, description = "Payment ID to delete")
    ),
    responses(
        (status = 200, description = "Payment deleted successfully")
    )
)]
async fn delete_payment(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    state.payments().delete(actor.user_id, id).await?;

    Ok(StdResponse::<(), _> {
        success: true,
        data: None,
        message: Some("Payment deleted successfully"),
    })
}
