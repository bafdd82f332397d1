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
    models::ReviewEntity,
};

/// Defines all buyer-facing review routes (create, update, delete + authorization).
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/buyers/reviews",
        Router::new()
            .route("/", routing::post(create_review))
            .route("/{id}", routing::patch(update_review))
            .route("/{id}", routing::delete(delete_review))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/buyers/reviews",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_review))
            .routes(utoipa_axum::routes!(update_review))
            .routes(utoipa_axum::routes!(delete_review))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

#[derive(Deserialize, ToSchema)]
struct CreateReviewReq {
    pub product_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

/// Create a review for a product the buyer has received.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Reviews"],
    responses(
        (status = 200, description = "Review created successfully", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn create_review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<CreateReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let review = state
        .reviews()
        .create(actor.user_id, body.product_id, body.rating, body.comment)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(review),
        message: Some("Review created successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateReviewReq {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Update a review written by the authenticated buyer.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Reviews"],
    params(
        ("id" = i32, Path, description = "Review ID to update")
    ),
    responses(
        (status = 200, description = "Review updated successfully", body = StdResponse<ReviewEntity, String>)
    )
)]
async fn update_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<UpdateReviewReq>,
) -> Result<impl IntoResponse, AppError> {
    let review = state
        .reviews()
        .update(actor.user_id, id, body.rating, body.comment)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(review),
        message: Some("Review updated successfully"),
    })
}

/// Delete a review written by the authenticated buyer.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Reviews"],
    params(
        ("id" = i32, Path, description = "Review ID to delete")
    ),
    responses(
        (status = 200, description = "Review deleted successfully")
    )
)]
async fn delete_review(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    state.reviews().delete(actor.user_id, id).await?;

    Ok(StdResponse::<(), _> {
        success: true,
        data: None,
        message: Some("Review deleted successfully"),
    })
}
