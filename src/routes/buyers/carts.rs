use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    domain::Actor,
    middleware::{self},
    models::CartItemEntity,
    services::carts::CartView,
};

/// Defines all buyer-facing cart routes (CRUD operations + authorization).
#[deprecated]
pub fn routes() -> Router<AppState> {
    Router::new().nest(
        "/buyers/cart",
        Router::new()
            .route("/", routing::get(get_cart))
            .route("/", routing::delete(clear_cart))
            .route("/items", routing::post(add_cart_item))
            .route("/items/{id}", routing::patch(update_cart_item))
            .route("/items/{id}", routing::delete(remove_cart_item))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

/// Defines routes with OpenAPI specs. Should be used over `routes()` where possible.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/buyers/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(clear_cart))
            .routes(utoipa_axum::routes!(add_cart_item))
            .routes(utoipa_axum::routes!(update_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item))
            .route_layer(axum::middleware::from_fn(middleware::buyers_authorization)),
    )
}

/// Fetch the authenticated buyer's cart, creating an empty one on first use.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Carts"],
    responses(
        (status = 200, description = "Cart fetched successfully", body = StdResponse<CartView, String>)
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let cart = state.carts().view(actor.user_id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(cart),
        message: Some("Cart fetched successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct ClearCartRes {
    pub removed: usize,
}

/// Remove every line from the buyer's cart.
#[utoipa::path(
    delete,
    path = "/",
    tags = ["Carts"],
    responses(
        (status = 200, description = "Cart cleared successfully", body = StdResponse<ClearCartRes, String>)
    )
)]
async fn clear_cart(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state.carts().clear(actor.user_id).await?;

    Ok(StdResponse {
        success: true,
        data: Some(ClearCartRes { removed }),
        message: Some("Cart cleared successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddCartItemReq {
    pub product_id: i32,
    pub variant_id: Option<i32>,
    pub quantity: i32,
}

/// Add a product to the buyer's cart, merging with an existing line if present.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Carts"],
    responses(
        (status = 200, description = "Item added to cart successfully", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn add_cart_item(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<AddCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let item = state
        .carts()
        .add_item(actor.user_id, body.product_id, body.variant_id, body.quantity)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(item),
        message: Some("Item added to cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateCartItemReq {
    pub quantity: i32,
}

/// Change the quantity of a cart line belonging to the buyer.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart item ID to update")
    ),
    responses(
        (status = 200, description = "Cart item updated successfully", body = StdResponse<CartItemEntity, String>)
    )
)]
async fn update_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<UpdateCartItemReq>,
) -> Result<impl IntoResponse, AppError> {
    let item = state
        .carts()
        .update_item(actor.user_id, id, body.quantity)
        .await?;

    Ok(StdResponse {
        success: true,
        data: Some(item),
        message: Some("Cart item updated successfully"),
    })
}

/// Remove a single line from the buyer's cart.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tags = ["Carts"],
    params(
        ("id" = i32, Path, description = "Cart item ID to remove")
    ),
    responses(
        (status = 200, description = "Cart item removed successfully")
    )
)]
async fn remove_cart_item(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    state.carts().remove_item(actor.user_id, id).await?;

    Ok(StdResponse::<(), _> {
        success: true,
        data: None,
        message: Some("Cart item removed successfully"),
    })
}
