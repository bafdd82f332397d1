//! Domain services for the order core.
//!
//! Each service owns the rules for one aggregate and reaches storage only
//! through the injected [`MarketStore`](crate::store::MarketStore) handle,
//! so the same rules run against Postgres and the in-memory backend.
//! Handlers stay thin: extract the actor, call a service, wrap the result.

pub mod carts;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod reviews;

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    domain::OrderStatus,
    models::{OrderEntity, OrderItemEntity},
    store::StoreError,
};

pub type ServiceResult<T> = Result<T, MarketError>;

/// Domain outcomes of the operations in this crate. The HTTP layer maps
/// these onto status codes; services never see axum types.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),

    #[error("cart is empty")]
    CartEmpty,

    /// Product missing or deactivated; add-to-cart treats both the same.
    #[error("product {product_id} is not available")]
    ProductUnavailable { product_id: i32 },

    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: i32 },

    #[error("variant does not belong to this product")]
    InvalidVariant,

    #[error("cart item not found")]
    ItemNotFound,

    #[error("order not found")]
    OrderNotFound,

    #[error("payment not found")]
    PaymentNotFound,

    #[error("review not found")]
    ReviewNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("order already has a payment")]
    DuplicatePayment,

    #[error("payment amount exceeds the order total")]
    AmountExceedsTotal,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("payment is not pending")]
    PaymentNotPending,

    #[error("product already reviewed by this user")]
    AlreadyReviewed,

    #[error("no delivered order contains this product")]
    NotEligible,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An order with its line items, the shape every order read returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: OrderEntity,
    pub items: Vec<OrderItemEntity>,
}

/// Pair a batch of orders with their items in one grouping pass.
fn group_order_items(
    orders: Vec<OrderEntity>,
    items: Vec<OrderItemEntity>,
) -> Vec<OrderWithItems> {
    let mut grouped: HashMap<i32, Vec<OrderItemEntity>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }

    orders
        .into_iter()
        .map(|order| {
            let items = grouped.remove(&order.id).unwrap_or_default();
            OrderWithItems { order, items }
        })
        .collect()
}

/// Statuses are CHECK-constrained at the schema level, so an unparseable
/// stored value is corruption, not caller error.
fn stored_order_status(order: &OrderEntity) -> Result<OrderStatus, MarketError> {
    OrderStatus::parse(&order.status).ok_or_else(|| {
        MarketError::Store(StoreError::Backend(anyhow::anyhow!(
            "order {} holds unknown status {:?}",
            order.id,
            order.status
        )))
    })
}
