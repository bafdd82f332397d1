//! Storage port for the order core.
//!
//! All domain rules live in `services`; this trait is the injected
//! persistence handle. Every method that writes more than one row is a
//! single atomic unit in both backends, so services never have to stitch
//! partial writes together.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::OrderStatus,
    models::{
        CartEntity, CartItemEntity, CreateCartItemEntity, CreateOrderEntity, CreatePaymentEntity,
        CreateReviewEntity, OrderEntity, OrderItemEntity, PaymentEntity, ProductEntity,
        ProductVariantEntity, ReviewEntity,
    },
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched. For conditional updates this also covers rows whose
    /// guard column (e.g. order status) no longer matches.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record")]
    Duplicate,

    /// A conditional stock decrement matched no row: the product either
    /// does not exist or holds less stock than requested.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: i32 },

    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Self::Duplicate,
            other => Self::Backend(other.into()),
        }
    }
}

/// One prepared checkout line. The order id is assigned by the store when
/// the owning order row is inserted.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: i32,
    pub variant_id: Option<i32>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Stock to give back when an order is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct StockRelease {
    pub product_id: i32,
    pub quantity: i32,
}

/// Conditional order-status write executed inside a payment transaction.
/// The update only applies while the order still holds `from`; a miss
/// rolls the whole payment write back.
#[derive(Debug, Clone, Copy)]
pub struct OrderStatusSync {
    pub order_id: i32,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Payment mutation applied by [`MarketStore::update_payment`]. `None`
/// leaves a column untouched; `paid_at` is nested so completion can stamp
/// it and a failure revert can clear it.
#[derive(Debug, Clone)]
pub struct PaymentPatch {
    pub status: String,
    pub amount: Option<Decimal>,
    pub paid_at: Option<Option<DateTime<Utc>>>,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    // --- Products / inventory ledger ---

    async fn product(&self, id: i32) -> StoreResult<Option<ProductEntity>>;

    /// Batch product read for cart/checkout pre-conditions (no N+1).
    async fn products_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>>;

    async fn variant(&self, id: i32) -> StoreResult<Option<ProductVariantEntity>>;

    /// Atomic conditional decrement: succeeds only while
    /// `stock_quantity >= quantity`, in a single statement.
    async fn reserve_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()>;

    /// Unconditional increment; used when cancellations restore stock.
    async fn release_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()>;

    // --- Carts ---

    /// Idempotent lookup-or-create. Backed by the `UNIQUE (buyer_id)`
    /// constraint so concurrent first calls converge on one cart.
    async fn find_or_create_cart(&self, buyer_id: i32) -> StoreResult<CartEntity>;

    async fn cart_items(&self, cart_id: i32) -> StoreResult<Vec<CartItemEntity>>;

    async fn insert_cart_item(&self, item: CreateCartItemEntity)
    -> StoreResult<CartItemEntity>;

    async fn update_cart_item_quantity(
        &self,
        item_id: i32,
        quantity: i32,
        subtotal: Decimal,
    ) -> StoreResult<CartItemEntity>;

    async fn delete_cart_item(&self, item_id: i32) -> StoreResult<()>;

    /// Deletes every line of the cart; the cart row persists. Returns the
    /// number of removed lines.
    async fn clear_cart(&self, cart_id: i32) -> StoreResult<usize>;

    // --- Checkout ---

    /// The cart-to-order commit, all-or-nothing: inserts the order and its
    /// items, conditionally decrements stock per line, and empties the
    /// originating cart. Any failed decrement aborts the whole unit with
    /// [`StoreError::InsufficientStock`].
    async fn commit_checkout(
        &self,
        order: CreateOrderEntity,
        lines: Vec<CheckoutLine>,
    ) -> StoreResult<(OrderEntity, Vec<OrderItemEntity>)>;

    // --- Orders ---

    async fn order(&self, id: i32) -> StoreResult<Option<OrderEntity>>;

    async fn order_items(&self, order_id: i32) -> StoreResult<Vec<OrderItemEntity>>;

    /// Batch item read for order listings.
    async fn order_items_for_orders(&self, order_ids: &[i32]) -> StoreResult<Vec<OrderItemEntity>>;

    async fn orders_for_buyer(&self, buyer_id: i32) -> StoreResult<Vec<OrderEntity>>;

    /// Orders containing at least one of the seller's products.
    async fn orders_for_seller(&self, seller_id: i32) -> StoreResult<Vec<OrderEntity>>;

    async fn all_orders(&self) -> StoreResult<Vec<OrderEntity>>;

    /// Status transition conditional on the observed prior status, with any
    /// stock releases applied in the same transaction. A concurrent status
    /// change surfaces as [`StoreError::NotFound`] and releases nothing.
    async fn transition_order(
        &self,
        order_id: i32,
        from: OrderStatus,
        to: OrderStatus,
        releases: &[StockRelease],
    ) -> StoreResult<OrderEntity>;

    // --- Payments ---

    async fn payment(&self, id: Uuid) -> StoreResult<Option<PaymentEntity>>;

    async fn payment_for_order(&self, order_id: i32) -> StoreResult<Option<PaymentEntity>>;

    /// Inserts the payment and, when `sync` is given, advances the order in
    /// the same transaction. The `UNIQUE (order_id)` constraint surfaces a
    /// racing duplicate as [`StoreError::Duplicate`].
    async fn insert_payment(
        &self,
        payment: CreatePaymentEntity,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)>;

    async fn update_payment(
        &self,
        id: Uuid,
        patch: PaymentPatch,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)>;

    /// Deletes the payment only while its status is still `pending`.
    async fn delete_pending_payment(&self, id: Uuid) -> StoreResult<()>;

    // --- Reviews ---

    async fn review(&self, id: i32) -> StoreResult<Option<ReviewEntity>>;

    async fn review_for(&self, user_id: i32, product_id: i32) -> StoreResult<Option<ReviewEntity>>;

    /// True when the user owns an order with status `delivered` containing
    /// the product.
    async fn has_delivered_item(&self, buyer_id: i32, product_id: i32) -> StoreResult<bool>;

    async fn insert_review(&self, review: CreateReviewEntity) -> StoreResult<ReviewEntity>;

    async fn update_review(
        &self,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> StoreResult<ReviewEntity>;

    async fn delete_review(&self, id: i32) -> StoreResult<()>;
}
