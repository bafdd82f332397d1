//! In-memory [`MarketStore`] for tests and local development.
//!
//! A single lock guards all tables, so the multi-row operations
//! (`commit_checkout`, `transition_order`, the payment writes) validate
//! first and mutate second while nothing else can interleave. That mirrors
//! the transaction boundaries of the Postgres backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::OrderStatus,
    models::{
        CartEntity, CartItemEntity, CreateCartItemEntity, CreateOrderEntity, CreatePaymentEntity,
        CreateReviewEntity, OrderEntity, OrderItemEntity, PaymentEntity, ProductEntity,
        ProductVariantEntity, ReviewEntity,
    },
};

use super::{
    CheckoutLine, MarketStore, OrderStatusSync, PaymentPatch, StockRelease, StoreError,
    StoreResult,
};

#[derive(Default)]
struct MemoryInner {
    products: HashMap<i32, ProductEntity>,
    variants: HashMap<i32, ProductVariantEntity>,
    carts: HashMap<i32, CartEntity>,
    cart_items: HashMap<i32, CartItemEntity>,
    orders: HashMap<i32, OrderEntity>,
    order_items: HashMap<i32, OrderItemEntity>,
    payments: HashMap<Uuid, PaymentEntity>,
    reviews: HashMap<i32, ReviewEntity>,
    next_product_id: i32,
    next_variant_id: i32,
    next_cart_id: i32,
    next_cart_item_id: i32,
    next_order_id: i32,
    next_order_item_id: i32,
    next_review_id: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner::default())),
        }
    }

    /// Insert a product row directly; catalog management is out of scope
    /// for this service, so fixtures go in through here.
    pub fn seed_product(
        &self,
        seller_id: i32,
        name: &str,
        price: Decimal,
        stock_quantity: i32,
    ) -> ProductEntity {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let id = next(&mut inner.next_product_id);
        let now = Utc::now();
        let product = ProductEntity {
            id,
            seller_id,
            category_id: None,
            name: name.to_owned(),
            price,
            stock_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(id, product.clone());
        product
    }

    pub fn seed_variant(
        &self,
        product_id: i32,
        name: &str,
        price_delta: Decimal,
    ) -> ProductVariantEntity {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let id = next(&mut inner.next_variant_id);
        let variant = ProductVariantEntity {
            id,
            product_id,
            name: name.to_owned(),
            price_delta,
            created_at: Utc::now(),
        };
        inner.variants.insert(id, variant.clone());
        variant
    }

    pub fn set_product_active(&self, product_id: i32, is_active: bool) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.is_active = is_active;
            product.updated_at = Utc::now();
        }
    }

    pub fn set_product_price(&self, product_id: i32, price: Decimal) {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.price = price;
            product.updated_at = Utc::now();
        }
    }

    pub fn product_stock(&self, product_id: i32) -> Option<i32> {
        let inner = self.inner.read().expect("RwLock poisoned");
        inner.products.get(&product_id).map(|p| p.stock_quantity)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn product(&self, id: i32) -> StoreResult<Option<ProductEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.products.get(&id).cloned())
    }

    async fn products_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut rows: Vec<ProductEntity> = ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect();
        rows.sort_by_key(|p| p.id);
        rows.dedup_by_key(|p| p.id);
        Ok(rows)
    }

    async fn variant(&self, id: i32) -> StoreResult<Option<ProductVariantEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.variants.get(&id).cloned())
    }

    async fn reserve_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        match inner.products.get_mut(&product_id) {
            Some(product) if product.stock_quantity >= quantity => {
                product.stock_quantity -= quantity;
                product.updated_at = Utc::now();
                Ok(())
            }
            // Missing row and short stock look the same to a conditional
            // UPDATE, so they look the same here.
            _ => Err(StoreError::InsufficientStock { product_id }),
        }
    }

    async fn release_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.stock_quantity += quantity;
            product.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_or_create_cart(&self, buyer_id: i32) -> StoreResult<CartEntity> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        if let Some(cart) = inner.carts.values().find(|c| c.buyer_id == buyer_id) {
            return Ok(cart.clone());
        }

        let id = next(&mut inner.next_cart_id);
        let now = Utc::now();
        let cart = CartEntity {
            id,
            buyer_id,
            created_at: now,
            updated_at: now,
        };
        inner.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn cart_items(&self, cart_id: i32) -> StoreResult<Vec<CartItemEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut items: Vec<CartItemEntity> = inner
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn insert_cart_item(&self, item: CreateCartItemEntity) -> StoreResult<CartItemEntity> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let duplicate = inner.cart_items.values().any(|existing| {
            existing.cart_id == item.cart_id
                && existing.product_id == item.product_id
                && existing.variant_id == item.variant_id
        });
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let id = next(&mut inner.next_cart_item_id);
        let now = Utc::now();
        let row = CartItemEntity {
            id,
            cart_id: item.cart_id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
            created_at: now,
            updated_at: now,
        };
        inner.cart_items.insert(id, row.clone());

        if let Some(cart) = inner.carts.get_mut(&item.cart_id) {
            cart.updated_at = now;
        }

        Ok(row)
    }

    async fn update_cart_item_quantity(
        &self,
        item_id: i32,
        quantity: i32,
        subtotal: Decimal,
    ) -> StoreResult<CartItemEntity> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let now = Utc::now();
        let item = inner
            .cart_items
            .get_mut(&item_id)
            .ok_or(StoreError::NotFound)?;
        item.quantity = quantity;
        item.subtotal = subtotal;
        item.updated_at = now;
        let item = item.clone();

        if let Some(cart) = inner.carts.get_mut(&item.cart_id) {
            cart.updated_at = now;
        }

        Ok(item)
    }

    async fn delete_cart_item(&self, item_id: i32) -> StoreResult<()> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let item = inner
            .cart_items
            .remove(&item_id)
            .ok_or(StoreError::NotFound)?;

        if let Some(cart) = inner.carts.get_mut(&item.cart_id) {
            cart.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn clear_cart(&self, cart_id: i32) -> StoreResult<usize> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let before = inner.cart_items.len();
        inner.cart_items.retain(|_, item| item.cart_id != cart_id);
        let removed = before - inner.cart_items.len();

        if let Some(cart) = inner.carts.get_mut(&cart_id) {
            cart.updated_at = Utc::now();
        }

        Ok(removed)
    }

    async fn commit_checkout(
        &self,
        order: CreateOrderEntity,
        lines: Vec<CheckoutLine>,
    ) -> StoreResult<(OrderEntity, Vec<OrderItemEntity>)> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        // Stage the decrements line by line, same order the Postgres
        // backend issues them, so the failing product id matches.
        let mut staged: HashMap<i32, i32> = HashMap::new();
        for line in &lines {
            let available = match staged.get(&line.product_id) {
                Some(remaining) => *remaining,
                None => inner
                    .products
                    .get(&line.product_id)
                    .map(|p| p.stock_quantity)
                    .unwrap_or(0),
            };
            if available < line.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                });
            }
            staged.insert(line.product_id, available - line.quantity);
        }

        let now = Utc::now();
        let order_id = next(&mut inner.next_order_id);
        let order_row = OrderEntity {
            id: order_id,
            buyer_id: order.buyer_id,
            cart_id: order.cart_id,
            status: order.status,
            delivery_method: order.delivery_method,
            delivery_address: order.delivery_address,
            pickup_location: order.pickup_location,
            subtotal: order.subtotal,
            delivery_fee: order.delivery_fee,
            total: order.total,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(order_id, order_row.clone());

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item_id = next(&mut inner.next_order_item_id);
            let item = OrderItemEntity {
                id: item_id,
                order_id,
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
                created_at: now,
            };
            inner.order_items.insert(item_id, item.clone());
            items.push(item);
        }

        for (product_id, remaining) in staged {
            if let Some(product) = inner.products.get_mut(&product_id) {
                product.stock_quantity = remaining;
                product.updated_at = now;
            }
        }

        inner
            .cart_items
            .retain(|_, item| item.cart_id != order_row.cart_id);
        if let Some(cart) = inner.carts.get_mut(&order_row.cart_id) {
            cart.updated_at = now;
        }

        Ok((order_row, items))
    }

    async fn order(&self, id: i32) -> StoreResult<Option<OrderEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.orders.get(&id).cloned())
    }

    async fn order_items(&self, order_id: i32) -> StoreResult<Vec<OrderItemEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut items: Vec<OrderItemEntity> = inner
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn order_items_for_orders(&self, order_ids: &[i32]) -> StoreResult<Vec<OrderItemEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut items: Vec<OrderItemEntity> = inner
            .order_items
            .values()
            .filter(|item| order_ids.contains(&item.order_id))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }

    async fn orders_for_buyer(&self, buyer_id: i32) -> StoreResult<Vec<OrderEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut rows: Vec<OrderEntity> = inner
            .orders
            .values()
            .filter(|order| order.buyer_id == buyer_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn orders_for_seller(&self, seller_id: i32) -> StoreResult<Vec<OrderEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut rows: Vec<OrderEntity> = inner
            .orders
            .values()
            .filter(|order| {
                inner.order_items.values().any(|item| {
                    item.order_id == order.id
                        && inner
                            .products
                            .get(&item.product_id)
                            .is_some_and(|product| product.seller_id == seller_id)
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn all_orders(&self) -> StoreResult<Vec<OrderEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let mut rows: Vec<OrderEntity> = inner.orders.values().cloned().collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn transition_order(
        &self,
        order_id: i32,
        from: OrderStatus,
        to: OrderStatus,
        releases: &[StockRelease],
    ) -> StoreResult<OrderEntity> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let now = Utc::now();
        let order = match inner.orders.get_mut(&order_id) {
            Some(order) if order.status == from.as_str() => {
                order.status = to.as_str().to_owned();
                order.updated_at = now;
                order.clone()
            }
            _ => return Err(StoreError::NotFound),
        };

        for release in releases {
            if let Some(product) = inner.products.get_mut(&release.product_id) {
                product.stock_quantity += release.quantity;
                product.updated_at = now;
            }
        }

        Ok(order)
    }

    async fn payment(&self, id: Uuid) -> StoreResult<Option<PaymentEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.payments.get(&id).cloned())
    }

    async fn payment_for_order(&self, order_id: i32) -> StoreResult<Option<PaymentEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .payments
            .values()
            .find(|payment| payment.order_id == order_id)
            .cloned())
    }

    async fn insert_payment(
        &self,
        payment: CreatePaymentEntity,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        if inner
            .payments
            .values()
            .any(|existing| existing.order_id == payment.order_id)
        {
            return Err(StoreError::Duplicate);
        }

        // Validate the status guard before touching anything, so a miss
        // leaves no partial write behind.
        if let Some(sync) = sync {
            let holds = inner
                .orders
                .get(&sync.order_id)
                .is_some_and(|order| order.status == sync.from.as_str());
            if !holds {
                return Err(StoreError::NotFound);
            }
        }

        let now = Utc::now();
        let row = PaymentEntity {
            id: Uuid::new_v4(),
            order_id: payment.order_id,
            method: payment.method,
            amount: payment.amount,
            status: payment.status,
            paid_at: payment.paid_at,
            created_at: now,
            updated_at: now,
        };
        inner.payments.insert(row.id, row.clone());

        let order = match sync {
            Some(sync) => {
                let order = inner
                    .orders
                    .get_mut(&sync.order_id)
                    .ok_or(StoreError::NotFound)?;
                order.status = sync.to.as_str().to_owned();
                order.updated_at = now;
                Some(order.clone())
            }
            None => None,
        };

        Ok((row, order))
    }

    async fn update_payment(
        &self,
        id: Uuid,
        patch: PaymentPatch,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        if !inner.payments.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if let Some(sync) = sync {
            let holds = inner
                .orders
                .get(&sync.order_id)
                .is_some_and(|order| order.status == sync.from.as_str());
            if !holds {
                return Err(StoreError::NotFound);
            }
        }

        let now = Utc::now();
        let payment = inner.payments.get_mut(&id).ok_or(StoreError::NotFound)?;
        payment.status = patch.status;
        if let Some(amount) = patch.amount {
            payment.amount = amount;
        }
        if let Some(paid_at) = patch.paid_at {
            payment.paid_at = paid_at;
        }
        payment.updated_at = now;
        let payment = payment.clone();

        let order = match sync {
            Some(sync) => {
                let order = inner
                    .orders
                    .get_mut(&sync.order_id)
                    .ok_or(StoreError::NotFound)?;
                order.status = sync.to.as_str().to_owned();
                order.updated_at = now;
                Some(order.clone())
            }
            None => None,
        };

        Ok((payment, order))
    }

    async fn delete_pending_payment(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let pending = inner
            .payments
            .get(&id)
            .is_some_and(|payment| payment.status == "pending");
        if !pending {
            return Err(StoreError::NotFound);
        }
        inner.payments.remove(&id);
        Ok(())
    }

    async fn review(&self, id: i32) -> StoreResult<Option<ReviewEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner.reviews.get(&id).cloned())
    }

    async fn review_for(&self, user_id: i32, product_id: i32) -> StoreResult<Option<ReviewEntity>> {
        let inner = self.inner.read().expect("RwLock poisoned");
        Ok(inner
            .reviews
            .values()
            .find(|review| review.user_id == user_id && review.product_id == product_id)
            .cloned())
    }

    async fn has_delivered_item(&self, buyer_id: i32, product_id: i32) -> StoreResult<bool> {
        let inner = self.inner.read().expect("RwLock poisoned");
        let eligible = inner.orders.values().any(|order| {
            order.buyer_id == buyer_id
                && order.status == OrderStatus::Delivered.as_str()
                && inner
                    .order_items
                    .values()
                    .any(|item| item.order_id == order.id && item.product_id == product_id)
        });
        Ok(eligible)
    }

    async fn insert_review(&self, review: CreateReviewEntity) -> StoreResult<ReviewEntity> {
        let mut guard = self.inner.write().expect("RwLock poisoned");
        let inner = &mut *guard;

        let duplicate = inner
            .reviews
            .values()
            .any(|existing| existing.user_id == review.user_id && existing.product_id == review.product_id);
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let id = next(&mut inner.next_review_id);
        let now = Utc::now();
        let row = ReviewEntity {
            id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            created_at: now,
            updated_at: now,
        };
        inner.reviews.insert(id, row.clone());
        Ok(row)
    }

    async fn update_review(
        &self,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> StoreResult<ReviewEntity> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        let review = inner.reviews.get_mut(&id).ok_or(StoreError::NotFound)?;
        review.rating = rating;
        review.comment = comment;
        review.updated_at = Utc::now();
        Ok(review.clone())
    }

    async fn delete_review(&self, id: i32) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");
        inner.reviews.remove(&id).ok_or(StoreError::NotFound)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_row(buyer_id: i32, cart_id: i32, total: Decimal) -> CreateOrderEntity {
        CreateOrderEntity {
            buyer_id,
            cart_id,
            status: "pending".into(),
            delivery_method: "pickup".into(),
            delivery_address: None,
            pickup_location: Some("Student Center".into()),
            subtotal: total,
            delivery_fee: Decimal::ZERO,
            total,
        }
    }

    fn line(product_id: i32, quantity: i32, unit_price: Decimal) -> CheckoutLine {
        CheckoutLine {
            product_id,
            variant_id: None,
            quantity,
            unit_price,
            subtotal: unit_price * Decimal::from(quantity),
        }
    }

    #[tokio::test]
    async fn reserve_stock_is_conditional() {
        let store = MemoryStore::new();
        let product = store.seed_product(1, "Desk lamp", Decimal::new(1500, 2), 5);

        store.reserve_stock(product.id, 3).await.unwrap();
        assert_eq!(store.product_stock(product.id), Some(2));

        let err = store.reserve_stock(product.id, 3).await.unwrap_err();
        assert!(
            matches!(err, StoreError::InsufficientStock { product_id } if product_id == product.id)
        );
        assert_eq!(store.product_stock(product.id), Some(2));

        store.release_stock(product.id, 3).await.unwrap();
        assert_eq!(store.product_stock(product.id), Some(5));
    }

    #[tokio::test]
    async fn cart_creation_is_idempotent_per_buyer() {
        let store = MemoryStore::new();

        let first = store.find_or_create_cart(7).await.unwrap();
        let second = store.find_or_create_cart(7).await.unwrap();
        assert_eq!(first.id, second.id);

        let other = store.find_or_create_cart(8).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn commit_checkout_decrements_stock_and_clears_cart() {
        let store = MemoryStore::new();
        let product = store.seed_product(1, "Hoodie", Decimal::new(3000, 2), 5);
        let cart = store.find_or_create_cart(7).await.unwrap();
        store
            .insert_cart_item(CreateCartItemEntity {
                cart_id: cart.id,
                product_id: product.id,
                variant_id: None,
                quantity: 2,
                unit_price: product.price,
                subtotal: Decimal::new(6000, 2),
            })
            .await
            .unwrap();

        let (order, items) = store
            .commit_checkout(
                order_row(7, cart.id, Decimal::new(6000, 2)),
                vec![line(product.id, 2, product.price)],
            )
            .await
            .unwrap();

        assert_eq!(order.status, "pending");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].order_id, order.id);
        assert_eq!(store.product_stock(product.id), Some(3));
        assert!(store.cart_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_checkout_aborts_when_any_line_lacks_stock() {
        let store = MemoryStore::new();
        let plenty = store.seed_product(1, "Sticker pack", Decimal::new(500, 2), 50);
        let scarce = store.seed_product(1, "Hoodie", Decimal::new(3000, 2), 1);
        let cart = store.find_or_create_cart(7).await.unwrap();
        store
            .insert_cart_item(CreateCartItemEntity {
                cart_id: cart.id,
                product_id: scarce.id,
                variant_id: None,
                quantity: 2,
                unit_price: scarce.price,
                subtotal: Decimal::new(6000, 2),
            })
            .await
            .unwrap();

        let err = store
            .commit_checkout(
                order_row(7, cart.id, Decimal::new(6500, 2)),
                vec![line(plenty.id, 1, plenty.price), line(scarce.id, 2, scarce.price)],
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, StoreError::InsufficientStock { product_id } if product_id == scarce.id)
        );
        assert_eq!(store.product_stock(plenty.id), Some(50));
        assert_eq!(store.product_stock(scarce.id), Some(1));
        assert_eq!(store.cart_items(cart.id).await.unwrap().len(), 1);
        assert!(store.all_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_payment_for_same_order_is_rejected() {
        let store = MemoryStore::new();
        let product = store.seed_product(1, "Hoodie", Decimal::new(3000, 2), 5);
        let cart = store.find_or_create_cart(7).await.unwrap();
        let (order, _) = store
            .commit_checkout(
                order_row(7, cart.id, Decimal::new(3000, 2)),
                vec![line(product.id, 1, product.price)],
            )
            .await
            .unwrap();

        store
            .insert_payment(
                CreatePaymentEntity {
                    order_id: order.id,
                    method: "cash_on_pickup".into(),
                    amount: order.total,
                    status: "pending".into(),
                    paid_at: None,
                },
                None,
            )
            .await
            .unwrap();

        let err = store
            .insert_payment(
                CreatePaymentEntity {
                    order_id: order.id,
                    method: "mobile_wallet".into(),
                    amount: order.total,
                    status: "pending".into(),
                    paid_at: None,
                },
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn transition_requires_observed_status() {
        let store = MemoryStore::new();
        let product = store.seed_product(1, "Hoodie", Decimal::new(3000, 2), 5);
        let cart = store.find_or_create_cart(7).await.unwrap();
        let (order, _) = store
            .commit_checkout(
                order_row(7, cart.id, Decimal::new(6000, 2)),
                vec![line(product.id, 2, product.price)],
            )
            .await
            .unwrap();
        assert_eq!(store.product_stock(product.id), Some(3));

        let err = store
            .transition_order(order.id, OrderStatus::Paid, OrderStatus::Shipped, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        let releases = [StockRelease {
            product_id: product.id,
            quantity: 2,
        }];
        let cancelled = store
            .transition_order(order.id, OrderStatus::Pending, OrderStatus::Cancelled, &releases)
            .await
            .unwrap();

        assert_eq!(cancelled.status, "cancelled");
        assert_eq!(store.product_stock(product.id), Some(5));
    }
}
