//! Diesel-backed [`MarketStore`] running against Postgres.

use anyhow::Context;
use async_trait::async_trait;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl, pooled_connection::bb8::PooledConnection,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::DbPool,
    domain::{OrderStatus, PaymentStatus},
    models::{
        CartEntity, CartItemEntity, CreateCartEntity, CreateCartItemEntity, CreateOrderEntity,
        CreateOrderItemEntity, CreatePaymentEntity, CreateReviewEntity, OrderEntity,
        OrderItemEntity, PaymentEntity, ProductEntity, ProductVariantEntity, ReviewEntity,
        UpdatePaymentEntity,
    },
    schema::{cart_items, carts, order_items, orders, payments, product_variants, products, reviews},
};

use super::{
    CheckoutLine, MarketStore, OrderStatusSync, PaymentPatch, StockRelease, StoreError,
    StoreResult,
};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<PooledConnection<'_, AsyncPgConnection>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;
        Ok(conn)
    }
}

/// Conditional order-status update used inside payment transactions. A miss
/// means the order moved concurrently; the caller rolls back.
async fn apply_status_sync(
    conn: &mut AsyncPgConnection,
    sync: OrderStatusSync,
) -> Result<OrderEntity, StoreError> {
    let order: Option<OrderEntity> = diesel::update(orders::table)
        .filter(orders::id.eq(sync.order_id))
        .filter(orders::status.eq(sync.from.as_str()))
        .set((
            orders::status.eq(sync.to.as_str()),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()?;

    order.ok_or(StoreError::NotFound)
}

#[async_trait]
impl MarketStore for PgStore {
    async fn product(&self, id: i32) -> StoreResult<Option<ProductEntity>> {
        let conn = &mut self.conn().await?;

        let product = products::table
            .filter(products::id.eq(id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(product)
    }

    async fn products_by_ids(&self, ids: &[i32]) -> StoreResult<Vec<ProductEntity>> {
        let conn = &mut self.conn().await?;

        let rows = products::table
            .filter(products::id.eq_any(ids))
            .get_results(conn)
            .await?;

        Ok(rows)
    }

    async fn variant(&self, id: i32) -> StoreResult<Option<ProductVariantEntity>> {
        let conn = &mut self.conn().await?;

        let variant = product_variants::table
            .filter(product_variants::id.eq(id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(variant)
    }

    async fn reserve_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        // One conditional statement; no read-then-write window.
        let affected = diesel::update(products::table)
            .filter(products::id.eq(product_id))
            .filter(products::stock_quantity.ge(quantity))
            .set((
                products::stock_quantity.eq(products::stock_quantity - quantity),
                products::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await?;

        if affected == 0 {
            return Err(StoreError::InsufficientStock { product_id });
        }

        Ok(())
    }

    async fn release_stock(&self, product_id: i32, quantity: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        diesel::update(products::table)
            .filter(products::id.eq(product_id))
            .set((
                products::stock_quantity.eq(products::stock_quantity + quantity),
                products::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn find_or_create_cart(&self, buyer_id: i32) -> StoreResult<CartEntity> {
        let conn = &mut self.conn().await?;

        // Concurrent first calls race on the UNIQUE (buyer_id) constraint;
        // every caller converges on the surviving row.
        diesel::insert_into(carts::table)
            .values(CreateCartEntity { buyer_id })
            .on_conflict(carts::buyer_id)
            .do_nothing()
            .execute(conn)
            .await?;

        let cart = carts::table
            .filter(carts::buyer_id.eq(buyer_id))
            .get_result(conn)
            .await?;

        Ok(cart)
    }

    async fn cart_items(&self, cart_id: i32) -> StoreResult<Vec<CartItemEntity>> {
        let conn = &mut self.conn().await?;

        let items = cart_items::table
            .filter(cart_items::cart_id.eq(cart_id))
            .order_by(cart_items::id.asc())
            .get_results(conn)
            .await?;

        Ok(items)
    }

    async fn insert_cart_item(&self, item: CreateCartItemEntity) -> StoreResult<CartItemEntity> {
        let mut conn = self.conn().await?;

        let item = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let item: CartItemEntity = diesel::insert_into(cart_items::table)
                        .values(&item)
                        .returning(CartItemEntity::as_returning())
                        .get_result(conn)
                        .await?;

                    diesel::update(carts::table)
                        .filter(carts::id.eq(item.cart_id))
                        .set(carts::updated_at.eq(diesel::dsl::now))
                        .execute(conn)
                        .await?;

                    Ok::<CartItemEntity, StoreError>(item)
                })
            })
            .await?;

        Ok(item)
    }

    async fn update_cart_item_quantity(
        &self,
        item_id: i32,
        quantity: i32,
        subtotal: Decimal,
    ) -> StoreResult<CartItemEntity> {
        let mut conn = self.conn().await?;

        let item = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let item: Option<CartItemEntity> = diesel::update(cart_items::table)
                        .filter(cart_items::id.eq(item_id))
                        .set((
                            cart_items::quantity.eq(quantity),
                            cart_items::subtotal.eq(subtotal),
                            cart_items::updated_at.eq(diesel::dsl::now),
                        ))
                        .returning(CartItemEntity::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                    let Some(item) = item else {
                        return Err(StoreError::NotFound);
                    };

                    diesel::update(carts::table)
                        .filter(carts::id.eq(item.cart_id))
                        .set(carts::updated_at.eq(diesel::dsl::now))
                        .execute(conn)
                        .await?;

                    Ok::<CartItemEntity, StoreError>(item)
                })
            })
            .await?;

        Ok(item)
    }

    async fn delete_cart_item(&self, item_id: i32) -> StoreResult<()> {
        let mut conn = self.conn().await?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                let item: Option<CartItemEntity> =
                    diesel::delete(cart_items::table.filter(cart_items::id.eq(item_id)))
                        .returning(CartItemEntity::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                let Some(item) = item else {
                    return Err(StoreError::NotFound);
                };

                diesel::update(carts::table)
                    .filter(carts::id.eq(item.cart_id))
                    .set(carts::updated_at.eq(diesel::dsl::now))
                    .execute(conn)
                    .await?;

                Ok::<(), StoreError>(())
            })
        })
        .await?;

        Ok(())
    }

    async fn clear_cart(&self, cart_id: i32) -> StoreResult<usize> {
        let mut conn = self.conn().await?;

        let removed = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let removed =
                        diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(cart_id)))
                            .execute(conn)
                            .await?;

                    diesel::update(carts::table)
                        .filter(carts::id.eq(cart_id))
                        .set(carts::updated_at.eq(diesel::dsl::now))
                        .execute(conn)
                        .await?;

                    Ok::<usize, StoreError>(removed)
                })
            })
            .await?;

        Ok(removed)
    }

    async fn commit_checkout(
        &self,
        order: CreateOrderEntity,
        lines: Vec<CheckoutLine>,
    ) -> StoreResult<(OrderEntity, Vec<OrderItemEntity>)> {
        let mut conn = self.conn().await?;

        let result = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let order: OrderEntity = diesel::insert_into(orders::table)
                        .values(&order)
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await?;

                    let item_rows: Vec<CreateOrderItemEntity> = lines
                        .iter()
                        .map(|line| CreateOrderItemEntity {
                            order_id: order.id,
                            product_id: line.product_id,
                            variant_id: line.variant_id,
                            quantity: line.quantity,
                            unit_price: line.unit_price,
                            subtotal: line.subtotal,
                        })
                        .collect();

                    let items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                        .values(item_rows)
                        .returning(OrderItemEntity::as_returning())
                        .get_results(conn)
                        .await?;

                    // Conditional decrements; any miss aborts the whole unit.
                    for line in &lines {
                        let affected = diesel::update(products::table)
                            .filter(products::id.eq(line.product_id))
                            .filter(products::stock_quantity.ge(line.quantity))
                            .set((
                                products::stock_quantity
                                    .eq(products::stock_quantity - line.quantity),
                                products::updated_at.eq(diesel::dsl::now),
                            ))
                            .execute(conn)
                            .await?;

                        if affected == 0 {
                            return Err(StoreError::InsufficientStock {
                                product_id: line.product_id,
                            });
                        }
                    }

                    diesel::delete(cart_items::table.filter(cart_items::cart_id.eq(order.cart_id)))
                        .execute(conn)
                        .await?;

                    diesel::update(carts::table)
                        .filter(carts::id.eq(order.cart_id))
                        .set(carts::updated_at.eq(diesel::dsl::now))
                        .execute(conn)
                        .await?;

                    Ok::<(OrderEntity, Vec<OrderItemEntity>), StoreError>((order, items))
                })
            })
            .await?;

        Ok(result)
    }

    async fn order(&self, id: i32) -> StoreResult<Option<OrderEntity>> {
        let conn = &mut self.conn().await?;

        let order = orders::table
            .filter(orders::id.eq(id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(order)
    }

    async fn order_items(&self, order_id: i32) -> StoreResult<Vec<OrderItemEntity>> {
        let conn = &mut self.conn().await?;

        let items = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order_by(order_items::id.asc())
            .get_results(conn)
            .await?;

        Ok(items)
    }

    async fn order_items_for_orders(&self, order_ids: &[i32]) -> StoreResult<Vec<OrderItemEntity>> {
        let conn = &mut self.conn().await?;

        let items = order_items::table
            .filter(order_items::order_id.eq_any(order_ids))
            .get_results(conn)
            .await?;

        Ok(items)
    }

    async fn orders_for_buyer(&self, buyer_id: i32) -> StoreResult<Vec<OrderEntity>> {
        let conn = &mut self.conn().await?;

        let rows = orders::table
            .filter(orders::buyer_id.eq(buyer_id))
            .order_by(orders::created_at.desc())
            .get_results(conn)
            .await?;

        Ok(rows)
    }

    async fn orders_for_seller(&self, seller_id: i32) -> StoreResult<Vec<OrderEntity>> {
        let conn = &mut self.conn().await?;

        let rows = orders::table
            .inner_join(order_items::table.inner_join(products::table))
            .filter(products::seller_id.eq(seller_id))
            .select(OrderEntity::as_select())
            .distinct()
            .order_by(orders::created_at.desc())
            .get_results(conn)
            .await?;

        Ok(rows)
    }

    async fn all_orders(&self) -> StoreResult<Vec<OrderEntity>> {
        let conn = &mut self.conn().await?;

        let rows = orders::table
            .order_by(orders::created_at.desc())
            .get_results(conn)
            .await?;

        Ok(rows)
    }

    async fn transition_order(
        &self,
        order_id: i32,
        from: OrderStatus,
        to: OrderStatus,
        releases: &[StockRelease],
    ) -> StoreResult<OrderEntity> {
        let mut conn = self.conn().await?;
        let releases = releases.to_vec();

        let order = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let order = apply_status_sync(
                        conn,
                        OrderStatusSync {
                            order_id,
                            from,
                            to,
                        },
                    )
                    .await?;

                    for release in &releases {
                        diesel::update(products::table)
                            .filter(products::id.eq(release.product_id))
                            .set((
                                products::stock_quantity
                                    .eq(products::stock_quantity + release.quantity),
                                products::updated_at.eq(diesel::dsl::now),
                            ))
                            .execute(conn)
                            .await?;
                    }

                    Ok::<OrderEntity, StoreError>(order)
                })
            })
            .await?;

        Ok(order)
    }

    async fn payment(&self, id: Uuid) -> StoreResult<Option<PaymentEntity>> {
        let conn = &mut self.conn().await?;

        let payment = payments::table
            .filter(payments::id.eq(id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(payment)
    }

    async fn payment_for_order(&self, order_id: i32) -> StoreResult<Option<PaymentEntity>> {
        let conn = &mut self.conn().await?;

        let payment = payments::table
            .filter(payments::order_id.eq(order_id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(payment)
    }

    async fn insert_payment(
        &self,
        payment: CreatePaymentEntity,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)> {
        let mut conn = self.conn().await?;

        let result = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let payment: PaymentEntity = diesel::insert_into(payments::table)
                        .values(&payment)
                        .returning(PaymentEntity::as_returning())
                        .get_result(conn)
                        .await?;

                    let order = match sync {
                        Some(sync) => Some(apply_status_sync(conn, sync).await?),
                        None => None,
                    };

                    Ok::<(PaymentEntity, Option<OrderEntity>), StoreError>((payment, order))
                })
            })
            .await?;

        Ok(result)
    }

    async fn update_payment(
        &self,
        id: Uuid,
        patch: PaymentPatch,
        sync: Option<OrderStatusSync>,
    ) -> StoreResult<(PaymentEntity, Option<OrderEntity>)> {
        let mut conn = self.conn().await?;

        let result = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let changeset = UpdatePaymentEntity {
                        status: patch.status,
                        amount: patch.amount,
                        paid_at: patch.paid_at,
                    };

                    let payment: Option<PaymentEntity> = diesel::update(payments::table)
                        .filter(payments::id.eq(id))
                        .set((&changeset, payments::updated_at.eq(diesel::dsl::now)))
                        .returning(PaymentEntity::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?;

                    let Some(payment) = payment else {
                        return Err(StoreError::NotFound);
                    };

                    let order = match sync {
                        Some(sync) => Some(apply_status_sync(conn, sync).await?),
                        None => None,
                    };

                    Ok::<(PaymentEntity, Option<OrderEntity>), StoreError>((payment, order))
                })
            })
            .await?;

        Ok(result)
    }

    async fn delete_pending_payment(&self, id: Uuid) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        let affected = diesel::delete(
            payments::table
                .filter(payments::id.eq(id))
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .execute(conn)
        .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn review(&self, id: i32) -> StoreResult<Option<ReviewEntity>> {
        let conn = &mut self.conn().await?;

        let review = reviews::table
            .filter(reviews::id.eq(id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(review)
    }

    async fn review_for(&self, user_id: i32, product_id: i32) -> StoreResult<Option<ReviewEntity>> {
        let conn = &mut self.conn().await?;

        let review = reviews::table
            .filter(reviews::user_id.eq(user_id))
            .filter(reviews::product_id.eq(product_id))
            .get_result(conn)
            .await
            .optional()?;

        Ok(review)
    }

    async fn has_delivered_item(&self, buyer_id: i32, product_id: i32) -> StoreResult<bool> {
        let conn = &mut self.conn().await?;

        let eligible: bool = diesel::select(diesel::dsl::exists(
            order_items::table
                .inner_join(orders::table)
                .filter(orders::buyer_id.eq(buyer_id))
                .filter(orders::status.eq(OrderStatus::Delivered.as_str()))
                .filter(order_items::product_id.eq(product_id)),
        ))
        .get_result(conn)
        .await?;

        Ok(eligible)
    }

    async fn insert_review(&self, review: CreateReviewEntity) -> StoreResult<ReviewEntity> {
        let conn = &mut self.conn().await?;

        let review = diesel::insert_into(reviews::table)
            .values(&review)
            .returning(ReviewEntity::as_returning())
            .get_result(conn)
            .await?;

        Ok(review)
    }

    async fn update_review(
        &self,
        id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> StoreResult<ReviewEntity> {
        let conn = &mut self.conn().await?;

        let review: Option<ReviewEntity> = diesel::update(reviews::table)
            .filter(reviews::id.eq(id))
            .set((
                reviews::rating.eq(rating),
                reviews::comment.eq(comment),
                reviews::updated_at.eq(diesel::dsl::now),
            ))
            .returning(ReviewEntity::as_returning())
            .get_result(conn)
            .await
            .optional()?;

        review.ok_or(StoreError::NotFound)
    }

    async fn delete_review(&self, id: i32) -> StoreResult<()> {
        let conn = &mut self.conn().await?;

        let affected = diesel::delete(reviews::table.filter(reviews::id.eq(id)))
            .execute(conn)
            .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
