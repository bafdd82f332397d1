use std::sync::Arc;

use crate::{
    domain::OrderStatus,
    models::OrderEntity,
    store::{MarketStore, StockRelease, StoreError},
};

use super::{MarketError, OrderWithItems, ServiceResult, group_order_items, stored_order_status};

/// Order state machine and the role-scoped reads around it. Every
/// transition is conditional on the status the caller observed, so
/// concurrent writers cannot double-apply side effects such as stock
/// release.
pub struct OrderService {
    store: Arc<dyn MarketStore>,
}

impl OrderService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Another buyer's order is indistinguishable from an absent one.
    pub async fn get_for_buyer(
        &self,
        buyer_id: i32,
        order_id: i32,
    ) -> ServiceResult<OrderWithItems> {
        let order = self
            .store
            .order(order_id)
            .await?
            .filter(|order| order.buyer_id == buyer_id)
            .ok_or(MarketError::OrderNotFound)?;
        let items = self.store.order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn list_for_buyer(&self, buyer_id: i32) -> ServiceResult<Vec<OrderWithItems>> {
        let orders = self.store.orders_for_buyer(buyer_id).await?;
        self.with_items(orders).await
    }

    /// Orders containing at least one of the seller's products.
    pub async fn list_for_seller(&self, seller_id: i32) -> ServiceResult<Vec<OrderWithItems>> {
        let orders = self.store.orders_for_seller(seller_id).await?;
        self.with_items(orders).await
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<OrderWithItems>> {
        let orders = self.store.all_orders().await?;
        self.with_items(orders).await
    }

    pub async fn get_any(&self, order_id: i32) -> ServiceResult<OrderWithItems> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;
        let items = self.store.order_items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    async fn with_items(&self, orders: Vec<OrderEntity>) -> ServiceResult<Vec<OrderWithItems>> {
        let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
        let items = self.store.order_items_for_orders(&order_ids).await?;
        Ok(group_order_items(orders, items))
    }

    /// Buyers may cancel only their own orders, and only while `pending`.
    /// Cancellation returns every reserved unit to stock in the same
    /// transaction as the status write.
    pub async fn cancel_by_buyer(
        &self,
        buyer_id: i32,
        order_id: i32,
    ) -> ServiceResult<OrderWithItems> {
        let order = self
            .store
            .order(order_id)
            .await?
            .filter(|order| order.buyer_id == buyer_id)
            .ok_or(MarketError::OrderNotFound)?;

        let from = stored_order_status(&order)?;
        if from != OrderStatus::Pending {
            return Err(MarketError::InvalidTransition {
                from,
                to: OrderStatus::Cancelled,
            });
        }

        let items = self.store.order_items(order.id).await?;
        let releases: Vec<StockRelease> = items
            .iter()
            .map(|item| StockRelease {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();

        let cancelled = self
            .store
            .transition_order(
                order.id,
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                &releases,
            )
            .await
            .map_err(|err| match err {
                // The status moved between our read and the write.
                StoreError::NotFound => MarketError::InvalidTransition {
                    from,
                    to: OrderStatus::Cancelled,
                },
                other => MarketError::Store(other),
            })?;

        tracing::info!(order_id = cancelled.id, buyer_id, "order cancelled by buyer");

        Ok(OrderWithItems {
            order: cancelled,
            items,
        })
    }

    /// Sellers may set any enumerated status on orders that contain at
    /// least one of their products; terminal orders are frozen. Moving to
    /// `cancelled` releases stock for every order item.
    pub async fn transition_by_seller(
        &self,
        seller_id: i32,
        order_id: i32,
        next_status: &str,
    ) -> ServiceResult<OrderEntity> {
        let to = OrderStatus::parse(next_status)
            .ok_or_else(|| MarketError::Validation("Unknown order status".into()))?;

        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;

        let items = self.store.order_items(order.id).await?;
        let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
        let products = self.store.products_by_ids(&product_ids).await?;
        let involved = products
            .iter()
            .any(|product| product.seller_id == seller_id);
        if !involved {
            return Err(MarketError::Forbidden(
                "Order does not contain any of this seller's products".into(),
            ));
        }

        let from = stored_order_status(&order)?;
        if from.is_terminal() {
            return Err(MarketError::InvalidTransition { from, to });
        }

        let releases: Vec<StockRelease> = if to == OrderStatus::Cancelled {
            items
                .iter()
                .map(|item| StockRelease {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect()
        } else {
            Vec::new()
        };

        let updated = self
            .store
            .transition_order(order.id, from, to, &releases)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::InvalidTransition { from, to },
                other => MarketError::Store(other),
            })?;

        tracing::info!(
            order_id = updated.id,
            seller_id,
            from = %from,
            to = %to,
            "order status changed by seller"
        );

        Ok(updated)
    }
}
