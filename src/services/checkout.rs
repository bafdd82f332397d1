use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    domain::{DeliveryMethod, OrderStatus},
    models::{CreateOrderEntity, ProductEntity},
    store::{CheckoutLine, MarketStore, StoreError},
};

use super::{MarketError, OrderWithItems, ServiceResult};

/// Flat fee charged when the buyer chooses courier delivery; pickup is
/// free.
pub fn standard_delivery_fee() -> Decimal {
    Decimal::new(1000, 2)
}

/// The cart-to-order transaction. Everything before `commit_checkout` is
/// advisory; the conditional stock decrement inside the commit is the
/// safety boundary when checkouts race.
pub struct CheckoutService {
    store: Arc<dyn MarketStore>,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn checkout(
        &self,
        buyer_id: i32,
        delivery_method: &str,
        delivery_address: Option<String>,
        pickup_location: Option<String>,
    ) -> ServiceResult<OrderWithItems> {
        let method = DeliveryMethod::parse(delivery_method)
            .ok_or_else(|| MarketError::Validation("Unknown delivery method".into()))?;

        let (delivery_address, pickup_location) = match method {
            DeliveryMethod::Delivery => {
                let address = delivery_address
                    .filter(|address| !address.trim().is_empty())
                    .ok_or_else(|| {
                        MarketError::Validation("Delivery requires a delivery address".into())
                    })?;
                (Some(address), None)
            }
            DeliveryMethod::Pickup => {
                let location = pickup_location
                    .filter(|location| !location.trim().is_empty())
                    .ok_or_else(|| {
                        MarketError::Validation("Pickup requires a pickup location".into())
                    })?;
                (None, Some(location))
            }
        };

        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let items = self.store.cart_items(cart.id).await?;
        if items.is_empty() {
            return Err(MarketError::CartEmpty);
        }

        let product_ids: Vec<i32> = items.iter().map(|item| item.product_id).collect();
        let products: HashMap<i32, ProductEntity> = self
            .store
            .products_by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        // Pre-check aggregated demand per product so two lines of the same
        // product (different variants) are counted together.
        let mut demand: HashMap<i32, i32> = HashMap::new();
        for item in &items {
            let wanted = demand.entry(item.product_id).or_insert(0);
            *wanted = wanted.saturating_add(item.quantity);
        }
        for (product_id, wanted) in &demand {
            let in_stock = products
                .get(product_id)
                .map(|product| product.stock_quantity)
                .unwrap_or(0);
            if in_stock < *wanted {
                return Err(MarketError::InsufficientStock {
                    product_id: *product_id,
                });
            }
        }

        let lines: Vec<CheckoutLine> = items
            .iter()
            .map(|item| CheckoutLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            })
            .collect();

        let subtotal: Decimal = items.iter().map(|item| item.subtotal).sum();
        let delivery_fee = match method {
            DeliveryMethod::Delivery => standard_delivery_fee(),
            DeliveryMethod::Pickup => Decimal::ZERO,
        };
        let total = subtotal + delivery_fee;

        let order_row = CreateOrderEntity {
            buyer_id,
            cart_id: cart.id,
            status: OrderStatus::Pending.as_str().to_owned(),
            delivery_method: method.as_str().to_owned(),
            delivery_address,
            pickup_location,
            subtotal,
            delivery_fee,
            total,
        };

        let (order, order_items) = self
            .store
            .commit_checkout(order_row, lines)
            .await
            .map_err(|err| match err {
                StoreError::InsufficientStock { product_id } => {
                    MarketError::InsufficientStock { product_id }
                }
                other => MarketError::Store(other),
            })?;

        tracing::info!(
            order_id = order.id,
            buyer_id,
            total = %order.total,
            "checkout committed"
        );

        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }
}
