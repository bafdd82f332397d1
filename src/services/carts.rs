use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{CartEntity, CartItemEntity, CreateCartItemEntity},
    store::{MarketStore, StoreError},
};

use super::{MarketError, ServiceResult};

/// Cart aggregate rules: one cart per buyer, lines merged per
/// product+variant, unit prices frozen at add time. Carts never hold
/// inventory; stock checks here are advisory until checkout commits.
pub struct CartService {
    store: Arc<dyn MarketStore>,
}

/// Cart plus its lines and the derived totals the contract exposes.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart: CartEntity,
    pub items: Vec<CartItemEntity>,
    pub total: Decimal,
    pub item_count: i32,
}

impl CartService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn view(&self, buyer_id: i32) -> ServiceResult<CartView> {
        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let items = self.store.cart_items(cart.id).await?;

        let total = items.iter().map(|item| item.subtotal).sum();
        let item_count = items
            .iter()
            .map(|item| item.quantity)
            .fold(0_i32, i32::saturating_add);

        Ok(CartView {
            cart,
            items,
            total,
            item_count,
        })
    }

    pub async fn add_item(
        &self,
        buyer_id: i32,
        product_id: i32,
        variant_id: Option<i32>,
        quantity: i32,
    ) -> ServiceResult<CartItemEntity> {
        if quantity < 1 {
            return Err(MarketError::Validation(
                "Quantity must be at least 1".into(),
            ));
        }

        let product = self
            .store
            .product(product_id)
            .await?
            .filter(|product| product.is_active)
            .ok_or(MarketError::ProductUnavailable { product_id })?;

        let variant = match variant_id {
            Some(id) => {
                let variant = self
                    .store
                    .variant(id)
                    .await?
                    .filter(|variant| variant.product_id == product_id)
                    .ok_or(MarketError::InvalidVariant)?;
                Some(variant)
            }
            None => None,
        };

        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let items = self.store.cart_items(cart.id).await?;
        let existing = items
            .into_iter()
            .find(|item| item.product_id == product_id && item.variant_id == variant_id);

        match existing {
            // Merge into the existing line, keeping its price-at-add.
            Some(line) => {
                // Saturate; a wrapped sum would slip past the stock check.
                let merged = line.quantity.saturating_add(quantity);
                if product.stock_quantity < merged {
                    return Err(MarketError::InsufficientStock { product_id });
                }
                let subtotal = line.unit_price * Decimal::from(merged);
                let updated = self
                    .store
                    .update_cart_item_quantity(line.id, merged, subtotal)
                    .await?;
                Ok(updated)
            }
            None => {
                if product.stock_quantity < quantity {
                    return Err(MarketError::InsufficientStock { product_id });
                }
                let unit_price = match &variant {
                    Some(variant) => product.price + variant.price_delta,
                    None => product.price,
                };
                let subtotal = unit_price * Decimal::from(quantity);
                let created = self
                    .store
                    .insert_cart_item(CreateCartItemEntity {
                        cart_id: cart.id,
                        product_id,
                        variant_id,
                        quantity,
                        unit_price,
                        subtotal,
                    })
                    .await?;
                Ok(created)
            }
        }
    }

    pub async fn update_item(
        &self,
        buyer_id: i32,
        item_id: i32,
        quantity: i32,
    ) -> ServiceResult<CartItemEntity> {
        if quantity < 1 {
            return Err(MarketError::Validation(
                "Quantity must be at least 1".into(),
            ));
        }

        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let items = self.store.cart_items(cart.id).await?;
        let line = items
            .into_iter()
            .find(|item| item.id == item_id)
            .ok_or(MarketError::ItemNotFound)?;

        // Revalidate against current stock; the unit price stays frozen.
        let product = self
            .store
            .product(line.product_id)
            .await?
            .ok_or(MarketError::ProductUnavailable {
                product_id: line.product_id,
            })?;
        if product.stock_quantity < quantity {
            return Err(MarketError::InsufficientStock {
                product_id: line.product_id,
            });
        }

        let subtotal = line.unit_price * Decimal::from(quantity);
        let updated = self
            .store
            .update_cart_item_quantity(line.id, quantity, subtotal)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::ItemNotFound,
                other => MarketError::Store(other),
            })?;

        Ok(updated)
    }

    pub async fn remove_item(&self, buyer_id: i32, item_id: i32) -> ServiceResult<()> {
        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let items = self.store.cart_items(cart.id).await?;
        if !items.iter().any(|item| item.id == item_id) {
            return Err(MarketError::ItemNotFound);
        }

        self.store
            .delete_cart_item(item_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::ItemNotFound,
                other => MarketError::Store(other),
            })?;

        Ok(())
    }

    /// Empties the cart; the cart row itself survives. Returns the number
    /// of removed lines.
    pub async fn clear(&self, buyer_id: i32) -> ServiceResult<usize> {
        let cart = self.store.find_or_create_cart(buyer_id).await?;
        let removed = self.store.clear_cart(cart.id).await?;
        Ok(removed)
    }
}
