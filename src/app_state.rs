use std::sync::Arc;

use crate::{
    services::{
        carts::CartService, checkout::CheckoutService, orders::OrderService,
        payments::PaymentService, reviews::ReviewService,
    },
    store::MarketStore,
};

/// Shared application state: the storage handle every service runs
/// against. Swapping the handle is how tests run the full HTTP surface
/// on the in-memory backend.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub fn carts(&self) -> CartService {
        CartService::new(self.store.clone())
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.store.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.store.clone())
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(self.store.clone())
    }

    pub fn reviews(&self) -> ReviewService {
        ReviewService::new(self.store.clone())
    }
}
