use std::sync::Arc;

use rust_decimal::Decimal;
use unimart_orderservice::{
    services::{
        carts::CartService, checkout::CheckoutService, orders::OrderService,
        payments::PaymentService, reviews::ReviewService,
    },
    store::{MarketStore, memory::MemoryStore},
};

/// In-memory marketplace with every service wired to the same store.
pub struct TestMarket {
    pub store: MemoryStore,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reviews: ReviewService,
}

pub fn market() -> TestMarket {
    let store = MemoryStore::new();
    let shared: Arc<dyn MarketStore> = Arc::new(store.clone());
    TestMarket {
        store,
        carts: CartService::new(shared.clone()),
        checkout: CheckoutService::new(shared.clone()),
        orders: OrderService::new(shared.clone()),
        payments: PaymentService::new(shared.clone()),
        reviews: ReviewService::new(shared),
    }
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
