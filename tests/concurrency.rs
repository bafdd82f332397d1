mod common;

use common::{market, money};
use unimart_orderservice::services::MarketError;

const SELLER: i32 = 10;

#[tokio::test]
async fn racing_checkouts_never_oversell() {
    let m = market();
    let print = m.store.seed_product(SELLER, "Limited Print", money(4000), 3);

    m.carts.add_item(1, print.id, None, 2).await.unwrap();
    m.carts.add_item(2, print.id, None, 2).await.unwrap();

    let (first, second) = tokio::join!(
        m.checkout
            .checkout(1, "pickup", None, Some("Gate A".into())),
        m.checkout
            .checkout(2, "pickup", None, Some("Gate B".into())),
    );

    let oks = [first.is_ok(), second.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(oks, 1, "exactly one of the racing checkouts may commit");
    assert_eq!(m.store.product_stock(print.id), Some(1));

    // The loser failed on stock and keeps their cart for a retry.
    let (loser, result) = if first.is_ok() { (2, second) } else { (1, first) };
    assert!(matches!(
        result.unwrap_err(),
        MarketError::InsufficientStock { product_id } if product_id == print.id
    ));
    let view = m.carts.view(loser).await.unwrap();
    assert_eq!(view.item_count, 2);
}

#[tokio::test]
async fn racing_cancellations_release_stock_once() {
    let m = market();
    let mug = m.store.seed_product(SELLER, "Mug", money(2500), 10);

    m.carts.add_item(1, mug.id, None, 2).await.unwrap();
    let order_id = m
        .checkout
        .checkout(1, "pickup", None, Some("Student Center".into()))
        .await
        .unwrap()
        .order
        .id;
    assert_eq!(m.store.product_stock(mug.id), Some(8));

    let (buyer_side, seller_side) = tokio::join!(
        m.orders.cancel_by_buyer(1, order_id),
        m.orders.transition_by_seller(SELLER, order_id, "cancelled"),
    );

    let oks = [buyer_side.is_ok(), seller_side.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(oks, 1, "only one cancellation may apply");
    assert_eq!(m.store.product_stock(mug.id), Some(10));

    let order = m.orders.get_any(order_id).await.unwrap();
    assert_eq!(order.order.status, "cancelled");
}
