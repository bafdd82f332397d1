mod common;

use common::{market, money};
use unimart_orderservice::services::{MarketError, checkout::standard_delivery_fee};

const BUYER: i32 = 1;

#[tokio::test]
async fn pickup_checkout_creates_a_pending_order_and_empties_the_cart() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    let cap = m.store.seed_product(11, "Cap", money(1500), 5);

    m.carts.add_item(BUYER, mug.id, None, 2).await.unwrap();
    m.carts.add_item(BUYER, cap.id, None, 1).await.unwrap();

    let placed = m
        .checkout
        .checkout(BUYER, "pickup", None, Some("Student Center".into()))
        .await
        .unwrap();

    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.order.delivery_method, "pickup");
    assert_eq!(placed.order.pickup_location.as_deref(), Some("Student Center"));
    assert_eq!(placed.order.subtotal, money(6500));
    assert_eq!(placed.order.delivery_fee, money(0));
    assert_eq!(placed.order.total, money(6500));
    assert_eq!(placed.items.len(), 2);

    // Stock moved, cart is empty, lines kept their frozen prices.
    assert_eq!(m.store.product_stock(mug.id), Some(8));
    assert_eq!(m.store.product_stock(cap.id), Some(4));
    let view = m.carts.view(BUYER).await.unwrap();
    assert!(view.items.is_empty());
    let mug_line = placed
        .items
        .iter()
        .find(|item| item.product_id == mug.id)
        .unwrap();
    assert_eq!(mug_line.unit_price, money(2500));
    assert_eq!(mug_line.subtotal, money(5000));
}

#[tokio::test]
async fn delivery_checkout_charges_the_flat_fee() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();

    let placed = m
        .checkout
        .checkout(BUYER, "delivery", Some("Dorm 4, Room 212".into()), None)
        .await
        .unwrap();

    assert_eq!(placed.order.delivery_fee, standard_delivery_fee());
    assert_eq!(placed.order.total, money(2500) + standard_delivery_fee());
    assert_eq!(placed.order.delivery_address.as_deref(), Some("Dorm 4, Room 212"));
    assert_eq!(placed.order.pickup_location, None);
}

#[tokio::test]
async fn delivery_requires_an_address_and_pickup_a_location() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();

    let err = m
        .checkout
        .checkout(BUYER, "delivery", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));

    let err = m
        .checkout
        .checkout(BUYER, "delivery", Some("   ".into()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));

    let err = m
        .checkout
        .checkout(BUYER, "pickup", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
}

#[tokio::test]
async fn pickup_discards_a_stray_delivery_address() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();

    let placed = m
        .checkout
        .checkout(
            BUYER,
            "pickup",
            Some("should be ignored".into()),
            Some("Library".into()),
        )
        .await
        .unwrap();

    assert_eq!(placed.order.delivery_address, None);
    assert_eq!(placed.order.pickup_location.as_deref(), Some("Library"));
}

#[tokio::test]
async fn unknown_delivery_method_is_rejected() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();

    let err = m
        .checkout
        .checkout(BUYER, "drone", None, Some("Roof".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
}

#[tokio::test]
async fn empty_cart_cannot_check_out() {
    let m = market();

    let err = m
        .checkout
        .checkout(BUYER, "pickup", None, Some("Student Center".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::CartEmpty));
}

#[tokio::test]
async fn a_single_short_line_aborts_the_whole_checkout() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    let rare = m.store.seed_product(11, "Signed Print", money(9000), 1);

    m.carts.add_item(BUYER, mug.id, None, 2).await.unwrap();
    m.carts.add_item(BUYER, rare.id, None, 1).await.unwrap();

    // Someone else takes the last print before this buyer commits.
    let other_buyer = 2;
    m.carts.add_item(other_buyer, rare.id, None, 1).await.unwrap();
    m.checkout
        .checkout(other_buyer, "pickup", None, Some("Gate A".into()))
        .await
        .unwrap();

    let err = m
        .checkout
        .checkout(BUYER, "pickup", None, Some("Gate A".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::InsufficientStock { product_id } if product_id == rare.id
    ));

    // Nothing moved: mug stock intact, cart still holds both lines.
    assert_eq!(m.store.product_stock(mug.id), Some(10));
    assert_eq!(m.store.product_stock(rare.id), Some(0));
    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.items.len(), 2);
    assert!(m.orders.list_for_buyer(BUYER).await.unwrap().is_empty());
}

#[tokio::test]
async fn variant_lines_of_one_product_share_the_stock_pool() {
    let m = market();
    let shirt = m.store.seed_product(10, "Shirt", money(2000), i32::MAX);
    let medium = m.store.seed_variant(shirt.id, "M", money(0));

    // Two lines of the same product; together they exceed the stock even
    // though each passed its own add-time check.
    m.carts.add_item(BUYER, shirt.id, None, i32::MAX).await.unwrap();
    m.carts
        .add_item(BUYER, shirt.id, Some(medium.id), 1)
        .await
        .unwrap();

    let err = m
        .checkout
        .checkout(BUYER, "pickup", None, Some("Student Center".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::InsufficientStock { product_id } if product_id == shirt.id
    ));
    assert_eq!(m.store.product_stock(shirt.id), Some(i32::MAX));
    assert_eq!(m.carts.view(BUYER).await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn order_totals_are_frozen_against_later_price_changes() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.carts.add_item(BUYER, mug.id, None, 2).await.unwrap();

    let placed = m
        .checkout
        .checkout(BUYER, "delivery", Some("Dorm 4".into()), None)
        .await
        .unwrap();

    m.store.set_product_price(mug.id, money(9999));

    let fetched = m.orders.get_for_buyer(BUYER, placed.order.id).await.unwrap();
    assert_eq!(fetched.order.subtotal, money(5000));
    assert_eq!(fetched.order.delivery_fee, standard_delivery_fee());
    assert_eq!(fetched.order.total, money(5000) + standard_delivery_fee());
    assert_eq!(fetched.items[0].unit_price, money(2500));
    assert_eq!(fetched.items[0].subtotal, money(5000));
    assert_eq!(
        fetched.order.subtotal,
        fetched.items.iter().map(|item| item.subtotal).sum()
    );
}
