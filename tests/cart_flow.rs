mod common;

use common::{market, money};
use unimart_orderservice::services::MarketError;

const BUYER: i32 = 1;

#[tokio::test]
async fn adding_items_accumulates_lines_and_totals() {
    let m = market();
    let mug = m.store.seed_product(10, "Campus Mug", money(2500), 10);
    let hoodie = m.store.seed_product(11, "Hoodie", money(10_50), 5);

    m.carts.add_item(BUYER, mug.id, None, 2).await.unwrap();
    m.carts.add_item(BUYER, hoodie.id, None, 1).await.unwrap();

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.item_count, 3);
    assert_eq!(view.total, money(6050));
}

#[tokio::test]
async fn same_product_and_variant_merge_into_one_line() {
    let m = market();
    let shirt = m.store.seed_product(10, "Shirt", money(2000), 10);
    let xl = m.store.seed_variant(shirt.id, "XL", money(200));

    m.carts.add_item(BUYER, shirt.id, None, 2).await.unwrap();
    let merged = m.carts.add_item(BUYER, shirt.id, None, 3).await.unwrap();
    assert_eq!(merged.quantity, 5);
    assert_eq!(merged.subtotal, money(10_000));

    // A different variant of the same product is its own line.
    let with_xl = m
        .carts
        .add_item(BUYER, shirt.id, Some(xl.id), 1)
        .await
        .unwrap();
    assert_eq!(with_xl.quantity, 1);
    assert_eq!(with_xl.unit_price, money(2200));

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.item_count, 6);
}

#[tokio::test]
async fn merged_quantity_is_checked_against_stock() {
    let m = market();
    let poster = m.store.seed_product(10, "Poster", money(500), 4);

    m.carts.add_item(BUYER, poster.id, None, 3).await.unwrap();
    let err = m.carts.add_item(BUYER, poster.id, None, 2).await.unwrap_err();
    assert!(matches!(
        err,
        MarketError::InsufficientStock { product_id } if product_id == poster.id
    ));

    // The existing line is untouched by the failed merge.
    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.item_count, 3);
}

#[tokio::test]
async fn oversized_merge_requests_fail_on_stock() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);

    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();
    let err = m
        .carts
        .add_item(BUYER, mug.id, None, i32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::InsufficientStock { product_id } if product_id == mug.id
    ));

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.item_count, 1);
    assert_eq!(view.items[0].subtotal, money(2500));
}

#[tokio::test]
async fn view_totals_survive_extreme_line_quantities() {
    let m = market();
    let pens = m.store.seed_product(10, "Pen", money(100), i32::MAX);
    let clips = m.store.seed_product(10, "Clip", money(50), i32::MAX);

    m.carts.add_item(BUYER, pens.id, None, i32::MAX).await.unwrap();
    m.carts.add_item(BUYER, clips.id, None, i32::MAX).await.unwrap();

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.items.len(), 2);
    // The count clamps instead of wrapping once it leaves i32 range.
    assert_eq!(view.item_count, i32::MAX);
}

#[tokio::test]
async fn line_prices_stay_frozen_after_catalog_changes() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);

    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();
    m.store.set_product_price(mug.id, money(3000));

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.items[0].unit_price, money(2500));

    // Quantity updates recompute the subtotal from the frozen price.
    let updated = m
        .carts
        .update_item(BUYER, view.items[0].id, 4)
        .await
        .unwrap();
    assert_eq!(updated.unit_price, money(2500));
    assert_eq!(updated.subtotal, money(10_000));
}

#[tokio::test]
async fn inactive_products_cannot_be_added() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    m.store.set_product_active(mug.id, false);

    let err = m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap_err();
    assert!(matches!(
        err,
        MarketError::ProductUnavailable { product_id } if product_id == mug.id
    ));
}

#[tokio::test]
async fn variant_must_belong_to_the_product() {
    let m = market();
    let shirt = m.store.seed_product(10, "Shirt", money(2000), 10);
    let other = m.store.seed_product(10, "Cap", money(1500), 10);
    let cap_size = m.store.seed_variant(other.id, "L", money(0));

    let err = m
        .carts
        .add_item(BUYER, shirt.id, Some(cap_size.id), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidVariant));
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);

    let err = m.carts.add_item(BUYER, mug.id, None, 0).await.unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));

    m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();
    let view = m.carts.view(BUYER).await.unwrap();
    let err = m
        .carts
        .update_item(BUYER, view.items[0].id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
}

#[tokio::test]
async fn cart_lines_are_scoped_to_their_owner() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);

    let line = m.carts.add_item(BUYER, mug.id, None, 1).await.unwrap();

    // Another buyer cannot see, update, or remove the line.
    let err = m.carts.update_item(2, line.id, 3).await.unwrap_err();
    assert!(matches!(err, MarketError::ItemNotFound));
    let err = m.carts.remove_item(2, line.id).await.unwrap_err();
    assert!(matches!(err, MarketError::ItemNotFound));

    // The owner can.
    m.carts.remove_item(BUYER, line.id).await.unwrap();
    let view = m.carts.view(BUYER).await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn clear_reports_how_many_lines_went() {
    let m = market();
    let mug = m.store.seed_product(10, "Mug", money(2500), 10);
    let cap = m.store.seed_product(10, "Cap", money(1500), 10);

    m.carts.add_item(BUYER, mug.id, None, 2).await.unwrap();
    m.carts.add_item(BUYER, cap.id, None, 1).await.unwrap();

    assert_eq!(m.carts.clear(BUYER).await.unwrap(), 2);
    assert_eq!(m.carts.clear(BUYER).await.unwrap(), 0);

    let view = m.carts.view(BUYER).await.unwrap();
    assert_eq!(view.total, money(0));
    assert_eq!(view.item_count, 0);
}
