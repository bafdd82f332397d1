mod common;

use common::{TestMarket, market, money};
use unimart_orderservice::services::MarketError;

const BUYER: i32 = 1;
const SELLER: i32 = 10;

/// Orders one unit of a fresh product and drives the order to `status`.
async fn order_with_status(m: &TestMarket, buyer: i32, status: &str) -> i32 {
    let product = m.store.seed_product(SELLER, "Mug", money(2500), 100);
    m.carts.add_item(buyer, product.id, None, 1).await.unwrap();
    let order_id = m
        .checkout
        .checkout(buyer, "pickup", None, Some("Student Center".into()))
        .await
        .unwrap()
        .order
        .id;
    if status != "pending" {
        m.orders
            .transition_by_seller(SELLER, order_id, status)
            .await
            .unwrap();
    }
    product.id
}

#[tokio::test]
async fn reviews_require_a_delivered_order() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "pending").await;

    let err = m
        .reviews
        .create(BUYER, product_id, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotEligible));
}

#[tokio::test]
async fn shipped_is_not_delivered() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "shipped").await;

    let err = m
        .reviews
        .create(BUYER, product_id, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotEligible));
}

#[tokio::test]
async fn a_completed_order_no_longer_counts() {
    // The gate is strict: exactly `delivered`, nothing before or after.
    let m = market();
    let product_id = order_with_status(&m, BUYER, "completed").await;

    let err = m
        .reviews
        .create(BUYER, product_id, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotEligible));
}

#[tokio::test]
async fn delivered_orders_unlock_the_review() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "delivered").await;

    let review = m
        .reviews
        .create(BUYER, product_id, 5, Some("Held up all semester".into()))
        .await
        .unwrap();
    assert_eq!(review.rating, 5);
    assert_eq!(review.comment.as_deref(), Some("Held up all semester"));
}

#[tokio::test]
async fn delivery_to_one_buyer_grants_nothing_to_another() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "delivered").await;

    let err = m.reviews.create(2, product_id, 5, None).await.unwrap_err();
    assert!(matches!(err, MarketError::NotEligible));
}

#[tokio::test]
async fn ratings_live_between_one_and_five() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "delivered").await;

    for rating in [0, 6, -3] {
        let err = m
            .reviews
            .create(BUYER, product_id, rating, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    let review = m.reviews.create(BUYER, product_id, 1, None).await.unwrap();
    let err = m
        .reviews
        .update(BUYER, review.id, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Validation(_)));
}

#[tokio::test]
async fn one_review_per_buyer_and_product() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "delivered").await;

    m.reviews.create(BUYER, product_id, 4, None).await.unwrap();
    let err = m
        .reviews
        .create(BUYER, product_id, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::AlreadyReviewed));
}

#[tokio::test]
async fn only_the_author_may_edit_or_remove() {
    let m = market();
    let product_id = order_with_status(&m, BUYER, "delivered").await;
    let review = m
        .reviews
        .create(BUYER, product_id, 3, Some("fine".into()))
        .await
        .unwrap();

    let err = m
        .reviews
        .update(2, review.id, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));
    let err = m.reviews.delete(2, review.id).await.unwrap_err();
    assert!(matches!(err, MarketError::Forbidden(_)));

    let updated = m
        .reviews
        .update(BUYER, review.id, 4, Some("better than expected".into()))
        .await
        .unwrap();
    assert_eq!(updated.rating, 4);
    assert_eq!(updated.comment.as_deref(), Some("better than expected"));

    m.reviews.delete(BUYER, review.id).await.unwrap();
    let err = m.reviews.delete(BUYER, review.id).await.unwrap_err();
    assert!(matches!(err, MarketError::ReviewNotFound));
}
