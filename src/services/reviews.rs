use std::sync::Arc;

use crate::{
    models::{CreateReviewEntity, ReviewEntity},
    store::{MarketStore, StoreError},
};

use super::{MarketError, ServiceResult};

/// Review eligibility gate: one review per (user, product), and only
/// after the user received the product in a `delivered` order.
pub struct ReviewService {
    store: Arc<dyn MarketStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        user_id: i32,
        product_id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> ServiceResult<ReviewEntity> {
        validate_rating(rating)?;

        if self.store.review_for(user_id, product_id).await?.is_some() {
            return Err(MarketError::AlreadyReviewed);
        }

        if !self.store.has_delivered_item(user_id, product_id).await? {
            return Err(MarketError::NotEligible);
        }

        let review = self
            .store
            .insert_review(CreateReviewEntity {
                product_id,
                user_id,
                rating,
                comment,
            })
            .await
            .map_err(|err| match err {
                StoreError::Duplicate => MarketError::AlreadyReviewed,
                other => MarketError::Store(other),
            })?;

        tracing::info!(review_id = review.id, user_id, product_id, "review created");

        Ok(review)
    }

    /// Full replace of rating and comment, author only.
    pub async fn update(
        &self,
        user_id: i32,
        review_id: i32,
        rating: i32,
        comment: Option<String>,
    ) -> ServiceResult<ReviewEntity> {
        validate_rating(rating)?;

        let review = self
            .store
            .review(review_id)
            .await?
            .ok_or(MarketError::ReviewNotFound)?;
        if review.user_id != user_id {
            return Err(MarketError::Forbidden(
                "Review belongs to another user".into(),
            ));
        }

        let updated = self
            .store
            .update_review(review_id, rating, comment)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::ReviewNotFound,
                other => MarketError::Store(other),
            })?;

        Ok(updated)
    }

    pub async fn delete(&self, user_id: i32, review_id: i32) -> ServiceResult<()> {
        let review = self
            .store
            .review(review_id)
            .await?
            .ok_or(MarketError::ReviewNotFound)?;
        if review.user_id != user_id {
            return Err(MarketError::Forbidden(
                "Review belongs to another user".into(),
            ));
        }

        self.store
            .delete_review(review_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::ReviewNotFound,
                other => MarketError::Store(other),
            })?;

        Ok(())
    }
}

fn validate_rating(rating: i32) -> ServiceResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(MarketError::Validation(
            "Rating must be between 1 and 5".into(),
        ));
    }
    Ok(())
}
