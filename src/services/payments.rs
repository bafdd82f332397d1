use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{OrderStatus, PaymentMethod, PaymentStatus},
    models::{CreatePaymentEntity, OrderEntity, PaymentEntity},
    store::{MarketStore, OrderStatusSync, PaymentPatch, StoreError},
};

use super::{MarketError, ServiceResult, stored_order_status};

/// Payment reconciliation: at most one payment per order, and every
/// order-status synchronization happens in the same transaction as the
/// payment write.
pub struct PaymentService {
    store: Arc<dyn MarketStore>,
}

/// Result of a payment write: the payment row, the order when this write
/// moved it, and the mocked wallet redirect for `mobile_wallet`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentOutcome {
    pub payment: PaymentEntity,
    pub updated_order: Option<OrderEntity>,
    pub redirect_url: Option<String>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        buyer_id: i32,
        order_id: i32,
        method: &str,
        amount: Decimal,
        initial_status: Option<&str>,
    ) -> ServiceResult<PaymentOutcome> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;
        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Order belongs to another buyer".into(),
            ));
        }

        let method = PaymentMethod::parse(method)
            .ok_or_else(|| MarketError::Validation("Unknown payment method".into()))?;

        if amount <= Decimal::ZERO {
            return Err(MarketError::Validation("Amount must be positive".into()));
        }
        if amount > order.total {
            return Err(MarketError::AmountExceedsTotal);
        }

        let initial = match initial_status {
            None => PaymentStatus::Pending,
            Some(raw) => match PaymentStatus::parse(raw) {
                Some(status @ (PaymentStatus::Pending | PaymentStatus::Completed)) => status,
                _ => {
                    return Err(MarketError::Validation(
                        "Initial payment status must be pending or completed".into(),
                    ));
                }
            },
        };

        if self.store.payment_for_order(order.id).await?.is_some() {
            return Err(MarketError::DuplicatePayment);
        }

        let order_status = stored_order_status(&order)?;
        let sync = (initial == PaymentStatus::Completed && order_status == OrderStatus::Pending)
            .then_some(OrderStatusSync {
                order_id: order.id,
                from: OrderStatus::Pending,
                to: OrderStatus::Paid,
            });
        let paid_at = (initial == PaymentStatus::Completed).then(Utc::now);

        let (payment, updated_order) = self
            .store
            .insert_payment(
                CreatePaymentEntity {
                    order_id: order.id,
                    method: method.as_str().to_owned(),
                    amount,
                    status: initial.as_str().to_owned(),
                    paid_at,
                },
                sync,
            )
            .await
            .map_err(|err| match err {
                // The unique constraint backstops the pre-check.
                StoreError::Duplicate => MarketError::DuplicatePayment,
                StoreError::NotFound => MarketError::InvalidTransition {
                    from: OrderStatus::Pending,
                    to: OrderStatus::Paid,
                },
                other => MarketError::Store(other),
            })?;

        let redirect_url = (method == PaymentMethod::MobileWallet)
            .then(|| format!("https://pay.unimart.example/wallet/{}", payment.id));

        tracing::info!(
            payment_id = %payment.id,
            order_id = order.id,
            method = method.as_str(),
            status = %payment.status,
            "payment created"
        );

        Ok(PaymentOutcome {
            payment,
            updated_order,
            redirect_url,
        })
    }

    /// `-> completed` while the order is `pending` advances it to `paid`;
    /// `-> failed` while the order is `paid` reverts it to `pending` and
    /// clears `paid_at`.
    pub async fn update(
        &self,
        buyer_id: i32,
        payment_id: Uuid,
        status: &str,
        amount: Option<Decimal>,
    ) -> ServiceResult<PaymentOutcome> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or(MarketError::PaymentNotFound)?;
        let order = self
            .store
            .order(payment.order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;
        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Payment belongs to another buyer".into(),
            ));
        }

        let target = PaymentStatus::parse(status)
            .ok_or_else(|| MarketError::Validation("Unknown payment status".into()))?;

        if let Some(amount) = amount {
            if amount <= Decimal::ZERO {
                return Err(MarketError::Validation("Amount must be positive".into()));
            }
            if amount > order.total {
                return Err(MarketError::AmountExceedsTotal);
            }
        }

        let order_status = stored_order_status(&order)?;
        let (paid_at, sync) = match target {
            PaymentStatus::Completed => (
                Some(Some(Utc::now())),
                (order_status == OrderStatus::Pending).then_some(OrderStatusSync {
                    order_id: order.id,
                    from: OrderStatus::Pending,
                    to: OrderStatus::Paid,
                }),
            ),
            PaymentStatus::Failed => (
                Some(None),
                (order_status == OrderStatus::Paid).then_some(OrderStatusSync {
                    order_id: order.id,
                    from: OrderStatus::Paid,
                    to: OrderStatus::Pending,
                }),
            ),
            _ => (None, None),
        };

        let (payment, updated_order) = self
            .store
            .update_payment(
                payment_id,
                PaymentPatch {
                    status: target.as_str().to_owned(),
                    amount,
                    paid_at,
                },
                sync,
            )
            .await
            .map_err(|err| match (err, sync) {
                (StoreError::NotFound, Some(sync)) => MarketError::InvalidTransition {
                    from: sync.from,
                    to: sync.to,
                },
                (StoreError::NotFound, None) => MarketError::PaymentNotFound,
                (other, _) => MarketError::Store(other),
            })?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = order.id,
            status = %payment.status,
            "payment updated"
        );

        Ok(PaymentOutcome {
            payment,
            updated_order,
            redirect_url: None,
        })
    }

    /// Gateway callback: completes a `pending` payment without an actor.
    /// Stands in for the wallet provider hitting us back.
    pub async fn gateway_complete(&self, payment_id: Uuid) -> ServiceResult<PaymentOutcome> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or(MarketError::PaymentNotFound)?;

        let current = stored_payment_status(&payment)?;
        if current != PaymentStatus::Pending {
            return Err(MarketError::PaymentNotPending);
        }

        let order = self
            .store
            .order(payment.order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;
        let order_status = stored_order_status(&order)?;
        let sync = (order_status == OrderStatus::Pending).then_some(OrderStatusSync {
            order_id: order.id,
            from: OrderStatus::Pending,
            to: OrderStatus::Paid,
        });

        let (payment, updated_order) = self
            .store
            .update_payment(
                payment_id,
                PaymentPatch {
                    status: PaymentStatus::Completed.as_str().to_owned(),
                    amount: None,
                    paid_at: Some(Some(Utc::now())),
                },
                sync,
            )
            .await
            .map_err(|err| match (err, sync) {
                (StoreError::NotFound, Some(sync)) => MarketError::InvalidTransition {
                    from: sync.from,
                    to: sync.to,
                },
                (StoreError::NotFound, None) => MarketError::PaymentNotFound,
                (other, _) => MarketError::Store(other),
            })?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = payment.order_id,
            "payment completed via mock gateway"
        );

        Ok(PaymentOutcome {
            payment,
            updated_order,
            redirect_url: None,
        })
    }

    /// A payment can be withdrawn only while still `pending`.
    pub async fn delete(&self, buyer_id: i32, payment_id: Uuid) -> ServiceResult<()> {
        let payment = self
            .store
            .payment(payment_id)
            .await?
            .ok_or(MarketError::PaymentNotFound)?;
        let order = self
            .store
            .order(payment.order_id)
            .await?
            .ok_or(MarketError::OrderNotFound)?;
        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Payment belongs to another buyer".into(),
            ));
        }

        if stored_payment_status(&payment)? != PaymentStatus::Pending {
            return Err(MarketError::PaymentNotPending);
        }

        self.store
            .delete_pending_payment(payment_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => MarketError::PaymentNotPending,
                other => MarketError::Store(other),
            })?;

        Ok(())
    }
}

fn stored_payment_status(payment: &PaymentEntity) -> Result<PaymentStatus, MarketError> {
    PaymentStatus::parse(&payment.status).ok_or_else(|| {
        MarketError::Store(StoreError::Backend(anyhow::anyhow!(
            "payment {} holds unknown status {:?}",
            payment.id,
            payment.status
        )))
    })
}
