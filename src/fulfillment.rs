// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Fulfillment: turning a verified payment into exactly one order.
//!
//! # Steps
//!
//! 1. Validate the request. Nothing is written for a bad request.
//! 2. If the payment already has an order, return it (replay).
//! 3. Upsert the customer by email.
//! 4. Draw a ticket code and insert the order. A code collision draws again;
//!    a payment-id collision means a concurrent delivery won the race, and
//!    its order is returned instead.
//! 5. Queue notifications. Their outcome never reaches the caller.
//!
//! A failure between steps 3 and 4 leaves a customer row without an order.
//! That is harmless: a redelivery finds the customer and carries on.

use crate::base::{EventId, PaymentId};
use crate::config::LedgerConfig;
use crate::error::{StoreError, TicketError};
use crate::idempotency::IdempotencyGuard;
use crate::notification::{NotificationDispatcher, TicketNotice};
use crate::order::{NewOrder, Order};
use crate::payment::{PaymentState, PaymentStatus, PaymentVerifier, VerifiedPayment};
use crate::store::TicketStore;
use crate::ticket_code::{CodeGenerator, WordPairGenerator};
use rust_decimal::Decimal;

const MAX_NAME_CHARS: usize = 200;
const MAX_EMAIL_CHARS: usize = 254;

/// Everything needed to commit one paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentRequest {
    pub payment_id: PaymentId,
    pub customer_name: String,
    pub customer_email: String,
    pub event_id: EventId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl FulfillmentRequest {
    /// Trims the customer fields and rejects anything unusable.
    fn validated(mut self) -> Result<Self, TicketError> {
        self.customer_name = self.customer_name.trim().to_string();
        self.customer_email = self.customer_email.trim().to_string();

        if self.payment_id.as_str().trim().is_empty() {
            return Err(TicketError::InvalidPaymentId);
        }
        if !is_valid_name(&self.customer_name) {
            return Err(TicketError::InvalidName);
        }
        if !is_valid_email(&self.customer_email) {
            return Err(TicketError::InvalidEmail);
        }
        if self.quantity == 0 {
            return Err(TicketError::InvalidQuantity);
        }
        Ok(self)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().count() <= MAX_NAME_CHARS
        && !name.chars().any(char::is_control)
}

/// Structural check only: `local@domain.tld`, no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Commits paid orders exactly once per payment.
pub struct FulfillmentProcessor<S> {
    store: S,
    guard: IdempotencyGuard<S>,
    codes: Box<dyn CodeGenerator>,
    notifications: NotificationDispatcher,
    config: LedgerConfig,
}

impl<S: TicketStore + Clone> FulfillmentProcessor<S> {
    /// Creates a processor with random word-pair codes and no notifications.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            guard: IdempotencyGuard::new(store.clone()),
            store,
            codes: Box::new(WordPairGenerator),
            notifications: NotificationDispatcher::disabled(),
            config,
        }
    }

    pub fn with_code_generator(mut self, codes: impl CodeGenerator + 'static) -> Self {
        self.codes = Box::new(codes);
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Commits the order for a verified payment, or returns the order an
    /// earlier or concurrent delivery of the same payment committed.
    ///
    /// Calling this twice with the same payment id yields the same order.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidPaymentId`], [`TicketError::InvalidName`],
    ///   [`TicketError::InvalidEmail`], [`TicketError::InvalidQuantity`] - rejected
    ///   before any write.
    /// - [`TicketError::CapacityExceeded`] - sold out at commit time.
    /// - [`TicketError::SalesNotOpen`] / [`TicketError::EventNotFound`].
    /// - [`TicketError::TicketCodeExhausted`] - every code draw collided.
    /// - [`TicketError::Store`] - store failure; retryable when transient.
    pub fn fulfill(&self, request: FulfillmentRequest) -> Result<Order, TicketError> {
        let request = request.validated()?;
        let span = tracing::info_span!(
            "fulfill",
            payment_id = %request.payment_id,
            event_id = %request.event_id,
        );
        let _entered = span.enter();

        if let Some(order) = self.guard.prior_order(&request.payment_id)? {
            let state = step(PaymentState::Fulfilled, PaymentState::Fulfilled);
            tracing::info!(
                ticket_code = %order.ticket_code,
                %state,
                "payment already fulfilled, replaying"
            );
            return Ok(order);
        }

        let customer = self
            .store
            .upsert_customer(&request.customer_name, &request.customer_email)?;

        for attempt in 1..=self.config.max_code_attempts {
            let new_order = NewOrder {
                customer_id: customer.id,
                event_id: request.event_id,
                quantity: request.quantity,
                unit_price: request.unit_price,
                ticket_code: self.codes.generate(),
                payment_id: request.payment_id.clone(),
            };

            match self.store.insert_order(new_order) {
                Ok(order) => {
                    let state = step(PaymentState::PaymentVerified, PaymentState::Fulfilled);
                    tracing::info!(
                        order_id = %order.id,
                        ticket_code = %order.ticket_code,
                        quantity = order.quantity,
                        %state,
                        "order committed"
                    );
                    self.notify(&order, &request, state);
                    return Ok(order);
                }
                Err(StoreError::DuplicateTicketCode) => {
                    tracing::debug!(attempt, "ticket code collision, drawing again");
                }
                Err(StoreError::DuplicatePayment) => return self.concurrent_winner(&request.payment_id),
                Err(StoreError::CapacityExceeded { available }) => {
                    // The buyer has paid; the operator must refund.
                    tracing::error!(
                        requested = request.quantity,
                        available,
                        "paid order rejected, event sold out"
                    );
                    return Err(TicketError::CapacityExceeded {
                        requested: request.quantity,
                        available,
                    });
                }
                Err(err) => {
                    tracing::warn!(%err, retryable = err.is_transient(), "order insert failed");
                    return Err(err.into());
                }
            }
        }

        tracing::error!(attempts = self.config.max_code_attempts, "ticket codes exhausted");
        Err(TicketError::TicketCodeExhausted)
    }

    /// Fulfills a payment record obtained from the [`PaymentVerifier`].
    ///
    /// The record must come from the gateway itself (or a trusted replay of
    /// its events), never from a request body: its status is taken as given.
    ///
    /// # Errors
    ///
    /// [`TicketError::PaymentNotSucceeded`] unless the collaborator reported
    /// success, metadata errors from [`VerifiedPayment::details`], and
    /// everything [`fulfill`](Self::fulfill) returns.
    pub fn process_payment(&self, payment: &VerifiedPayment) -> Result<Order, TicketError> {
        if payment.status != PaymentStatus::Succeeded {
            tracing::info!(payment_id = %payment.payment_id, status = ?payment.status, "payment not succeeded");
            return Err(TicketError::PaymentNotSucceeded);
        }
        let details = payment.details(self.config.event_id)?;

        self.fulfill(FulfillmentRequest {
            payment_id: payment.payment_id.clone(),
            customer_name: details.name,
            customer_email: details.email,
            event_id: details.event_id,
            quantity: details.quantity,
            unit_price: self.config.unit_price,
        })
    }

    /// Delivery by payment id, for both channels (webhook push and client
    /// confirmation): asks the gateway for the payment's status and metadata
    /// and fulfills it if it succeeded.
    pub fn confirm_payment<V>(&self, verifier: &V, payment_id: &PaymentId) -> Result<Order, TicketError>
    where
        V: PaymentVerifier + ?Sized,
    {
        let payment = verifier.verify(payment_id)?;
        self.process_payment(&payment)
    }

    /// Stops the notification workers after they drain their queue.
    pub fn shutdown(self) {
        self.notifications.shutdown();
    }

    fn concurrent_winner(&self, payment_id: &PaymentId) -> Result<Order, TicketError> {
        match self.guard.prior_order(payment_id)? {
            Some(order) => {
                let state = step(PaymentState::Fulfilled, PaymentState::Fulfilled);
                tracing::info!(
                    ticket_code = %order.ticket_code,
                    %state,
                    "payment fulfilled concurrently, returning winner"
                );
                Ok(order)
            }
            None => Err(TicketError::Store(StoreError::Unavailable(
                "duplicate payment reported but no order found".to_string(),
            ))),
        }
    }

    fn notify(&self, order: &Order, request: &FulfillmentRequest, state: PaymentState) {
        self.notifications.dispatch(TicketNotice::for_order(
            order,
            &request.customer_name,
            &request.customer_email,
        ));
        let state = step(state, PaymentState::NotificationAttempted);
        tracing::debug!(%state, "notification queued");
    }
}

/// Takes a lifecycle transition the fulfillment path relies on.
fn step(from: PaymentState, to: PaymentState) -> PaymentState {
    let next = from.advance(to);
    debug_assert_eq!(next, Some(to), "illegal payment transition {from} -> {to}");
    next.unwrap_or(to)
}
