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

//! Error types for reservation, fulfillment and persistence.

use thiserror::Error;

/// Persistence-layer failures reported by a [`TicketStore`](crate::TicketStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No event has been provisioned under this id
    #[error("event not found")]
    EventNotFound,

    /// The event exists but its capacity is unset
    #[error("event capacity is not configured")]
    CapacityNotConfigured,

    /// Committing the order would exceed the event capacity
    #[error("capacity exceeded ({available} available)")]
    CapacityExceeded { available: u32 },

    /// An order already exists for this payment id
    #[error("payment already has an order")]
    DuplicatePayment,

    /// Another order of the event already holds this ticket code
    #[error("ticket code already issued")]
    DuplicateTicketCode,

    /// The store did not answer within its deadline
    #[error("store operation timed out")]
    Timeout,

    /// The store could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` when retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Unavailable(_))
    }
}

/// Errors surfaced to callers of the reservation and fulfillment operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Quantity is zero or not a number
    #[error("invalid quantity (must be positive)")]
    InvalidQuantity,

    /// Quantity is above the per-order limit
    #[error("at most {max} tickets per order")]
    QuantityAboveLimit { max: u32 },

    /// Customer name is blank or too long
    #[error("invalid customer name")]
    InvalidName,

    /// Customer email is malformed
    #[error("invalid customer email")]
    InvalidEmail,

    /// Payment id is blank
    #[error("invalid payment id")]
    InvalidPaymentId,

    /// A verified payment arrived without a required metadata field
    #[error("payment metadata missing field `{0}`")]
    MissingMetadata(&'static str),

    /// The payment collaborator did not report the payment as succeeded
    #[error("payment not successful")]
    PaymentNotSucceeded,

    /// Capacity is unset, tickets are not on sale yet
    #[error("tickets are not on sale yet")]
    SalesNotOpen,

    /// Referenced event does not exist
    #[error("event not found")]
    EventNotFound,

    /// Not enough tickets left for the requested quantity
    #[error("only {available} tickets available ({requested} requested)")]
    CapacityExceeded { requested: u32, available: u32 },

    /// Every generated ticket code collided with an issued one
    #[error("could not generate a unique ticket code")]
    TicketCodeExhausted,

    /// Underlying store failure
    #[error(transparent)]
    Store(StoreError),
}

impl TicketError {
    /// Returns `true` when the caller should retry (or, for push delivery,
    /// answer with a failure so the sender redelivers).
    pub fn is_retryable(&self) -> bool {
        match self {
            TicketError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for TicketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EventNotFound => TicketError::EventNotFound,
            StoreError::CapacityNotConfigured => TicketError::SalesNotOpen,
            other => TicketError::Store(other),
        }
    }
}

/// Failure reported by a notification sink. Logged, never escalated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);
