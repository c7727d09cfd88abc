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

//! Verified payment events and the per-payment state machine.
//!
//! ```text
//! PaymentPending ──verify──► PaymentVerified ──fulfill──► Fulfilled ──notify──► NotificationAttempted
//!                                                           ▲    │
//!                                                           └────┘ replay (no-op)
//! ```

use crate::base::{EventId, PaymentId};
use crate::error::TicketError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Status reported by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    Canceled,
    Failed,
}

impl PaymentStatus {
    /// Parses a gateway status string. Unknown statuses count as failed.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Failed,
        }
    }
}

/// A payment record as reported by the payment collaborator.
///
/// Only the collaborator may construct this with `Succeeded`; clients never
/// supply the status themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    /// String metadata attached when the payment was created:
    /// `name`, `email`, `quantity` and optionally `event_id`.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Order fields recovered from payment metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub name: String,
    pub email: String,
    pub quantity: u32,
    pub event_id: EventId,
}

impl VerifiedPayment {
    pub fn succeeded(payment_id: impl Into<String>, name: &str, email: &str, quantity: u32) -> Self {
        let metadata = HashMap::from([
            ("name".to_string(), name.to_string()),
            ("email".to_string(), email.to_string()),
            ("quantity".to_string(), quantity.to_string()),
        ]);
        Self {
            payment_id: PaymentId(payment_id.into()),
            status: PaymentStatus::Succeeded,
            metadata,
        }
    }

    fn field(&self, key: &'static str) -> Result<&str, TicketError> {
        self.metadata
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or(TicketError::MissingMetadata(key))
    }

    /// Extracts the order fields, falling back to `default_event` when the
    /// payment does not name an event.
    ///
    /// # Errors
    ///
    /// - [`TicketError::MissingMetadata`] - `name`, `email` or `quantity` is absent.
    /// - [`TicketError::InvalidQuantity`] - `quantity` is not a positive integer.
    /// - [`TicketError::EventNotFound`] - `event_id` is not a number.
    pub fn details(&self, default_event: EventId) -> Result<PaymentDetails, TicketError> {
        let name = self.field("name")?.to_string();
        let email = self.field("email")?.to_string();
        let quantity = self
            .field("quantity")?
            .parse::<u32>()
            .map_err(|_| TicketError::InvalidQuantity)?;
        let event_id = match self.field("event_id") {
            Ok(raw) => EventId(raw.parse().map_err(|_| TicketError::EventNotFound)?),
            Err(_) => default_event,
        };

        Ok(PaymentDetails {
            name,
            email,
            quantity,
            event_id,
        })
    }
}

/// Looks a payment up with the gateway. Implemented outside this crate.
pub trait PaymentVerifier: Send + Sync {
    fn verify(&self, payment_id: &PaymentId) -> Result<VerifiedPayment, TicketError>;
}

/// Lifecycle of one payment as seen by the ticketing core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    PaymentPending,
    PaymentVerified,
    Fulfilled,
    NotificationAttempted,
}

impl PaymentState {
    /// Moves to `next` if the transition is allowed.
    ///
    /// Re-entering `Fulfilled` from `Fulfilled` is accepted so that replays
    /// are no-ops rather than errors.
    pub fn advance(self, next: PaymentState) -> Option<PaymentState> {
        use PaymentState::*;
        match (self, next) {
            (PaymentPending, PaymentVerified)
            | (PaymentVerified, Fulfilled)
            | (Fulfilled, Fulfilled)
            | (Fulfilled, NotificationAttempted) => Some(next),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PaymentState::NotificationAttempted
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentState::PaymentPending => "payment_pending",
            PaymentState::PaymentVerified => "payment_verified",
            PaymentState::Fulfilled => "fulfilled",
            PaymentState::NotificationAttempted => "notification_attempted",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert_eq!(PaymentStatus::parse("succeeded"), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::parse(" Succeeded "), PaymentStatus::Succeeded);
        assert_eq!(PaymentStatus::parse("processing"), PaymentStatus::Processing);
        assert_eq!(PaymentStatus::parse("cancelled"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::parse("weird"), PaymentStatus::Failed);
    }

    #[test]
    fn details_default_the_event() {
        let payment = VerifiedPayment::succeeded("pay_abc", "Ada", "ada@example.com", 3);
        let details = payment.details(EventId(2)).unwrap();
        assert_eq!(
            details,
            PaymentDetails {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                quantity: 3,
                event_id: EventId(2),
            }
        );
    }

    #[test]
    fn details_use_explicit_event() {
        let mut payment = VerifiedPayment::succeeded("pay_abc", "Ada", "ada@example.com", 3);
        payment.metadata.insert("event_id".into(), "5".into());
        assert_eq!(payment.details(EventId(2)).unwrap().event_id, EventId(5));
    }

    #[test]
    fn details_require_metadata() {
        let mut payment = VerifiedPayment::succeeded("pay_abc", "Ada", "ada@example.com", 3);
        payment.metadata.remove("email");
        assert_eq!(
            payment.details(EventId(2)),
            Err(TicketError::MissingMetadata("email"))
        );

        payment.metadata.insert("email".into(), "   ".into());
        assert_eq!(
            payment.details(EventId(2)),
            Err(TicketError::MissingMetadata("email"))
        );
    }

    #[test]
    fn details_reject_non_numeric_quantity() {
        let mut payment = VerifiedPayment::succeeded("pay_abc", "Ada", "ada@example.com", 3);
        payment.metadata.insert("quantity".into(), "three".into());
        assert_eq!(payment.details(EventId(2)), Err(TicketError::InvalidQuantity));
    }

    #[test]
    fn state_machine_transitions() {
        use PaymentState::*;
        assert_eq!(PaymentPending.advance(PaymentVerified), Some(PaymentVerified));
        assert_eq!(PaymentVerified.advance(Fulfilled), Some(Fulfilled));
        assert_eq!(Fulfilled.advance(Fulfilled), Some(Fulfilled));
        assert_eq!(Fulfilled.advance(NotificationAttempted), Some(NotificationAttempted));
        assert!(NotificationAttempted.is_terminal());

        assert_eq!(PaymentPending.advance(Fulfilled), None);
        assert_eq!(NotificationAttempted.advance(Fulfilled), None);
        assert_eq!(Fulfilled.advance(PaymentVerified), None);
    }
}
