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

//! Order and customer records.
//!
//! Orders form an append-only ledger: once committed they are never mutated.
//! Customers are upserted by email, independently of orders.

use crate::base::{CustomerId, EventId, OrderId, PaymentId, TicketCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A confirmed ticket purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub event_id: EventId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub ticket_code: TicketCode,
    pub payment_id: PaymentId,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns `quantity * unit_price`.
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order fields supplied by the fulfillment step. The store assigns the id
/// and timestamp at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub event_id: EventId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub ticket_code: TicketCode,
    pub payment_id: PaymentId,
}

impl NewOrder {
    pub(crate) fn commit(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            event_id: self.event_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            ticket_code: self.ticket_code,
            payment_id: self.payment_id,
            created_at,
        }
    }
}

/// A buyer, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    /// Set only through explicit sign-up; purchases never change it.
    pub newsletter_opt_in: bool,
}

/// Normalizes an email for use as the customer lookup key.
pub fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order(quantity: u32) -> Order {
        NewOrder {
            customer_id: CustomerId(1),
            event_id: EventId(2),
            quantity,
            unit_price: dec!(3.50),
            ticket_code: TicketCode("brave-otter".into()),
            payment_id: PaymentId::new("pay_abc"),
        }
        .commit(OrderId(1), Utc::now())
    }

    #[test]
    fn total_price_multiplies_quantity() {
        assert_eq!(sample_order(4).total_price(), dec!(14.00));
    }

    #[test]
    fn unit_price_serializes_as_string() {
        let json = serde_json::to_value(sample_order(1)).unwrap();
        assert_eq!(json["unit_price"].as_str().unwrap(), "3.50");
        assert_eq!(json["ticket_code"], "brave-otter");
        assert_eq!(json["payment_id"], "pay_abc");
    }

    #[test]
    fn email_key_is_case_and_whitespace_insensitive() {
        assert_eq!(email_key("  Ada@Example.COM "), "ada@example.com");
    }
}
