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

//! Runtime configuration for the ticketing core.

use crate::base::EventId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

/// Settings shared by the reservation, fulfillment and notification steps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The event on sale. Used when a payment does not name one.
    pub event_id: EventId,
    /// Price charged per ticket.
    pub unit_price: Decimal,
    /// Deadline for a single store operation, in milliseconds.
    pub store_timeout_ms: u64,
    /// Ticket code draws before fulfillment gives up.
    pub max_code_attempts: u32,
    /// Largest quantity a single order may request.
    pub max_per_order: u32,
    /// Threads delivering notifications.
    pub notification_workers: usize,
}

impl LedgerConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            event_id: EventId(2),
            unit_price: dec!(3.50),
            store_timeout_ms: 2_000,
            max_code_attempts: 8,
            max_per_order: 10,
            notification_workers: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_single_event_sale() {
        let config = LedgerConfig::default();
        assert_eq!(config.event_id, EventId(2));
        assert_eq!(config.unit_price, dec!(3.50));
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"max_per_order": 4, "unit_price": "5.00"}"#).unwrap();
        assert_eq!(config.max_per_order, 4);
        assert_eq!(config.unit_price, dec!(5.00));
        assert_eq!(config.max_code_attempts, 8);
    }
}
