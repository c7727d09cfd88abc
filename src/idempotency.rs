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

//! Read-side duplicate detection for payment deliveries.
//!
//! The same payment can be delivered by the buyer's confirmation call and by
//! the gateway's webhook, possibly at the same moment, and the webhook may be
//! retried. A check here followed by an insert is not race-free; the payment
//! id uniqueness enforced by [`TicketStore::insert_order`] is what actually
//! guarantees one order per payment. This guard only lets a replay skip the
//! customer upsert and notifications.

use crate::base::PaymentId;
use crate::error::TicketError;
use crate::order::Order;
use crate::store::TicketStore;

#[derive(Debug)]
pub struct IdempotencyGuard<S> {
    store: S,
}

impl<S: TicketStore> IdempotencyGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn already_fulfilled(&self, payment_id: &PaymentId) -> Result<bool, TicketError> {
        Ok(self.prior_order(payment_id)?.is_some())
    }

    /// The order committed for this payment, if any.
    pub fn prior_order(&self, payment_id: &PaymentId) -> Result<Option<Order>, TicketError> {
        Ok(self.store.order_by_payment(payment_id)?)
    }
}
