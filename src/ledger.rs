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

//! Per-event capacity ledger.
//!
//! Holds the event record, its append-only order list and the running
//! committed count behind one mutex, so the capacity check and the append
//! happen as a single step.
//!
//! # Example
//!
//! ```
//! use ticket_ledger_rs::{Event, EventId};
//! use ticket_ledger_rs::ledger::EventLedger;
//! use std::time::Duration;
//!
//! let ledger = EventLedger::new(Event::new(EventId(2), Some(35)));
//! let availability = ledger.availability(Duration::from_secs(1)).unwrap();
//! assert_eq!(availability.available(), Some(35));
//! ```

use crate::base::{OrderId, TicketCode};
use crate::capacity::{Availability, Event};
use crate::error::StoreError;
use crate::order::{NewOrder, Order};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug)]
struct LedgerData {
    event: Event,
    /// Always equals the sum of `orders[..].quantity`.
    committed: u32,
    orders: Vec<Order>,
    /// Issued ticket codes for this event.
    codes: HashMap<TicketCode, OrderId>,
}

impl LedgerData {
    fn new(event: Event) -> Self {
        Self {
            event,
            committed: 0,
            orders: Vec::new(),
            codes: HashMap::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.committed,
            self.orders.iter().map(|o| o.quantity).sum::<u32>(),
            "Invariant violated: committed count drifted from the order ledger"
        );
        debug_assert_eq!(
            self.codes.len(),
            self.orders.len(),
            "Invariant violated: ticket codes are not one per order"
        );
    }

    fn availability(&self) -> Availability {
        Availability::from_parts(self.event.capacity, self.committed)
    }

    /// Checks capacity and code uniqueness, then appends.
    ///
    /// Payment-id uniqueness is enforced by the caller, which holds the
    /// payment index entry while this runs.
    fn append(&mut self, order: NewOrder, id: OrderId) -> Result<Order, StoreError> {
        let capacity = self
            .event
            .capacity
            .ok_or(StoreError::CapacityNotConfigured)?;
        let available = capacity.saturating_sub(self.committed);
        if order.quantity > available {
            return Err(StoreError::CapacityExceeded { available });
        }
        if self.codes.contains_key(&order.ticket_code) {
            return Err(StoreError::DuplicateTicketCode);
        }

        let order = order.commit(id, Utc::now());
        self.codes.insert(order.ticket_code.clone(), id);
        self.committed += order.quantity;
        self.orders.push(order.clone());
        self.assert_invariants();
        Ok(order)
    }
}

/// Capacity ledger for one event.
#[derive(Debug)]
pub struct EventLedger {
    inner: Mutex<LedgerData>,
}

/// Exclusive access to a ledger, held while a commit is decided.
pub(crate) struct LedgerGuard<'a> {
    data: MutexGuard<'a, LedgerData>,
}

impl LedgerGuard<'_> {
    pub(crate) fn append(&mut self, order: NewOrder, id: OrderId) -> Result<Order, StoreError> {
        self.data.append(order, id)
    }
}

impl EventLedger {
    pub fn new(event: Event) -> Self {
        Self {
            inner: Mutex::new(LedgerData::new(event)),
        }
    }

    /// Acquires the ledger, giving up after `timeout`.
    pub(crate) fn lock(&self, timeout: Duration) -> Result<LedgerGuard<'_>, StoreError> {
        self.inner
            .try_lock_for(timeout)
            .map(|data| LedgerGuard { data })
            .ok_or_else(|| {
                tracing::warn!(?timeout, "event ledger lock timed out");
                StoreError::Timeout
            })
    }

    pub fn event(&self, timeout: Duration) -> Result<Event, StoreError> {
        Ok(self.lock(timeout)?.data.event.clone())
    }

    pub fn capacity(&self, timeout: Duration) -> Result<Option<u32>, StoreError> {
        Ok(self.lock(timeout)?.data.event.capacity)
    }

    pub fn committed(&self, timeout: Duration) -> Result<u32, StoreError> {
        Ok(self.lock(timeout)?.data.committed)
    }

    pub fn availability(&self, timeout: Duration) -> Result<Availability, StoreError> {
        Ok(self.lock(timeout)?.data.availability())
    }

    /// Committed orders in commit order.
    pub fn orders(&self, timeout: Duration) -> Result<Vec<Order>, StoreError> {
        Ok(self.lock(timeout)?.data.orders.clone())
    }

    /// Replaces the event record (details and capacity), keeping its orders.
    pub fn replace_event(&self, event: Event, timeout: Duration) -> Result<(), StoreError> {
        self.lock(timeout)?.data.event = event;
        Ok(())
    }

    /// Changes capacity. Lowering it below the committed count is allowed;
    /// availability then reads zero.
    pub fn set_capacity(&self, capacity: Option<u32>, timeout: Duration) -> Result<(), StoreError> {
        self.lock(timeout)?.data.event.capacity = capacity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{CustomerId, EventId, PaymentId};
    use rust_decimal_macros::dec;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn new_order(payment: &str, code: &str, quantity: u32) -> NewOrder {
        NewOrder {
            customer_id: CustomerId(1),
            event_id: EventId(2),
            quantity,
            unit_price: dec!(3.50),
            ticket_code: TicketCode(code.into()),
            payment_id: PaymentId::new(payment),
        }
    }

    #[test]
    fn append_updates_committed_count() {
        let mut data = LedgerData::new(Event::new(EventId(2), Some(35)));
        data.append(new_order("pay_a", "brave-otter", 10), OrderId(1))
            .unwrap();
        assert_eq!(data.committed, 10);
        assert_eq!(data.availability().available(), Some(25));
    }

    #[test]
    fn append_rejects_quantity_above_available() {
        let mut data = LedgerData::new(Event::new(EventId(2), Some(5)));
        data.append(new_order("pay_a", "brave-otter", 4), OrderId(1))
            .unwrap();
        let result = data.append(new_order("pay_b", "calm-heron", 2), OrderId(2));
        assert_eq!(result, Err(StoreError::CapacityExceeded { available: 1 }));
        assert_eq!(data.committed, 4);
    }

    #[test]
    fn append_fills_capacity_exactly() {
        let mut data = LedgerData::new(Event::new(EventId(2), Some(5)));
        data.append(new_order("pay_a", "brave-otter", 5), OrderId(1))
            .unwrap();
        assert!(data.availability().is_sold_out());
    }

    #[test]
    fn append_without_capacity_is_rejected() {
        let mut data = LedgerData::new(Event::new(EventId(2), None));
        let result = data.append(new_order("pay_a", "brave-otter", 1), OrderId(1));
        assert_eq!(result, Err(StoreError::CapacityNotConfigured));
    }

    #[test]
    fn append_rejects_reused_ticket_code() {
        let mut data = LedgerData::new(Event::new(EventId(2), Some(35)));
        data.append(new_order("pay_a", "brave-otter", 1), OrderId(1))
            .unwrap();
        let result = data.append(new_order("pay_b", "brave-otter", 1), OrderId(2));
        assert_eq!(result, Err(StoreError::DuplicateTicketCode));
        assert_eq!(data.orders.len(), 1);
    }

    #[test]
    fn lowering_capacity_keeps_orders() {
        let ledger = EventLedger::new(Event::new(EventId(2), Some(35)));
        ledger
            .lock(TIMEOUT)
            .unwrap()
            .append(new_order("pay_a", "brave-otter", 10), OrderId(1))
            .unwrap();
        ledger.set_capacity(Some(4), TIMEOUT).unwrap();

        assert_eq!(ledger.orders(TIMEOUT).unwrap().len(), 1);
        assert_eq!(ledger.availability(TIMEOUT).unwrap().available(), Some(0));
    }

    #[test]
    fn lock_times_out_while_held() {
        let ledger = EventLedger::new(Event::new(EventId(2), Some(35)));
        let _held = ledger.lock(TIMEOUT).unwrap();
        let result = ledger.committed(Duration::from_millis(10));
        assert_eq!(result, Err(StoreError::Timeout));
    }
}
