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

//! Capacity and order persistence.
//!
//! [`TicketStore`] is the boundary the reservation and fulfillment steps
//! consume. Its one non-trivial write, [`TicketStore::insert_order`], must be
//! atomic: the capacity check, ticket-code uniqueness check, payment-id
//! uniqueness check and append either all happen or none do.
//!
//! [`MemoryStore`] is the bundled backend. Events live in a [`DashMap`] of
//! [`EventLedger`]s and the payment-id uniqueness index is a second
//! [`DashMap`] whose entry API provides the insert-if-absent primitive.
//!
//! # Lock order
//!
//! event ledger → payment index entry. No path takes them the other way round.

use crate::base::{CustomerId, EventId, OrderId, PaymentId};
use crate::capacity::{Availability, Event};
use crate::error::StoreError;
use crate::ledger::EventLedger;
use crate::order::{Customer, NewOrder, Order, email_key};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Persistence operations required by the ticketing core.
pub trait TicketStore: Send + Sync {
    /// Inserts the event, or replaces its record while keeping its orders.
    fn provision_event(&self, event: Event) -> Result<(), StoreError>;

    fn event(&self, event_id: EventId) -> Result<Event, StoreError>;

    fn set_capacity(&self, event_id: EventId, capacity: Option<u32>) -> Result<(), StoreError>;

    /// Total capacity, `None` while unset.
    fn capacity(&self, event_id: EventId) -> Result<Option<u32>, StoreError>;

    /// Sum of quantities across all committed orders of the event.
    fn committed_count(&self, event_id: EventId) -> Result<u32, StoreError>;

    /// Capacity and committed count read together.
    fn availability(&self, event_id: EventId) -> Result<Availability, StoreError> {
        let capacity = self.capacity(event_id)?;
        let committed = self.committed_count(event_id)?;
        Ok(Availability::from_parts(capacity, committed))
    }

    fn order_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Order>, StoreError>;

    /// All committed orders for the event, oldest first.
    fn orders(&self, event_id: EventId) -> Result<Vec<Order>, StoreError>;

    fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>, StoreError>;

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    /// Refreshes the name of the customer with this email, or creates one
    /// opted out of the newsletter. Never touches the opt-in flag of an
    /// existing customer.
    fn upsert_customer(&self, name: &str, email: &str) -> Result<Customer, StoreError>;

    /// Commits an order if capacity allows and neither its payment id nor its
    /// ticket code has been used.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicatePayment`] - an order already exists for the payment.
    /// - [`StoreError::DuplicateTicketCode`] - the code is already issued for the event.
    /// - [`StoreError::CapacityExceeded`] - not enough tickets left.
    /// - [`StoreError::CapacityNotConfigured`] / [`StoreError::EventNotFound`].
    /// - [`StoreError::Timeout`] - the event ledger stayed busy past the deadline.
    fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
}

impl<S: TicketStore + ?Sized> TicketStore for Arc<S> {
    fn provision_event(&self, event: Event) -> Result<(), StoreError> {
        (**self).provision_event(event)
    }

    fn event(&self, event_id: EventId) -> Result<Event, StoreError> {
        (**self).event(event_id)
    }

    fn set_capacity(&self, event_id: EventId, capacity: Option<u32>) -> Result<(), StoreError> {
        (**self).set_capacity(event_id, capacity)
    }

    fn capacity(&self, event_id: EventId) -> Result<Option<u32>, StoreError> {
        (**self).capacity(event_id)
    }

    fn committed_count(&self, event_id: EventId) -> Result<u32, StoreError> {
        (**self).committed_count(event_id)
    }

    fn availability(&self, event_id: EventId) -> Result<Availability, StoreError> {
        (**self).availability(event_id)
    }

    fn order_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Order>, StoreError> {
        (**self).order_by_payment(payment_id)
    }

    fn orders(&self, event_id: EventId) -> Result<Vec<Order>, StoreError> {
        (**self).orders(event_id)
    }

    fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).customer(customer_id)
    }

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        (**self).customer_by_email(email)
    }

    fn upsert_customer(&self, name: &str, email: &str) -> Result<Customer, StoreError> {
        (**self).upsert_customer(name, email)
    }

    fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        (**self).insert_order(order)
    }
}

/// In-process [`TicketStore`] safe for concurrent use.
#[derive(Debug)]
pub struct MemoryStore {
    events: DashMap<EventId, Arc<EventLedger>>,
    /// Payment id uniqueness index.
    payments: DashMap<PaymentId, Order>,
    /// Customers keyed by normalized email.
    customers: DashMap<String, Customer>,
    next_customer_id: AtomicU32,
    next_order_id: AtomicU64,
    timeout: Duration,
}

impl MemoryStore {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Creates a store whose ledger operations give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            events: DashMap::new(),
            payments: DashMap::new(),
            customers: DashMap::new(),
            next_customer_id: AtomicU32::new(1),
            next_order_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Clones the ledger handle out so no map shard stays locked while the
    /// ledger mutex is awaited.
    fn ledger(&self, event_id: EventId) -> Result<Arc<EventLedger>, StoreError> {
        self.events
            .get(&event_id)
            .map(|ledger| Arc::clone(ledger.value()))
            .ok_or(StoreError::EventNotFound)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore for MemoryStore {
    fn provision_event(&self, event: Event) -> Result<(), StoreError> {
        match self.events.entry(event.id) {
            Entry::Occupied(entry) => {
                let ledger = Arc::clone(entry.get());
                drop(entry);
                ledger.replace_event(event, self.timeout)
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(EventLedger::new(event)));
                Ok(())
            }
        }
    }

    fn event(&self, event_id: EventId) -> Result<Event, StoreError> {
        self.ledger(event_id)?.event(self.timeout)
    }

    fn set_capacity(&self, event_id: EventId, capacity: Option<u32>) -> Result<(), StoreError> {
        self.ledger(event_id)?.set_capacity(capacity, self.timeout)
    }

    fn capacity(&self, event_id: EventId) -> Result<Option<u32>, StoreError> {
        self.ledger(event_id)?.capacity(self.timeout)
    }

    fn committed_count(&self, event_id: EventId) -> Result<u32, StoreError> {
        self.ledger(event_id)?.committed(self.timeout)
    }

    fn availability(&self, event_id: EventId) -> Result<Availability, StoreError> {
        // One lock acquisition instead of two, so capacity and count agree.
        self.ledger(event_id)?.availability(self.timeout)
    }

    fn order_by_payment(&self, payment_id: &PaymentId) -> Result<Option<Order>, StoreError> {
        Ok(self
            .payments
            .get(payment_id)
            .map(|order| order.value().clone()))
    }

    fn orders(&self, event_id: EventId) -> Result<Vec<Order>, StoreError> {
        self.ledger(event_id)?.orders(self.timeout)
    }

    fn customer(&self, customer_id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .customers
            .iter()
            .find(|customer| customer.id == customer_id)
            .map(|customer| customer.value().clone()))
    }

    fn customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .customers
            .get(&email_key(email))
            .map(|customer| customer.value().clone()))
    }

    fn upsert_customer(&self, name: &str, email: &str) -> Result<Customer, StoreError> {
        let customer = match self.customers.entry(email_key(email)) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().name = name.to_string();
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let id = CustomerId(self.next_customer_id.fetch_add(1, Ordering::Relaxed));
                entry
                    .insert(Customer {
                        id,
                        name: name.to_string(),
                        email: email.trim().to_string(),
                        newsletter_opt_in: false,
                    })
                    .value()
                    .clone()
            }
        };
        Ok(customer)
    }

    fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let ledger = self.ledger(order.event_id)?;
        let mut guard = ledger.lock(self.timeout)?;

        // Entry API gives an atomic check-and-insert on the payment id.
        match self.payments.entry(order.payment_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicatePayment),
            Entry::Vacant(entry) => {
                let id = OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed));
                let order = guard.append(order, id)?;
                entry.insert(order.clone());
                Ok(order)
            }
        }
    }
}
