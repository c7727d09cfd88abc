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

//! # Ticket Ledger
//!
//! This library sells a fixed number of tickets for an event without ever
//! overselling, and turns each successful payment into exactly one order even
//! when the payment gateway delivers its confirmation more than once.
//!
//! ## Core Components
//!
//! - [`TicketStore`] / [`MemoryStore`]: capacity and order persistence with an
//!   atomic capacity-checked, payment-unique order insert
//! - [`ReservationCoordinator`]: availability queries and the advisory
//!   pre-payment check
//! - [`IdempotencyGuard`]: has this payment already been fulfilled?
//! - [`FulfillmentProcessor`]: customer upsert, ticket code and order commit
//! - [`NotificationDispatcher`]: best-effort side effects after the commit
//! - [`TicketError`]: error type for reservation and fulfillment failures
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ticket_ledger_rs::{
//!     Event, EventId, FulfillmentProcessor, LedgerConfig, MemoryStore,
//!     ReservationCoordinator, TicketStore, VerifiedPayment,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! store.provision_event(Event::new(EventId(2), Some(35))).unwrap();
//!
//! let config = LedgerConfig::default();
//! let reservations = ReservationCoordinator::new(Arc::clone(&store), config.max_per_order);
//! reservations.check_availability(EventId(2), 2).unwrap();
//!
//! let processor = FulfillmentProcessor::new(Arc::clone(&store), config);
//! let payment = VerifiedPayment::succeeded("pay_abc", "Ada", "ada@example.com", 2);
//! let order = processor.process_payment(&payment).unwrap();
//!
//! // Redelivery returns the same order.
//! assert_eq!(processor.process_payment(&payment).unwrap(), order);
//! assert_eq!(store.availability(EventId(2)).unwrap().available(), Some(33));
//! ```
//!
//! ## Thread Safety
//!
//! Every component is `Send + Sync`. Concurrent fulfillments serialize only on
//! the per-event ledger inside the store, for the duration of one insert.

mod base;
pub mod capacity;
pub mod config;
pub mod error;
pub mod export;
pub mod fulfillment;
pub mod idempotency;
pub mod ledger;
pub mod notification;
pub mod order;
pub mod payment;
pub mod reservation;
pub mod store;
pub mod ticket_code;

pub use base::{CustomerId, EventId, OrderId, PaymentId, TicketCode};
pub use capacity::{Availability, Event, EventDetails};
pub use config::LedgerConfig;
pub use error::{NotifyError, StoreError, TicketError};
pub use export::{RosterExport, write_roster};
pub use fulfillment::{FulfillmentProcessor, FulfillmentRequest};
pub use idempotency::IdempotencyGuard;
pub use notification::{LogNotifier, NotificationDispatcher, Notifier, TicketNotice};
pub use order::{Customer, NewOrder, Order};
pub use payment::{PaymentState, PaymentStatus, PaymentVerifier, VerifiedPayment};
pub use reservation::{ReservationCheck, ReservationCoordinator};
pub use store::{MemoryStore, TicketStore};
pub use ticket_code::{CodeGenerator, WordPairGenerator};
