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

//! Best-effort side effects after an order is committed.
//!
//! The fulfillment step hands a [`TicketNotice`] to the
//! [`NotificationDispatcher`] and returns immediately. Worker threads pull
//! notices off a channel and run every sink; a failing sink is logged and the
//! remaining sinks still run. Nothing here can undo or fail an order.

use crate::base::{EventId, PaymentId, TicketCode};
use crate::error::NotifyError;
use crate::order::Order;
use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What a sink needs to tell the buyer (or the organiser) about an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketNotice {
    pub customer_name: String,
    pub email: String,
    pub ticket_code: TicketCode,
    pub quantity: u32,
    pub event_id: EventId,
    pub payment_id: PaymentId,
}

impl TicketNotice {
    pub fn for_order(order: &Order, customer_name: &str, email: &str) -> Self {
        Self {
            customer_name: customer_name.to_string(),
            email: email.to_string(),
            ticket_code: order.ticket_code.clone(),
            quantity: order.quantity,
            event_id: order.event_id,
            payment_id: order.payment_id.clone(),
        }
    }

    /// Email subject line, pluralized on quantity.
    pub fn subject(&self, event_title: &str) -> String {
        let plural = if self.quantity > 1 { "s" } else { "" };
        format!("Your {event_title} ticket{plural}")
    }
}

/// A notification side effect: confirmation email, roster sync, and so on.
pub trait Notifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn notify(&self, notice: &TicketNotice) -> Result<(), NotifyError>;
}

/// Stand-in for the confirmation email: logs what would be sent.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    event_title: String,
}

impl LogNotifier {
    pub fn new(event_title: impl Into<String>) -> Self {
        Self {
            event_title: event_title.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn notify(&self, notice: &TicketNotice) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notice.email,
            subject = %notice.subject(&self.event_title),
            ticket_code = %notice.ticket_code,
            quantity = notice.quantity,
            "ticket email"
        );
        Ok(())
    }
}

/// Fans notices out to sinks on background threads.
pub struct NotificationDispatcher {
    sender: Option<Sender<TicketNotice>>,
    workers: Vec<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// A dispatcher that drops every notice.
    pub fn disabled() -> Self {
        Self {
            sender: None,
            workers: Vec::new(),
        }
    }

    /// Starts `workers` threads (at least one) delivering to `sinks`.
    pub fn spawn(sinks: Vec<Arc<dyn Notifier>>, workers: usize) -> Self {
        let (sender, receiver) = channel::unbounded::<TicketNotice>();
        let sinks: Arc<[Arc<dyn Notifier>]> = sinks.into();

        let handles = (0..workers.max(1))
            .filter_map(|index| {
                let receiver = receiver.clone();
                let sinks = Arc::clone(&sinks);
                thread::Builder::new()
                    .name(format!("notify-{index}"))
                    .spawn(move || {
                        for notice in receiver.iter() {
                            deliver(&sinks, &notice);
                        }
                    })
                    .map_err(|err| tracing::error!(%err, "failed to start notification worker"))
                    .ok()
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: handles,
        }
    }

    /// Queues a notice. Never blocks and never fails the caller.
    pub fn dispatch(&self, notice: TicketNotice) {
        let Some(sender) = &self.sender else {
            return;
        };
        if self.workers.is_empty() {
            tracing::warn!(payment_id = %notice.payment_id, "no notification workers, notice dropped");
            return;
        }
        if let Err(err) = sender.send(notice) {
            tracing::warn!(payment_id = %err.0.payment_id, "notification channel closed, notice dropped");
        }
    }

    /// Stops accepting notices and waits for queued ones to be delivered.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("notification worker panicked");
            }
        }
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs every sink for one notice; sinks do not depend on each other.
fn deliver(sinks: &[Arc<dyn Notifier>], notice: &TicketNotice) {
    for sink in sinks {
        match sink.notify(notice) {
            Ok(()) => tracing::debug!(sink = sink.name(), payment_id = %notice.payment_id, "notification sent"),
            Err(err) => tracing::error!(
                sink = sink.name(),
                payment_id = %notice.payment_id,
                %err,
                "notification failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<TicketCode>>,
    }

    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn notify(&self, notice: &TicketNotice) -> Result<(), NotifyError> {
            self.seen.lock().push(notice.ticket_code.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn notify(&self, _notice: &TicketNotice) -> Result<(), NotifyError> {
            Err(NotifyError("smtp down".into()))
        }
    }

    fn notice(code: &str, quantity: u32) -> TicketNotice {
        TicketNotice {
            customer_name: "Ada".into(),
            email: "ada@example.com".into(),
            ticket_code: TicketCode(code.into()),
            quantity,
            event_id: EventId(2),
            payment_id: PaymentId::new(format!("pay_{code}")),
        }
    }

    #[test]
    fn subject_is_pluralized() {
        assert_eq!(notice("a", 1).subject("Deep Dive"), "Your Deep Dive ticket");
        assert_eq!(notice("a", 3).subject("Deep Dive"), "Your Deep Dive tickets");
    }

    #[test]
    fn shutdown_drains_queued_notices() {
        let recorder = Arc::new(Recorder::default());
        let sinks: Vec<Arc<dyn Notifier>> = vec![recorder.clone()];
        let dispatcher = NotificationDispatcher::spawn(sinks, 2);
        for i in 0..20 {
            dispatcher.dispatch(notice(&format!("code{i}"), 1));
        }
        dispatcher.shutdown();
        assert_eq!(recorder.seen.lock().len(), 20);
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let recorder = Arc::new(Recorder::default());
        let sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(Failing), recorder.clone()];
        let dispatcher = NotificationDispatcher::spawn(sinks, 1);
        dispatcher.dispatch(notice("brave-otter", 2));
        dispatcher.shutdown();
        assert_eq!(*recorder.seen.lock(), vec![TicketCode("brave-otter".into())]);
    }

    #[test]
    fn disabled_dispatcher_drops_notices() {
        let dispatcher = NotificationDispatcher::disabled();
        dispatcher.dispatch(notice("brave-otter", 1));
        dispatcher.shutdown();
    }
}
