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

use clap::Parser;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use ticket_ledger_rs::{
    Event, EventId, FulfillmentProcessor, LedgerConfig, LogNotifier, MemoryStore,
    NotificationDispatcher, Notifier, PaymentId, PaymentStatus, RosterExport, TicketStore,
    VerifiedPayment, write_roster,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ticket Ledger - Replay verified payment events against an event's capacity
///
/// Reads payment events from a CSV file, fulfills each successful payment
/// exactly once, and writes the resulting order roster to stdout.
#[derive(Parser, Debug)]
#[command(name = "ticket-ledger-rs")]
#[command(about = "Replays payment events into a capacity-checked ticket ledger", long_about = None)]
struct Args {
    /// Path to CSV file with payment events
    ///
    /// Expected format: payment_id,status,name,email,quantity
    /// Example: cargo run -- payments.csv --capacity 35 > roster.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Tickets on sale. Omit to replay against an event that is not yet on sale.
    #[arg(long, env = "TICKET_LEDGER_CAPACITY")]
    capacity: Option<u32>,

    /// Event the payments are for
    #[arg(long, env = "TICKET_LEDGER_EVENT_ID", default_value_t = 2)]
    event_id: u32,

    /// Event title used in confirmation emails
    #[arg(long, env = "TICKET_LEDGER_EVENT_TITLE", default_value = "Midlife High Five Deep Dive")]
    title: String,

    /// Price per ticket
    #[arg(long, env = "TICKET_LEDGER_UNIT_PRICE", default_value = "3.50")]
    unit_price: Decimal,

    /// Store operation deadline in milliseconds
    #[arg(long, env = "TICKET_LEDGER_STORE_TIMEOUT_MS", default_value_t = 2_000)]
    store_timeout_ms: u64,

    /// Ticket code draws before a fulfillment gives up
    #[arg(long, env = "TICKET_LEDGER_MAX_CODE_ATTEMPTS", default_value_t = 8)]
    max_code_attempts: u32,

    /// Notification worker threads
    #[arg(long, env = "TICKET_LEDGER_NOTIFICATION_WORKERS", default_value_t = 2)]
    notification_workers: usize,

    /// Also keep a roster CSV at this path, rewritten after every new order
    #[arg(long, env = "TICKET_LEDGER_ROSTER")]
    roster: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> LedgerConfig {
        LedgerConfig {
            event_id: EventId(self.event_id),
            unit_price: self.unit_price,
            store_timeout_ms: self.store_timeout_ms,
            max_code_attempts: self.max_code_attempts,
            notification_workers: self.notification_workers,
            ..LedgerConfig::default()
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.config();

    let store = Arc::new(MemoryStore::with_timeout(config.store_timeout()));
    let mut event = Event::new(config.event_id, args.capacity);
    event.details.title = Some(args.title.clone());
    if let Err(e) = store.provision_event(event) {
        tracing::error!(%e, "failed to provision event");
        process::exit(1);
    }

    let mut sinks: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier::new(args.title.clone()))];
    if let Some(path) = &args.roster {
        sinks.push(Arc::new(RosterExport::new(
            Arc::clone(&store),
            config.event_id,
            path,
        )));
    }
    let workers = config.notification_workers;
    let processor = FulfillmentProcessor::new(Arc::clone(&store), config)
        .with_notifications(NotificationDispatcher::spawn(sinks, workers));

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!(path = %args.input.display(), %e, "error opening file");
            process::exit(1);
        }
    };

    let summary = match process_payments(&processor, BufReader::new(file)) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(%e, "error processing payments");
            process::exit(1);
        }
    };
    let event_id = processor.config().event_id;
    processor.shutdown();
    tracing::info!(
        fulfilled = summary.fulfilled,
        replayed = summary.replayed,
        rejected = summary.rejected,
        "replay finished"
    );

    if let Err(e) = write_roster(&*store, event_id, std::io::stdout().lock()) {
        tracing::error!(%e, "error writing roster");
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `payment_id, status, name, email, quantity`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    payment_id: String,
    status: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    quantity: String,
}

impl CsvRecord {
    /// Converts the row into the payment record the collaborator would report.
    ///
    /// Empty metadata cells are left out so fulfillment reports them missing.
    fn into_payment(self) -> VerifiedPayment {
        let metadata: HashMap<String, String> = [
            ("name", self.name),
            ("email", self.email),
            ("quantity", self.quantity),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        VerifiedPayment {
            payment_id: PaymentId(self.payment_id),
            status: PaymentStatus::parse(&self.status),
            metadata,
        }
    }
}

/// Counts of what happened to each replayed row.
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    fulfilled: usize,
    replayed: usize,
    rejected: usize,
}

/// Replays payment events from a CSV reader.
///
/// Rows are streamed, so arbitrarily large files are never loaded whole.
/// Malformed rows and rejected payments are logged and skipped; a payment id
/// that already produced an order is a redelivery and yields that order.
///
/// # CSV Format
///
/// ```csv
/// payment_id,status,name,email,quantity
/// pay_abc,succeeded,Ada Lovelace,ada@example.com,2
/// pay_abc,succeeded,Ada Lovelace,ada@example.com,2
/// pay_def,canceled,Bob,bob@example.com,1
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the header is unreadable.
fn process_payments<S, R>(
    processor: &FulfillmentProcessor<S>,
    reader: R,
) -> Result<ReplaySummary, csv::Error>
where
    S: TicketStore + Clone,
    R: Read,
{
    let mut summary = ReplaySummary::default();
    let mut seen: HashSet<PaymentId> = HashSet::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);
    // Fail fast on an unreadable header rather than skipping every row.
    rdr.headers()?;

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%e, "skipping malformed row");
                summary.rejected += 1;
                continue;
            }
        };

        let payment = record.into_payment();
        match processor.process_payment(&payment) {
            Ok(_) if seen.contains(&payment.payment_id) => summary.replayed += 1,
            Ok(_) => {
                seen.insert(payment.payment_id.clone());
                summary.fulfilled += 1;
            }
            Err(e) => {
                tracing::warn!(payment_id = %payment.payment_id, %e, "payment rejected");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

/// Writes the roster for the processor's event.
#[cfg(test)]
fn roster_string<S: TicketStore + Clone>(processor: &FulfillmentProcessor<S>) -> String {
    let mut output = Vec::new();
    write_roster(processor.store(), processor.config().event_id, &mut output).unwrap();
    String::from_utf8(output).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn processor(capacity: Option<u32>) -> FulfillmentProcessor<Arc<MemoryStore>> {
        let store = Arc::new(MemoryStore::new());
        store
            .provision_event(Event::new(EventId(2), capacity))
            .unwrap();
        FulfillmentProcessor::new(store, LedgerConfig::default())
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::try_parse_from([
            "ticket-ledger-rs",
            "payments.csv",
            "--capacity",
            "35",
            "--event-id",
            "7",
            "--unit-price",
            "5.00",
            "--store-timeout-ms",
            "250",
            "--max-code-attempts",
            "3",
            "--notification-workers",
            "1",
        ])
        .unwrap();
        let config = args.config();

        assert_eq!(args.capacity, Some(35));
        assert_eq!(config.event_id, EventId(7));
        assert_eq!(config.unit_price, Decimal::new(500, 2));
        assert_eq!(config.store_timeout_ms, 250);
        assert_eq!(config.max_code_attempts, 3);
        assert_eq!(config.notification_workers, 1);
        assert_eq!(config.max_per_order, LedgerConfig::default().max_per_order);
    }

    #[test]
    fn replay_single_payment() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_abc,succeeded,Ada,ada@example.com,2\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(summary.fulfilled, 1);
        assert_eq!(processor.store().committed_count(EventId(2)), Ok(2));
    }

    #[test]
    fn redelivered_payment_commits_once() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_abc,succeeded,Ada,ada@example.com,2\n\
                   pay_abc,succeeded,Ada,ada@example.com,2\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                fulfilled: 1,
                replayed: 1,
                rejected: 0
            }
        );
        assert_eq!(processor.store().orders(EventId(2)).unwrap().len(), 1);
    }

    #[test]
    fn success_after_rejected_row_counts_as_fulfilled() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_abc,processing,Ada,ada@example.com,2\n\
                   pay_abc,succeeded,Ada,ada@example.com,2\n\
                   pay_abc,succeeded,Ada,ada@example.com,2\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                fulfilled: 1,
                replayed: 1,
                rejected: 1
            }
        );
        assert_eq!(processor.store().committed_count(EventId(2)), Ok(2));
    }

    #[test]
    fn unsuccessful_payments_are_skipped() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_a,canceled,Ada,ada@example.com,2\n\
                   pay_b,processing,Bob,bob@example.com,1\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(summary.rejected, 2);
        assert_eq!(processor.store().committed_count(EventId(2)), Ok(0));
    }

    #[test]
    fn parse_with_whitespace() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n pay_abc , succeeded , Ada , ada@example.com , 3 \n";

        process_payments(&processor, Cursor::new(csv)).unwrap();

        let order = processor
            .store()
            .order_by_payment(&PaymentId::new("pay_abc"))
            .unwrap()
            .unwrap();
        assert_eq!(order.quantity, 3);
    }

    #[test]
    fn missing_metadata_rows_are_rejected() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_a,succeeded,Ada,,2\n\
                   pay_b,succeeded\n\
                   pay_c,succeeded,Cy,cy@example.com,1\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(summary.fulfilled, 1);
        assert_eq!(summary.rejected, 2);
    }

    #[test]
    fn oversell_is_rejected_at_commit() {
        let processor = processor(Some(3));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_a,succeeded,Ada,ada@example.com,2\n\
                   pay_b,succeeded,Bob,bob@example.com,2\n\
                   pay_c,succeeded,Cy,cy@example.com,1\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(summary.fulfilled, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(processor.store().committed_count(EventId(2)), Ok(3));
    }

    #[test]
    fn event_not_on_sale_rejects_everything() {
        let processor = processor(None);
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_a,succeeded,Ada,ada@example.com,2\n";

        let summary = process_payments(&processor, Cursor::new(csv)).unwrap();

        assert_eq!(summary.rejected, 1);
        let customer = processor
            .store()
            .customer_by_email("ada@example.com")
            .unwrap();
        assert_eq!(customer.map(|c| c.name), Some("Ada".to_string()));
    }

    #[test]
    fn roster_written_after_replay() {
        let processor = processor(Some(35));
        let csv = "payment_id,status,name,email,quantity\n\
                   pay_a,succeeded,Ada,ada@example.com,2\n\
                   pay_b,succeeded,Bob,bob@example.com,1\n";
        process_payments(&processor, Cursor::new(csv)).unwrap();

        let roster = roster_string(&processor);

        assert!(roster.starts_with("Customer Name,Quantity,Tickets Code,Date and Time\n"));
        assert!(roster.contains("\nAda,2,"));
        assert!(roster.contains("\nBob,1,"));
        assert!(roster.ends_with("Total,3,,\n"));
    }
}
