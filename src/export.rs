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

//! Order roster export.
//!
//! Renders every order of an event as CSV, one row per order plus a `Total`
//! row, the same table the organiser keeps in their spreadsheet. The
//! [`RosterExport`] sink rewrites the file after each new order.

use crate::base::{CustomerId, EventId};
use crate::error::{NotifyError, StoreError};
use crate::notification::{Notifier, TicketNotice};
use crate::store::TicketStore;
use csv::Writer;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

pub const ROSTER_HEADER: [&str; 4] = ["Customer Name", "Quantity", "Tickets Code", "Date and Time"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the roster for `event_id` as CSV.
///
/// # CSV Format
///
/// ```csv
/// Customer Name,Quantity,Tickets Code,Date and Time
/// Ada Lovelace,2,brave-otter,2025-01-23 18:04
/// Total,2,,
/// ```
///
/// # Errors
///
/// Returns an error if the store cannot be read or writing fails.
pub fn write_roster<S, W>(store: &S, event_id: EventId, writer: W) -> Result<(), ExportError>
where
    S: TicketStore + ?Sized,
    W: Write,
{
    let orders = store.orders(event_id)?;
    let mut names: HashMap<CustomerId, String> = HashMap::new();
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(ROSTER_HEADER)?;

    let mut total: u64 = 0;
    for order in &orders {
        if !names.contains_key(&order.customer_id) {
            let name = store
                .customer(order.customer_id)?
                .map(|customer| customer.name)
                .unwrap_or_default();
            names.insert(order.customer_id, name);
        }
        let name = names.get(&order.customer_id).map_or("", String::as_str);

        total += u64::from(order.quantity);
        let quantity = order.quantity.to_string();
        let created_at = order.created_at.format(TIMESTAMP_FORMAT).to_string();
        wtr.write_record([
            name,
            quantity.as_str(),
            order.ticket_code.as_str(),
            created_at.as_str(),
        ])?;
    }

    let total = total.to_string();
    wtr.write_record(["Total", total.as_str(), "", ""])?;
    wtr.flush()?;
    Ok(())
}

/// Spreadsheet sync stand-in: rewrites a roster file on every new order.
pub struct RosterExport<S> {
    store: S,
    event_id: EventId,
    path: PathBuf,
    /// Serializes rewrites from concurrent notification workers.
    writing: Mutex<()>,
}

impl<S: TicketStore> RosterExport<S> {
    pub fn new(store: S, event_id: EventId, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            event_id,
            path: path.into(),
            writing: Mutex::new(()),
        }
    }

    /// Renders in memory first, then swaps the file in by rename. A failed
    /// read leaves the previous roster untouched.
    fn rewrite(&self) -> Result<(), ExportError> {
        let _writing = self.writing.lock();
        let mut rendered = Vec::new();
        write_roster(&self.store, self.event_id, &mut rendered)?;

        let staging = self.path.with_extension("csv.tmp");
        fs::write(&staging, &rendered)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl<S: TicketStore> Notifier for RosterExport<S> {
    fn name(&self) -> &str {
        "roster"
    }

    fn notify(&self, _notice: &TicketNotice) -> Result<(), NotifyError> {
        self.rewrite().map_err(|err| NotifyError(err.to_string()))
    }
}
