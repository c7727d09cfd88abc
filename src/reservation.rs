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

//! Advisory availability checks made before a payment is started.
//!
//! Nothing is held or written here. The buyer spends minutes in the gateway's
//! checkout between this check and fulfillment, and no lock survives that
//! window, so the check only rejects requests that are already hopeless.
//! Overselling is prevented at commit time by [`TicketStore::insert_order`].

use crate::base::EventId;
use crate::capacity::Availability;
use crate::error::TicketError;
use crate::store::TicketStore;
use serde::Serialize;

/// Result of a passed pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReservationCheck {
    pub quantity: u32,
    /// Tickets remaining when the check ran.
    pub available: u32,
}

/// Answers availability queries and pre-checks quantity requests.
#[derive(Debug)]
pub struct ReservationCoordinator<S> {
    store: S,
    max_per_order: u32,
}

impl<S: TicketStore> ReservationCoordinator<S> {
    pub fn new(store: S, max_per_order: u32) -> Self {
        Self {
            store,
            max_per_order,
        }
    }

    pub fn availability(&self, event_id: EventId) -> Result<Availability, TicketError> {
        Ok(self.store.availability(event_id)?)
    }

    /// Checks whether `quantity` tickets could currently be sold.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidQuantity`] - zero tickets requested.
    /// - [`TicketError::QuantityAboveLimit`] - above the per-order limit.
    /// - [`TicketError::SalesNotOpen`] - capacity is unset.
    /// - [`TicketError::CapacityExceeded`] - carries the current available count.
    pub fn check_availability(
        &self,
        event_id: EventId,
        quantity: u32,
    ) -> Result<ReservationCheck, TicketError> {
        if quantity == 0 {
            return Err(TicketError::InvalidQuantity);
        }
        if quantity > self.max_per_order {
            return Err(TicketError::QuantityAboveLimit {
                max: self.max_per_order,
            });
        }

        let available = self
            .availability(event_id)?
            .available()
            .ok_or(TicketError::SalesNotOpen)?;

        if quantity > available {
            tracing::debug!(%event_id, quantity, available, "reservation check rejected");
            return Err(TicketError::CapacityExceeded {
                requested: quantity,
                available,
            });
        }

        Ok(ReservationCheck {
            quantity,
            available,
        })
    }
}
