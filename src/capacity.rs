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

//! Event records and the derived availability view.

use crate::base::EventId;
use serde::{Deserialize, Serialize};

/// Descriptive event fields shown on the sales page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub venue: Option<String>,
    pub start_time: Option<String>,
    pub doors_open: Option<String>,
}

/// A ticketed event. `capacity == None` means sales have not opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub details: EventDetails,
}

impl Event {
    pub fn new(id: EventId, capacity: Option<u32>) -> Self {
        Self {
            id,
            capacity,
            details: EventDetails::default(),
        }
    }

    /// An event counts as initialized once it has both a title and a capacity.
    pub fn is_initialized(&self) -> bool {
        self.details.title.is_some() && self.capacity.is_some()
    }
}

/// How many tickets remain for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// Capacity is unset: "not yet on sale", distinct from sold out.
    Uninitialized,
    Open {
        capacity: u32,
        committed: u32,
        available: u32,
    },
}

impl Availability {
    /// Computes availability as `max(0, capacity - committed)`.
    ///
    /// Capacity may have been lowered below the committed count after sales
    /// began; that reads as zero available, never negative.
    pub fn from_parts(capacity: Option<u32>, committed: u32) -> Self {
        match capacity {
            None => Availability::Uninitialized,
            Some(capacity) => Availability::Open {
                capacity,
                committed,
                available: capacity.saturating_sub(committed),
            },
        }
    }

    /// Remaining tickets, or `None` when sales have not opened.
    pub fn available(&self) -> Option<u32> {
        match self {
            Availability::Uninitialized => None,
            Availability::Open { available, .. } => Some(*available),
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.available() == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_capacity_is_uninitialized_not_sold_out() {
        let availability = Availability::from_parts(None, 0);
        assert_eq!(availability, Availability::Uninitialized);
        assert_eq!(availability.available(), None);
        assert!(!availability.is_sold_out());
    }

    #[test]
    fn available_is_capacity_minus_committed() {
        let availability = Availability::from_parts(Some(35), 10);
        assert_eq!(availability.available(), Some(25));
    }

    #[test]
    fn lowered_capacity_saturates_at_zero() {
        let availability = Availability::from_parts(Some(5), 8);
        assert_eq!(availability.available(), Some(0));
        assert!(availability.is_sold_out());
    }

    #[test]
    fn initialized_requires_title_and_capacity() {
        let mut event = Event::new(EventId(2), Some(35));
        assert!(!event.is_initialized());
        event.details.title = Some("Deep Dive".into());
        assert!(event.is_initialized());
        event.capacity = None;
        assert!(!event.is_initialized());
    }

    #[test]
    fn availability_serializes_with_state_tag() {
        let json = serde_json::to_value(Availability::from_parts(Some(35), 0)).unwrap();
        assert_eq!(json["state"], "open");
        assert_eq!(json["available"], 35);
    }
}
