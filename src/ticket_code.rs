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

//! Ticket code generation.
//!
//! Codes are `adjective-animal` pairs. They are drawn at fulfillment time
//! only, and uniqueness is enforced by the store, so a generator only needs
//! to make collisions unlikely.

use crate::base::TicketCode;
use rand::Rng;

/// Source of candidate ticket codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> TicketCode;
}

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "bright", "brisk", "calm", "clever", "cosmic", "crisp", "curious",
    "daring", "dizzy", "eager", "fancy", "fierce", "fluffy", "gentle", "giddy", "glad", "golden",
    "grand", "happy", "hasty", "humble", "jolly", "keen", "lively", "lucky", "mellow", "merry",
    "mighty", "misty", "noble", "odd", "plucky", "polite", "proud", "quick", "quiet", "rapid",
    "rosy", "rustic", "shiny", "silent", "silly", "sleek", "snowy", "spry", "sunny", "swift",
    "tidy", "velvet", "vivid", "warm", "wild", "wise", "witty", "zany", "zesty", "zippy",
];

const ANIMALS: &[&str] = &[
    "alpaca", "badger", "beaver", "bison", "bobcat", "camel", "cheetah", "cobra", "condor",
    "coyote", "crane", "dingo", "dolphin", "eagle", "falcon", "ferret", "finch", "gazelle",
    "gecko", "gibbon", "heron", "hippo", "ibis", "iguana", "jackal", "jaguar", "koala", "lemur",
    "leopard", "llama", "lynx", "marmot", "meerkat", "mink", "moose", "newt", "ocelot", "orca",
    "otter", "owl", "panda", "pelican", "puffin", "quail", "rabbit", "raven", "salmon", "seal",
    "shark", "sloth", "stoat", "swan", "tapir", "tiger", "toucan", "turtle", "walrus", "wombat",
    "yak", "zebra",
];

/// Random `adjective-animal` codes, e.g. `plucky-otter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPairGenerator;

impl WordPairGenerator {
    /// Number of distinct codes this generator can produce.
    pub const fn combinations() -> usize {
        ADJECTIVES.len() * ANIMALS.len()
    }
}

impl CodeGenerator for WordPairGenerator {
    fn generate(&self) -> TicketCode {
        let mut rng = rand::rng();
        let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
        let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
        TicketCode(format!("{adjective}-{animal}"))
    }
}
