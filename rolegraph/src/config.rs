// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// Default number of buffered edge events per subscriber before slow receivers start lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration of a role graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of the broadcast channel delivering `EdgeEvent`s.
    pub event_capacity: usize,

    /// Re-read the materialized closure after every reconciliation and roll back when it does not
    /// match the computed one.
    pub verify_closure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            verify_closure: true,
        }
    }
}
