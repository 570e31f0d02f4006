//! Realtime feed envelope pushed by the remote pulses collection.

use serde::{Deserialize, Serialize};

use crate::pulse::Pulse;

/// Operation carried by one feed event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeedOp {
    Insert,
    Update,
    Delete,
}

/// One push event from the realtime subscription. Delete events carry the
/// last known row so consumers can key tombstones off it.
#[derive(Clone, Debug, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct FeedEvent {
    pub op: FeedOp,
    pub pulse: Pulse,
}

impl FeedEvent {
    pub fn insert(pulse: Pulse) -> Self {
        Self {
            op: FeedOp::Insert,
            pulse,
        }
    }

    pub fn update(pulse: Pulse) -> Self {
        Self {
            op: FeedOp::Update,
            pulse,
        }
    }

    pub fn delete(pulse: Pulse) -> Self {
        Self {
            op: FeedOp::Delete,
            pulse,
        }
    }
}
