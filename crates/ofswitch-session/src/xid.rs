//! Transaction identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-connection correlation token (the header `xid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u32);

impl TransactionId {
    pub const fn new(xid: u32) -> Self {
        TransactionId(xid)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TransactionId {
    fn from(xid: u32) -> Self {
        TransactionId(xid)
    }
}

impl From<TransactionId> for u32 {
    fn from(xid: TransactionId) -> u32 {
        xid.0
    }
}
