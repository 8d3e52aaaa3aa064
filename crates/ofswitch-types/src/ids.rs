//! Entity identifiers with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Client-assigned identifier of a forwarding (flow) entry.
///
/// Flow ids are opaque strings chosen by the caller. They must be non-empty
/// and must not contain whitespace or control characters, since they are
/// echoed back verbatim in batch failure reports.
///
/// # Examples
///
/// ```
/// use ofswitch_types::FlowId;
///
/// let id = FlowId::new("f1").unwrap();
/// assert_eq!(id.as_str(), "f1");
///
/// assert!(FlowId::new("").is_err());
/// assert!(FlowId::new("two words").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowId(String);

impl FlowId {
    /// Maximum accepted length in bytes.
    pub const MAX_LEN: usize = 256;

    /// Creates a new flow id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty, too long, or contains whitespace
    /// or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= Self::MAX_LEN
            && !id.chars().any(|c| c.is_whitespace() || c.is_control());
        if valid {
            Ok(FlowId(id))
        } else {
            Err(ParseError::InvalidFlowId(id))
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FlowId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FlowId::new(s)
    }
}

impl TryFrom<String> for FlowId {
    type Error = ParseError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        FlowId::new(id)
    }
}

impl From<FlowId> for String {
    fn from(id: FlowId) -> String {
        id.0
    }
}

/// Group table identifier.
///
/// Values above `0xffffff00` are reserved by the protocol (`ALL`, `ANY`),
/// and group 0 is never assigned by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct GroupId(u32);

impl GroupId {
    /// Minimum valid group id.
    pub const MIN: u32 = 1;

    /// Maximum valid group id.
    pub const MAX: u32 = 0xffff_ff00;

    /// Creates a new group id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is outside 1-0xffffff00.
    pub const fn new(id: u32) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(GroupId(id))
        } else {
            Err(ParseError::InvalidGroupId(id))
        }
    }

    /// Returns the id as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
        GroupId::new(id)
    }
}

impl TryFrom<u32> for GroupId {
    type Error = ParseError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        GroupId::new(id)
    }
}

impl From<GroupId> for u32 {
    fn from(id: GroupId) -> u32 {
        id.0
    }
}

/// Meter table identifier.
///
/// Virtual meters (`SLOWPATH`, `CONTROLLER`, `ALL`) live above `0xffff0000`
/// and cannot be configured through batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MeterId(u32);

impl MeterId {
    /// Minimum valid meter id.
    pub const MIN: u32 = 1;

    /// Maximum valid meter id.
    pub const MAX: u32 = 0xffff_0000;

    /// Creates a new meter id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is outside 1-0xffff0000.
    pub const fn new(id: u32) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(MeterId(id))
        } else {
            Err(ParseError::InvalidMeterId(id))
        }
    }

    /// Returns the id as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MeterId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
        MeterId::new(id)
    }
}

impl TryFrom<u32> for MeterId {
    type Error = ParseError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        MeterId::new(id)
    }
}

impl From<MeterId> for u32 {
    fn from(id: MeterId) -> u32 {
        id.0
    }
}

/// Flow table number. Table 255 means "all tables" and is rejected.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct TableId(u8);

impl TableId {
    /// Maximum valid table number.
    pub const MAX: u8 = 254;

    /// Creates a new table id.
    pub const fn new(id: u8) -> Result<Self, ParseError> {
        if id <= Self::MAX {
            Ok(TableId(id))
        } else {
            Err(ParseError::InvalidTableId(id))
        }
    }

    /// Returns the table number.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for TableId {
    type Error = ParseError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        TableId::new(id)
    }
}

impl From<TableId> for u8 {
    fn from(id: TableId) -> u8 {
        id.0
    }
}
