//! Flow, group and meter payloads.
//!
//! These are the controller-side descriptions of the entities a batch
//! installs on a device. Match fields and actions are carried in their
//! textual form; turning them into wire structures is the codec's job.

use crate::{FlowId, GroupId, MeterId, ParseError, TableId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A forwarding table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    /// Client-assigned identifier, echoed in failure reports.
    pub id: FlowId,
    #[serde(default)]
    pub table_id: TableId,
    #[serde(default)]
    pub priority: u16,
    #[serde(default)]
    pub cookie: u64,
    #[serde(default)]
    pub idle_timeout: u16,
    #[serde(default)]
    pub hard_timeout: u16,
    /// Match fields, e.g. `in_port=1`, `eth_type=0x0800`.
    #[serde(default)]
    pub match_fields: BTreeMap<String, String>,
    /// Instruction list in textual form, e.g. `output:2`, `group:5`.
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl FlowEntry {
    /// Creates an empty entry in table 0.
    pub fn new(id: FlowId) -> Self {
        Self {
            id,
            table_id: TableId::default(),
            priority: 0,
            cookie: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            match_fields: BTreeMap::new(),
            instructions: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_table(mut self, table_id: TableId) -> Self {
        self.table_id = table_id;
        self
    }

    pub fn with_match(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_fields.insert(field.into(), value.into());
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Returns the group ids referenced by `group:<id>` instructions.
    pub fn referenced_groups(&self) -> Vec<GroupId> {
        self.instructions
            .iter()
            .filter_map(|i| i.strip_prefix("group:"))
            .filter_map(|id| id.parse().ok())
            .collect()
    }
}

/// Group semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    /// Execute all buckets (multicast/broadcast).
    #[default]
    All,
    /// Execute one bucket (ECMP style).
    Select,
    /// Execute the single defined bucket.
    Indirect,
    /// Execute the first live bucket.
    FastFailover,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupType::All => "all",
            GroupType::Select => "select",
            GroupType::Indirect => "indirect",
            GroupType::FastFailover => "fast-failover",
        };
        f.write_str(s)
    }
}

impl FromStr for GroupType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(GroupType::All),
            "select" => Ok(GroupType::Select),
            "indirect" => Ok(GroupType::Indirect),
            "fast-failover" | "ff" => Ok(GroupType::FastFailover),
            _ => Err(ParseError::InvalidGroupType(s.to_string())),
        }
    }
}

/// One action bucket of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub weight: u16,
    #[serde(default)]
    pub watch_port: Option<u32>,
    #[serde(default)]
    pub watch_group: Option<GroupId>,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A group table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub id: GroupId,
    #[serde(default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

impl GroupEntry {
    pub fn new(id: GroupId, group_type: GroupType) -> Self {
        Self {
            id,
            group_type,
            buckets: Vec::new(),
        }
    }

    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.buckets.push(bucket);
        self
    }
}

/// Meter configuration flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterFlags {
    /// Rates are in kilobits per second.
    #[serde(default)]
    pub kbps: bool,
    /// Rates are in packets per second.
    #[serde(default)]
    pub pktps: bool,
    #[serde(default)]
    pub burst: bool,
    #[serde(default)]
    pub stats: bool,
}

/// What a meter band does once its rate is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MeterBandKind {
    Drop,
    DscpRemark { prec_level: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterBand {
    pub kind: MeterBandKind,
    pub rate: u32,
    #[serde(default)]
    pub burst_size: u32,
}

/// A meter table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterEntry {
    pub id: MeterId,
    #[serde(default)]
    pub flags: MeterFlags,
    #[serde(default)]
    pub bands: Vec<MeterBand>,
}

impl MeterEntry {
    pub fn new(id: MeterId) -> Self {
        Self {
            id,
            flags: MeterFlags::default(),
            bands: Vec::new(),
        }
    }

    pub fn with_band(mut self, band: MeterBand) -> Self {
        self.bands.push(band);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flow_entry_builder() {
        let flow = FlowEntry::new(FlowId::new("f1").unwrap())
            .with_priority(42)
            .with_match("in_port", "1")
            .with_instruction("group:5")
            .with_instruction("output:2");

        assert_eq!(flow.priority, 42);
        assert_eq!(flow.match_fields.get("in_port").map(String::as_str), Some("1"));
        assert_eq!(flow.referenced_groups(), vec![GroupId::new(5).unwrap()]);
    }

    #[test]
    fn test_group_type_parse() {
        assert_eq!("select".parse::<GroupType>().unwrap(), GroupType::Select);
        assert_eq!("FF".parse::<GroupType>().unwrap(), GroupType::FastFailover);
        assert!("weird".parse::<GroupType>().is_err());
        assert_eq!(GroupType::FastFailover.to_string(), "fast-failover");
    }

    #[test]
    fn test_flow_entry_deserialize_defaults() {
        let flow: FlowEntry = serde_json::from_str(r#"{"id": "f9"}"#).unwrap();
        assert_eq!(flow, FlowEntry::new(FlowId::new("f9").unwrap()));
    }

    #[test]
    fn test_meter_band_serde() {
        let meter = MeterEntry::new(MeterId::new(3).unwrap()).with_band(MeterBand {
            kind: MeterBandKind::DscpRemark { prec_level: 1 },
            rate: 1000,
            burst_size: 100,
        });
        let json = serde_json::to_value(&meter).unwrap();
        assert_eq!(json["bands"][0]["kind"]["type"], "dscp-remark");
        let back: MeterEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, meter);
    }
}
