//! Device references.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a connected switch, in `openflow:<datapath-id>` form.
///
/// # Examples
///
/// ```
/// use ofswitch_types::DeviceRef;
///
/// let device: DeviceRef = "openflow:1".parse().unwrap();
/// assert_eq!(device.datapath_id(), 1);
/// assert!("ovsdb:1".parse::<DeviceRef>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceRef {
    datapath_id: u64,
}

impl DeviceRef {
    /// Node id prefix for openflow devices.
    pub const PREFIX: &'static str = "openflow:";

    /// Creates a reference from a datapath id.
    pub const fn new(datapath_id: u64) -> Self {
        DeviceRef { datapath_id }
    }

    /// Returns the datapath id.
    pub const fn datapath_id(&self) -> u64 {
        self.datapath_id
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.datapath_id)
    }
}

impl FromStr for DeviceRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dpid = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| ParseError::InvalidDeviceRef(s.to_string()))?;
        let datapath_id: u64 = dpid
            .parse()
            .map_err(|_| ParseError::InvalidDeviceRef(s.to_string()))?;
        Ok(DeviceRef::new(datapath_id))
    }
}

impl TryFrom<String> for DeviceRef {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceRef> for String {
    fn from(device: DeviceRef) -> String {
        device.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_device_ref() {
        let device: DeviceRef = "openflow:18446744073709551615".parse().unwrap();
        assert_eq!(device.datapath_id(), u64::MAX);
        assert_eq!(device.to_string(), "openflow:18446744073709551615");
    }

    #[test]
    fn test_parse_invalid_device_ref() {
        assert!("openflow:".parse::<DeviceRef>().is_err());
        assert!("openflow:-1".parse::<DeviceRef>().is_err());
        assert!("ut-dummy-node".parse::<DeviceRef>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&DeviceRef::new(7)).unwrap();
        assert_eq!(json, "\"openflow:7\"");
        let back: DeviceRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeviceRef::new(7));
    }
}
