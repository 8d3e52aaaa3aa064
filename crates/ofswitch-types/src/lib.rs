//! Common types for programmable switch control-plane sessions.
//!
//! This crate provides type-safe representations of the identifiers and
//! entity payloads exchanged with a switch over its control connection:
//!
//! - [`DeviceRef`]: reference to one connected device (`openflow:<dpid>`)
//! - [`FlowId`]: client-assigned forwarding entry identifier
//! - [`GroupId`]: group table identifier (1-0xffffff00)
//! - [`MeterId`]: meter table identifier (1-0xffff0000)
//! - [`TableId`]: flow table number (0-254)
//! - [`FlowEntry`], [`GroupEntry`], [`MeterEntry`]: entity payloads

mod device;
mod entity;
mod ids;

pub use device::DeviceRef;
pub use entity::{
    Bucket, FlowEntry, GroupEntry, GroupType, MeterBand, MeterBandKind, MeterEntry, MeterFlags,
};
pub use ids::{FlowId, GroupId, MeterId, TableId};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid device reference: {0}")]
    InvalidDeviceRef(String),

    #[error("invalid flow id: {0:?}")]
    InvalidFlowId(String),

    #[error("invalid group id: {0} (must be 1-4294967040)")]
    InvalidGroupId(u32),

    #[error("invalid meter id: {0} (must be 1-4294901760)")]
    InvalidMeterId(u32),

    #[error("invalid table id: {0} (must be 0-254)")]
    InvalidTableId(u8),

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("invalid group type: {0}")]
    InvalidGroupType(String),
}
