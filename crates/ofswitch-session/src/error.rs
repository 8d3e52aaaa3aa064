//! Session error types and device error codes.
//!
//! Every way a pending request can end other than with a reply is expressed
//! as a [`SessionError`]. The variants map onto the four failure classes a
//! caller has to tell apart: local validation, device-reported errors,
//! connection loss and unanswered requests.

use std::fmt;
use thiserror::Error;

use crate::xid::TransactionId;

/// Error message types a device may report, numbered as on the wire.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorType {
    HelloFailed = 0,
    BadRequest = 1,
    BadAction = 2,
    BadInstruction = 3,
    BadMatch = 4,
    FlowModFailed = 5,
    GroupModFailed = 6,
    PortModFailed = 7,
    TableModFailed = 8,
    QueueOpFailed = 9,
    SwitchConfigFailed = 10,
    RoleRequestFailed = 11,
    MeterModFailed = 12,
    TableFeaturesFailed = 13,
    Experimenter = 0xffff,
    // Codes outside the table above are kept as BadRequest
}

impl DeviceErrorType {
    /// Creates a DeviceErrorType from its wire value.
    pub fn from_raw(value: u16) -> Self {
        match value {
            0 => DeviceErrorType::HelloFailed,
            1 => DeviceErrorType::BadRequest,
            2 => DeviceErrorType::BadAction,
            3 => DeviceErrorType::BadInstruction,
            4 => DeviceErrorType::BadMatch,
            5 => DeviceErrorType::FlowModFailed,
            6 => DeviceErrorType::GroupModFailed,
            7 => DeviceErrorType::PortModFailed,
            8 => DeviceErrorType::TableModFailed,
            9 => DeviceErrorType::QueueOpFailed,
            10 => DeviceErrorType::SwitchConfigFailed,
            11 => DeviceErrorType::RoleRequestFailed,
            12 => DeviceErrorType::MeterModFailed,
            13 => DeviceErrorType::TableFeaturesFailed,
            0xffff => DeviceErrorType::Experimenter,
            _ => DeviceErrorType::BadRequest,
        }
    }

    /// Returns the wire value.
    pub fn as_raw(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for DeviceErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceErrorType::HelloFailed => "OFPET_HELLO_FAILED",
            DeviceErrorType::BadRequest => "OFPET_BAD_REQUEST",
            DeviceErrorType::BadAction => "OFPET_BAD_ACTION",
            DeviceErrorType::BadInstruction => "OFPET_BAD_INSTRUCTION",
            DeviceErrorType::BadMatch => "OFPET_BAD_MATCH",
            DeviceErrorType::FlowModFailed => "OFPET_FLOW_MOD_FAILED",
            DeviceErrorType::GroupModFailed => "OFPET_GROUP_MOD_FAILED",
            DeviceErrorType::PortModFailed => "OFPET_PORT_MOD_FAILED",
            DeviceErrorType::TableModFailed => "OFPET_TABLE_MOD_FAILED",
            DeviceErrorType::QueueOpFailed => "OFPET_QUEUE_OP_FAILED",
            DeviceErrorType::SwitchConfigFailed => "OFPET_SWITCH_CONFIG_FAILED",
            DeviceErrorType::RoleRequestFailed => "OFPET_ROLE_REQUEST_FAILED",
            DeviceErrorType::MeterModFailed => "OFPET_METER_MOD_FAILED",
            DeviceErrorType::TableFeaturesFailed => "OFPET_TABLE_FEATURES_FAILED",
            DeviceErrorType::Experimenter => "OFPET_EXPERIMENTER",
        };
        f.write_str(s)
    }
}

/// Error type for session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Request rejected locally before a transaction id was allocated.
    #[error("Invalid request: {message}")]
    Validation { message: String },

    /// Device answered the request with an error message.
    #[error("Device error {err_type} code {code}: {message}")]
    Device {
        err_type: DeviceErrorType,
        code: u16,
        message: String,
    },

    /// Connection went away while the request was outstanding.
    #[error("Device disconnected")]
    ConnectionLost,

    /// No reply arrived within the configured bound.
    #[error("Request {xid} timed out")]
    Timeout { xid: TransactionId },

    /// Session is shut down and accepts no new requests.
    #[error("Session is shut down")]
    Shutdown,

    /// Outbound transport refused the message.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Every transaction id is currently outstanding.
    #[error("Transaction ids exhausted")]
    XidExhausted,

    /// No session is registered for the device.
    #[error("Device {device} is not connected")]
    NotConnected { device: String },
}

impl SessionError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SessionError::Validation {
            message: message.into(),
        }
    }

    /// Creates a device-reported error.
    pub fn device(err_type: DeviceErrorType, code: u16, message: impl Into<String>) -> Self {
        SessionError::Device {
            err_type,
            code,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        SessionError::Transport {
            message: message.into(),
        }
    }

    /// Creates a not-connected error for the given device.
    pub fn not_connected(device: impl fmt::Display) -> Self {
        SessionError::NotConnected {
            device: device.to_string(),
        }
    }

    /// Returns true if the request was never put on the wire.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SessionError::Validation { .. }
                | SessionError::Shutdown
                | SessionError::XidExhausted
                | SessionError::NotConnected { .. }
        )
    }

    /// Returns true if resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectionLost
                | SessionError::Timeout { .. }
                | SessionError::Transport { .. }
                | SessionError::XidExhausted
                | SessionError::NotConnected { .. }
        )
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
