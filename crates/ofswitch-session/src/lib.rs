//! Transaction correlation for switch control sessions.
//!
//! This crate matches every outbound request on a device connection to its
//! eventual, possibly out-of-order, reply:
//!
//! - [`TransactionTable`]: concurrent map from xid to a pending result slot
//! - [`RequestIssuer`]: validates, allocates an xid, submits, returns a handle
//! - [`PendingReply`]: awaitable handle resolving to the reply or an error
//! - [`DeviceSession`]: one connection's table, issuer and inbound dispatch
//! - [`SessionRegistry`]: live sessions keyed by device
//!
//! Encoding requests and reading the socket are left to the [`Transport`]
//! and to whoever feeds [`InboundMessage`]s to the session.

mod config;
mod error;
mod issuer;
mod message;
mod registry;
mod session;
mod table;
mod transport;
mod xid;

pub use config::SessionConfig;
pub use error::{DeviceErrorType, SessionError, SessionResult};
pub use issuer::{PendingReply, RequestIssuer};
pub use message::{InboundMessage, MessageKind, OutboundMessage, Reply, ReplyPolicy, HEADER_LEN};
pub use registry::SessionRegistry;
pub use session::{DeviceSession, SessionIo};
pub use table::{ReplySlot, TableStats, TransactionTable};
pub use transport::{ChannelTransport, OutboundFrame, Transport};
pub use xid::TransactionId;
