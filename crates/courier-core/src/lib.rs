//! Shared capability traits and value types for Courier.
//!
//! This crate defines the seams between the kit and the messaging host:
//! - [`MessageSender`] - delivers content to a recipient, returns delivery metadata
//! - [`Clock`] - supplies the current time, injectable for deterministic tests
//!
//! plus the value types that cross those seams ([`Content`], [`SendReceipt`],
//! [`IncomingMessage`], [`SendError`]).

mod clock;
mod message;
mod sender;

pub use clock::{Clock, SystemClock};
pub use message::{Content, IncomingMessage, SendReceipt};
pub use sender::{MessageSender, SendError};
