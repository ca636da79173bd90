//! GSM AT Command Protocol
//!
//! This crate provides the I/O-free half of talking to a GSM phone or modem
//! over its Hayes "AT" command interface (GSM 07.07 / 07.05). It knows how
//! commands and responses are framed on the wire, how to classify a raw
//! response into a payload or a typed error, and how to recognise the
//! unsolicited notifications a phone pushes without being asked.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → phone): text terminated with `\r`
//! - **Echo**: unless disabled with `ATE0`, the phone echoes the command back
//! - **Final result codes**: `\r\nOK\r\n`, `\r\nERROR\r\n`,
//!   `\r\n+CMS ERROR: <n>\r\n` (message service) and
//!   `\r\n+CME ERROR: <n>\r\n` (mobile equipment)
//! - **Unsolicited result codes**: `+CMTI`, `+CMT`, `+CDSI`, `+CDS`, which may
//!   be spliced anywhere into the response stream
//!
//! # Example
//!
//! ```rust
//! use gsmlink_at_protocol::{dispatch_unsolicited, Command, MessageIndication, Response};
//!
//! let cmd = Command::Manufacturer;
//! assert_eq!(cmd.encode(), b"AT+CGMI\r");
//!
//! let mut raw = String::from("AT+CGMI\r\r\n+CMTI: \"SM\",3\r\n\r\nNokia\r\n\r\nOK\r\n");
//! let notifications = dispatch_unsolicited(&mut raw);
//! assert_eq!(
//!     notifications[0].indication,
//!     MessageIndication::MemoryLocation { storage: "SM".to_string(), index: 3 }
//! );
//!
//! let response = Response::parse_echoed(&raw, "AT+CGMI");
//! assert_eq!(response, Response::Ok("Nokia".to_string()));
//! ```

mod codec;
mod commands;
mod error;
mod responses;
mod unsolicited;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use unsolicited::*;
