//! GSM Link Engine
//!
//! A threaded engine for talking to a GSM phone or modem over its AT command
//! interface. One connection worker thread owns the link and interleaves
//! three kinds of traffic on it without corrupting any of them:
//!
//! - request/response transactions issued from any number of caller threads,
//!   serialized by a re-entrant session gate
//! - unsolicited notifications (`+CMTI`, `+CMT`, `+CDSI`, `+CDS`) that the
//!   phone may splice into any response; they are stripped out and published
//!   on an event channel
//! - a periodic liveness probe that only runs when no transaction holds the
//!   gate
//!
//! # Example
//!
//! ```rust,no_run
//! use gsmlink_engine::{EngineConfig, Session};
//!
//! let session = Session::open_tcp(EngineConfig::new("192.168.1.20:4001"))?;
//! let events = session.events();
//!
//! let identity = session.identify()?;
//! println!("{} {}", identity.manufacturer, identity.model);
//!
//! for notification in events.messages.try_iter() {
//!     println!("{}", notification.description);
//! }
//! session.close()?;
//! # Ok::<(), gsmlink_engine::EngineError>(())
//! ```

mod config;
mod error;
mod events;
mod facade;
mod gate;
mod liveness;
mod phone;
mod session;
mod telemetry;
mod worker;

pub mod transport;

pub use config::{
    EngineConfig, MAX_EMPTY_READS, MIN_LIVENESS_PERIOD_MS, PARTIAL_NOTIFICATION_RETRIES,
};
pub use error::{EngineError, EngineResult};
pub use events::{ConnectionTransition, EventReceivers, LogLevel, LogRecord, ReceiveProgress};
pub use gate::RawAccess;
pub use liveness::LivenessSnapshot;
pub use phone::DeviceIdentity;
pub use session::{LinkState, Session};
pub use telemetry::{describe_metrics, metric_defs, CounterDef};
pub use transport::{LinkSettings, TransportLink};

pub use gsmlink_at_protocol as protocol;
