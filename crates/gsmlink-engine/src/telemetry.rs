//! Metric declarations.
//!
//! The engine only records; installing a recorder or exporter is left to the
//! application. Without one, every update is a no-op.

use metrics::{describe_counter, Unit};

/// A counter declaration with its metadata.
#[derive(Debug, Clone, Copy)]
pub struct CounterDef {
    /// Metric name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Unit,
}

impl CounterDef {
    const fn new(name: &'static str, description: &'static str, unit: Unit) -> Self {
        CounterDef {
            name,
            description,
            unit,
        }
    }

    /// Register this counter's description with the installed recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, self.unit, self.description);
    }

    /// Increment the counter.
    pub fn increment(&self, value: u64) {
        metrics::counter!(self.name).increment(value);
    }
}

/// Metric definitions.
pub mod metric_defs {
    use super::CounterDef;
    use metrics::Unit;

    /// Payloads written to the link on behalf of callers.
    pub const COMMANDS_SENT: CounterDef = CounterDef::new(
        "gsmlink.commands.sent",
        "Outbound requests written to the link",
        Unit::Count,
    );

    /// Bytes read from the link.
    pub const INBOUND_BYTES: CounterDef = CounterDef::new(
        "gsmlink.inbound.bytes",
        "Bytes read from the link",
        Unit::Bytes,
    );

    /// Unsolicited notifications extracted from the inbound stream.
    pub const UNSOLICITED_DISPATCHED: CounterDef = CounterDef::new(
        "gsmlink.unsolicited.dispatched",
        "Unsolicited notifications extracted and published",
        Unit::Count,
    );

    /// Liveness probes executed.
    pub const PROBES_RUN: CounterDef = CounterDef::new(
        "gsmlink.liveness.probes_run",
        "Liveness probes executed",
        Unit::Count,
    );

    /// Liveness probes skipped because a transaction held the session.
    pub const PROBES_SKIPPED: CounterDef = CounterDef::new(
        "gsmlink.liveness.probes_skipped",
        "Liveness probes skipped because the session was busy",
        Unit::Count,
    );

    /// Link reads that failed and were discarded.
    pub const READ_FAILURES: CounterDef = CounterDef::new(
        "gsmlink.inbound.read_failures",
        "Read cycles aborted by a link error",
        Unit::Count,
    );

    /// Every counter the engine records.
    pub const ALL: [CounterDef; 6] = [
        COMMANDS_SENT,
        INBOUND_BYTES,
        UNSOLICITED_DISPATCHED,
        PROBES_RUN,
        PROBES_SKIPPED,
        READ_FAILURES,
    ];
}

/// Describe every engine metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for def in metric_defs::ALL {
        def.describe();
    }
}
