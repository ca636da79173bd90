//! Phone operations built on the blocking call surface.

use std::sync::LazyLock;

use gsmlink_at_protocol::{
    parse_message_reference, Command, IndicationSettings, MessageFormat, SignalQuality,
    StoredMessagePdu, CTRL_Z,
};
use regex::Regex;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::session::Session;

static DATA_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"> ?$").expect("data prompt regex is valid"));

/// Identification strings reported by the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Answer to `AT+CGMI`.
    pub manufacturer: String,
    /// Answer to `AT+CGMM`.
    pub model: String,
    /// Firmware revision, from `AT+CGMR`.
    pub revision: String,
    /// IMEI.
    pub serial_number: String,
}

impl Session {
    fn exec(&self, command: &Command) -> EngineResult<String> {
        self.exec_and_receive_until_terminator(&command.to_command_string())
    }

    /// Round-trip a bare `AT`.
    pub fn ping(&self) -> EngineResult<()> {
        self.exec(&Command::Attention).map(|_| ())
    }

    /// Whether a phone answers right now.
    pub fn is_connected(&self) -> bool {
        self.ping().is_ok()
    }

    /// Fail with [`EngineError::NotConnected`] unless a phone answers.
    pub fn ensure_connected(&self) -> EngineResult<()> {
        self.ping().map_err(|e| {
            if e.is_timeout() {
                EngineError::NotConnected
            } else {
                e
            }
        })
    }

    /// Query manufacturer, model, revision and IMEI.
    pub fn identify(&self) -> EngineResult<DeviceIdentity> {
        let _token = self.shared.gate.enter();
        Ok(DeviceIdentity {
            manufacturer: self.exec(&Command::Manufacturer)?,
            model: self.exec(&Command::Model)?,
            revision: self.exec(&Command::Revision)?,
            serial_number: self.exec(&Command::SerialNumber)?,
        })
    }

    /// Query received signal strength and bit error rate.
    pub fn signal_quality(&self) -> EngineResult<SignalQuality> {
        let payload = self.exec(&Command::SignalQuality)?;
        Ok(SignalQuality::parse(&payload)?)
    }

    /// Switch between PDU and text mode (`AT+CMGF`).
    pub fn select_message_format(&self, format: MessageFormat) -> EngineResult<()> {
        self.exec(&Command::SelectMessageFormat(format)).map(|_| ())
    }

    /// Route new message and status report indications to the host.
    pub fn enable_message_indications(&self, settings: IndicationSettings) -> EngineResult<()> {
        self.exec(&Command::NewMessageIndications(settings)).map(|_| ())
    }

    /// Send a PDU-mode message and return its message reference.
    ///
    /// `tpdu_length` is the PDU length in octets excluding the SMSC part.
    /// The whole exchange (command, prompt, PDU, result) runs under raw
    /// access, so nothing interleaves between the prompt and the PDU.
    pub fn send_message_pdu(&self, pdu_hex: &str, tpdu_length: u32) -> EngineResult<u8> {
        let access = self.acquire_raw_access()?;

        let command = Command::SendMessage { length: tpdu_length }.to_command_string();
        let prompt = self.exec_and_receive_until_pattern(&command, &DATA_PROMPT)?;
        debug!(prompt = %prompt.escape_debug(), "Got data prompt");

        let data = format!("{}{}", pdu_hex, CTRL_Z);
        self.send(&data)?;
        let payload = self.receive_until_terminator(&data)?;
        let reference = parse_message_reference(&payload)?;

        self.release_raw_access(access);
        Ok(reference)
    }

    /// Read a stored message in PDU mode.
    pub fn read_message_pdu(&self, index: u32) -> EngineResult<StoredMessagePdu> {
        let payload = self.exec(&Command::ReadMessage { index })?;
        Ok(StoredMessagePdu::parse(&payload)?)
    }

    /// Delete the message stored at `index` in the current storage.
    pub fn delete_message(&self, index: u32) -> EngineResult<()> {
        self.exec(&Command::DeleteMessage { index }).map(|_| ())
    }
}
