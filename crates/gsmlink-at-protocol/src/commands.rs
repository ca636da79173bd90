//! Commands that can be sent to the phone.
//!
//! Only the handful of commands the session layer issues itself are modelled;
//! anything else goes through [`Command::Raw`].

use crate::codec::encode_command;

/// Message format selected with `AT+CMGF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Messages are exchanged as hex-encoded PDUs.
    Pdu,
    /// Messages are exchanged as text.
    Text,
}

impl MessageFormat {
    fn as_digit(&self) -> u8 {
        match self {
            MessageFormat::Pdu => 0,
            MessageFormat::Text => 1,
        }
    }
}

/// Settings for `AT+CNMI` (new message indications to the host).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicationSettings {
    /// Buffering mode for unsolicited result codes.
    pub mode: u8,
    /// How new messages are announced (1 = `+CMTI`, 2 = `+CMT`).
    pub deliver: u8,
    /// Cell broadcast routing.
    pub broadcast: u8,
    /// How status reports are announced (1 = `+CDS`, 2 = `+CDSI`).
    pub status_report: u8,
    /// Buffer flush behaviour when the mode is re-enabled.
    pub buffer: u8,
}

impl Default for IndicationSettings {
    /// Store new messages and announce them with `+CMTI`; route status
    /// reports inline with `+CDS`.
    fn default() -> Self {
        IndicationSettings {
            mode: 2,
            deliver: 1,
            broadcast: 0,
            status_report: 1,
            buffer: 0,
        }
    }
}

/// Commands understood by GSM phones and modems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AT`: attention, the cheapest possible round trip.
    Attention,

    /// `ATE0` / `ATE1`: command echo off or on.
    Echo {
        /// Whether the phone should echo commands.
        enabled: bool,
    },

    /// `AT+CMGF=<n>`: select message format.
    SelectMessageFormat(MessageFormat),

    /// `AT+CNMI=...`: configure new message indications.
    NewMessageIndications(IndicationSettings),

    /// `AT+CGMI`: manufacturer identification.
    Manufacturer,

    /// `AT+CGMM`: model identification.
    Model,

    /// `AT+CGMR`: revision identification.
    Revision,

    /// `AT+CGSN`: serial number (IMEI).
    SerialNumber,

    /// `AT+CSQ`: signal quality.
    SignalQuality,

    /// `AT+CMGS=<length>`: send a PDU of `length` TPDU octets. The phone
    /// answers with a `> ` prompt and waits for the PDU.
    SendMessage {
        /// TPDU length in octets (SMSC information excluded).
        length: u32,
    },

    /// `AT+CMGR=<index>`: read a stored message.
    ReadMessage {
        /// Storage index.
        index: u32,
    },

    /// `AT+CMGD=<index>`: delete a stored message.
    DeleteMessage {
        /// Storage index.
        index: u32,
    },

    /// Any other command line.
    Raw {
        /// The raw command text, without terminator.
        command: String,
    },
}

impl Command {
    /// Encode the command as a line to send to the phone.
    /// Returns the bytes to send (including the `\r` terminator).
    pub fn encode(&self) -> Vec<u8> {
        encode_command(&self.to_command_string())
    }

    /// Get the command string without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Attention => "AT".to_string(),
            Command::Echo { enabled } => format!("ATE{}", u8::from(*enabled)),
            Command::SelectMessageFormat(format) => format!("AT+CMGF={}", format.as_digit()),
            Command::NewMessageIndications(s) => format!(
                "AT+CNMI={},{},{},{},{}",
                s.mode, s.deliver, s.broadcast, s.status_report, s.buffer
            ),
            Command::Manufacturer => "AT+CGMI".to_string(),
            Command::Model => "AT+CGMM".to_string(),
            Command::Revision => "AT+CGMR".to_string(),
            Command::SerialNumber => "AT+CGSN".to_string(),
            Command::SignalQuality => "AT+CSQ".to_string(),
            Command::SendMessage { length } => format!("AT+CMGS={}", length),
            Command::ReadMessage { index } => format!("AT+CMGR={}", index),
            Command::DeleteMessage { index } => format!("AT+CMGD={}", index),
            Command::Raw { command } => command.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_attention() {
        assert_eq!(Command::Attention.encode(), b"AT\r");
    }

    #[test]
    fn test_encode_echo() {
        assert_eq!(Command::Echo { enabled: false }.to_command_string(), "ATE0");
        assert_eq!(Command::Echo { enabled: true }.to_command_string(), "ATE1");
    }

    #[test]
    fn test_encode_indications() {
        let cmd = Command::NewMessageIndications(IndicationSettings::default());
        assert_eq!(cmd.encode(), b"AT+CNMI=2,1,0,1,0\r");
    }

    #[test]
    fn test_encode_send_message() {
        let cmd = Command::SendMessage { length: 24 };
        assert_eq!(cmd.to_command_string(), "AT+CMGS=24");
    }

    #[test]
    fn test_encode_message_format() {
        assert_eq!(
            Command::SelectMessageFormat(MessageFormat::Pdu).encode(),
            b"AT+CMGF=0\r"
        );
    }
}
