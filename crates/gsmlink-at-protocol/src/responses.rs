//! Response classification.
//!
//! Every raw response is classified, in order, as:
//! - `OK` → success, payload is the text with echo and terminator removed
//! - `ERROR` → generic failure
//! - `+CMS ERROR: <n>` → message service error
//! - `+CME ERROR: <n>` → mobile equipment error
//! - nothing at all → timeout
//! - anything else → unexpected response

use std::sync::LazyLock;

use regex::Regex;

use crate::codec::{
    strip_echo, strip_ok_terminator, trim_line_breaks, ERROR_TERMINATOR, OK_TERMINATOR,
};
use crate::error::{AtError, AtResult};

static CMS_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n\+CMS ERROR: (\d+)\r\n").expect("CMS error regex is valid"));

static CME_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n\+CME ERROR: (\d+)\r\n").expect("CME error regex is valid"));

/// Classified response from the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command succeeded. Echo, terminator and surrounding line breaks are
    /// stripped from the payload.
    Ok(String),

    /// Bare `ERROR`.
    Error,

    /// `+CMS ERROR: <code>`.
    ServiceError(u32),

    /// `+CME ERROR: <code>`.
    EquipmentError(u32),

    /// No text arrived.
    Empty,

    /// Text matching none of the known shapes.
    Unknown(String),
}

impl Response {
    /// Classify a raw response that carries no command echo.
    pub fn parse(text: &str) -> Response {
        Self::parse_echoed(text, "")
    }

    /// Classify a raw response, stripping the echo of `command` if present.
    pub fn parse_echoed(text: &str, command: &str) -> Response {
        if text.contains(OK_TERMINATOR) {
            let payload = strip_ok_terminator(strip_echo(text, command));
            return Response::Ok(trim_line_breaks(payload).to_string());
        }

        if text.contains(ERROR_TERMINATOR) {
            return Response::Error;
        }

        if let Some(code) = capture_code(&CMS_ERROR, text) {
            return Response::ServiceError(code);
        }

        if let Some(code) = capture_code(&CME_ERROR, text) {
            return Response::EquipmentError(code);
        }

        if text.is_empty() {
            return Response::Empty;
        }

        Response::Unknown(text.to_string())
    }

    /// Check if this is a successful response.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Check if this is any kind of error, including timeouts.
    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    /// Convert into the payload or the matching typed error.
    pub fn into_result(self) -> AtResult<String> {
        match self {
            Response::Ok(payload) => Ok(payload),
            Response::Error => Err(AtError::GenericProtocol),
            Response::ServiceError(code) => Err(AtError::MessageService { code }),
            Response::EquipmentError(code) => Err(AtError::Equipment { code }),
            Response::Empty => Err(AtError::Timeout),
            Response::Unknown(raw) => Err(AtError::UnexpectedResponse { raw }),
        }
    }
}

fn capture_code(pattern: &Regex, text: &str) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Whether `text` already holds a final result code of any kind.
pub fn is_final_response(text: &str) -> bool {
    text.contains(OK_TERMINATOR)
        || text.contains(ERROR_TERMINATOR)
        || CMS_ERROR.is_match(text)
        || CME_ERROR.is_match(text)
}

/// Strip a `<prefix>: ` label from a single-line payload.
fn strip_label<'a>(payload: &'a str, label: &str) -> AtResult<&'a str> {
    payload
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(label))
        .map(str::trim)
        .ok_or_else(|| AtError::ParseError(format!("missing {} in {:?}", label, payload)))
}

/// Signal quality parsed from a `+CSQ` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// Received signal strength indicator (0-31, 99 = unknown).
    pub rssi: u8,
    /// Bit error rate (0-7, 99 = unknown).
    pub ber: u8,
}

impl SignalQuality {
    /// Parse from a success payload like `+CSQ: 20,99`.
    pub fn parse(payload: &str) -> AtResult<SignalQuality> {
        let value = strip_label(payload, "+CSQ:")?;
        let (rssi, ber) = value
            .split_once(',')
            .ok_or_else(|| AtError::ParseError(format!("expected rssi,ber: {}", value)))?;
        let rssi = rssi
            .trim()
            .parse()
            .map_err(|_| AtError::ParseError(format!("invalid rssi: {}", rssi)))?;
        let ber = ber
            .trim()
            .parse()
            .map_err(|_| AtError::ParseError(format!("invalid ber: {}", ber)))?;
        Ok(SignalQuality { rssi, ber })
    }

    /// Approximate signal strength in dBm, if known.
    pub fn rssi_dbm(&self) -> Option<i32> {
        match self.rssi {
            0..=31 => Some(-113 + 2 * i32::from(self.rssi)),
            _ => None,
        }
    }
}

/// Parse the message reference from a `+CMGS: <mr>` success payload.
pub fn parse_message_reference(payload: &str) -> AtResult<u8> {
    let value = strip_label(payload, "+CMGS:")?;
    value
        .parse()
        .map_err(|_| AtError::ParseError(format!("invalid message reference: {}", value)))
}

/// A stored message read back with `+CMGR` in PDU mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessagePdu {
    /// Message status (0 = received unread, 1 = received read, ...).
    pub status: u8,
    /// TPDU length in octets, as declared by the phone.
    pub length: u32,
    /// PDU as hex digits.
    pub pdu_hex: String,
}

impl StoredMessagePdu {
    /// Parse from a success payload like `+CMGR: 1,,24\r\n0791...`.
    pub fn parse(payload: &str) -> AtResult<StoredMessagePdu> {
        let header = strip_label(payload, "+CMGR:")?;
        let fields: Vec<&str> = header.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            return Err(AtError::ParseError(format!("short +CMGR header: {}", header)));
        }
        let status = fields[0]
            .parse()
            .map_err(|_| AtError::ParseError(format!("invalid status: {}", fields[0])))?;
        let length_field = fields[fields.len() - 1];
        let length = length_field
            .parse()
            .map_err(|_| AtError::ParseError(format!("invalid length: {}", length_field)))?;
        let pdu_hex = payload
            .lines()
            .map(str::trim)
            .skip_while(|line| !line.starts_with("+CMGR:"))
            .nth(1)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| AtError::ParseError("missing PDU line".to_string()))?
            .to_string();
        Ok(StoredMessagePdu {
            status,
            length,
            pdu_hex,
        })
    }
}
