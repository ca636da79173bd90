//! Wire framing helpers.
//!
//! Commands go out as plain text terminated with carriage return. Everything
//! coming back is accumulated as raw bytes during one read cycle and only then
//! turned into text, so a multi-byte sequence split across two reads is never
//! decoded half-way.

use bytes::BytesMut;

/// Terminates every command line.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Ends a PDU data block after the `> ` prompt.
pub const CTRL_Z: char = '\u{1a}';

/// Final result code of a successful command.
pub const OK_TERMINATOR: &str = "\r\nOK\r\n";

/// Final result code of a failed command without further detail.
pub const ERROR_TERMINATOR: &str = "\r\nERROR\r\n";

/// Label preceding a message service error code.
pub const CMS_ERROR_LABEL: &str = "+CMS ERROR: ";

/// Label preceding a mobile equipment error code.
pub const CME_ERROR_LABEL: &str = "+CME ERROR: ";

/// Prompt sent by the phone when it expects a data block.
pub const DATA_PROMPT: &str = "> ";

/// Initial accumulator capacity.
const INITIAL_CAPACITY: usize = 512;

/// Accumulates the bytes read from a link during one wake cycle.
#[derive(Debug)]
pub struct InboundAccumulator {
    buffer: BytesMut,
}

impl Default for InboundAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        InboundAccumulator {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current contents as text (lossy), without consuming them.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Take the contents as text, leaving the accumulator empty.
    pub fn take_text(&mut self) -> String {
        let data = self.buffer.split();
        String::from_utf8_lossy(&data).into_owned()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Encode a command line for transmission (appends `\r`).
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cmd.len() + 1);
    buf.extend_from_slice(cmd.as_bytes());
    buf.push(COMMAND_TERMINATOR);
    buf
}

/// Remove a leading command echo (`<cmd>\r`) if present.
pub fn strip_echo<'a>(text: &'a str, command: &str) -> &'a str {
    if command.is_empty() {
        return text;
    }
    match text.strip_prefix(command) {
        Some(rest) => rest.strip_prefix('\r').unwrap_or(rest),
        None => text,
    }
}

/// Remove the last `\r\nOK\r\n` terminator and everything after it.
pub fn strip_ok_terminator(text: &str) -> &str {
    match text.rfind(OK_TERMINATOR) {
        Some(pos) => &text[..pos],
        None => text,
    }
}

/// Trim leading and trailing line breaks.
pub fn trim_line_breaks(text: &str) -> &str {
    text.trim_matches(|c| c == '\r' || c == '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        assert_eq!(encode_command("AT+CGMI"), b"AT+CGMI\r");
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo("AT\r\r\nOK\r\n", "AT"), "\r\nOK\r\n");
        assert_eq!(strip_echo("\r\nOK\r\n", "AT"), "\r\nOK\r\n");
        assert_eq!(strip_echo("ATZ", ""), "ATZ");
    }

    #[test]
    fn test_strip_ok_terminator() {
        assert_eq!(strip_ok_terminator("\r\nNokia\r\n\r\nOK\r\n"), "\r\nNokia\r\n");
        assert_eq!(strip_ok_terminator("no terminator"), "no terminator");
    }

    #[test]
    fn test_accumulator_split_utf8() {
        let mut acc = InboundAccumulator::new();
        let text = "Grüße";
        let bytes = text.as_bytes();
        acc.push(&bytes[..3]);
        acc.push(&bytes[3..]);
        assert_eq!(acc.len(), bytes.len());
        assert_eq!(acc.take_text(), text);
        assert!(acc.is_empty());
    }
}
