//! Unsolicited message notifications.
//!
//! A phone configured with `AT+CNMI` announces new messages and status
//! reports on its own, either as a pointer into message storage
//! (`+CMTI`, `+CDSI`) or with the whole PDU inline (`+CMT`, `+CDS`). These
//! lines can arrive spliced before, after or in the middle of an ordinary
//! command response, so every chunk of inbound text is run through
//! [`dispatch_unsolicited`] before it is treated as response data.
//!
//! Each [`UnsolicitedKind`] answers three questions about a buffer:
//! - [`is_start`](UnsolicitedKind::is_start): does a notification of this kind
//!   seem to begin here (possibly incomplete)?
//! - [`is_complete`](UnsolicitedKind::is_complete): has enough text arrived to
//!   extract it safely?
//! - [`extract`](UnsolicitedKind::extract): remove it from the buffer and
//!   return what it said.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static MESSAGE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\r\n)?\+CMTI: "(\w+)",(\d+)\r\n"#).expect("+CMTI regex is valid")
});

static STATUS_REPORT_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\r\n)?\+CDSI: "(\w+)",(\d+)\r\n"#).expect("+CDSI regex is valid")
});

static MESSAGE_PDU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\r\n)?\+CMT: ("[^"\r\n]*"|[^,\r\n]*),(\d+)\r\n([0-9A-Fa-f]*)(?:\r\n)?"#)
        .expect("+CMT regex is valid")
});

static STATUS_REPORT_PDU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\r\n)?\+CDS: (\d+)\r\n([0-9A-Fa-f]*)(?:\r\n)?").expect("+CDS regex is valid")
});

/// The known notification shapes, in matching order.
pub const CATALOG: [UnsolicitedKind; 4] = [
    UnsolicitedKind::MessageLocation,
    UnsolicitedKind::MessagePdu,
    UnsolicitedKind::StatusReportLocation,
    UnsolicitedKind::StatusReportPdu,
];

/// Number of hex digits an inline PDU notification is expected to carry.
///
/// `declared_length` is the TPDU length from the notification header (it
/// excludes the SMSC information), `first_octet` is the first byte of the hex
/// payload, i.e. the length of the SMSC information that precedes the TPDU.
/// The result is `2 * declared_length + 2 * first_octet + 2`.
///
/// This is a heuristic, not a PDU parse. It matches how phones actually
/// deliver these notifications but may under- or over-estimate for unusual
/// address encodings, so treat a `true` completeness answer as best-effort.
pub fn expected_pdu_hex_len(declared_length: u32, first_octet: u8) -> usize {
    2 * declared_length as usize + 2 * first_octet as usize + 2
}

/// What a notification told us about an incoming message or status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageIndication {
    /// The message was stored on the phone.
    MemoryLocation {
        /// Storage name (`SM`, `ME`, ...).
        storage: String,
        /// Index within that storage.
        index: u32,
    },

    /// The message was delivered inline as a PDU.
    RawShortMessage {
        /// Alphanumeric hint from the header (often empty).
        alphabet_hint: String,
        /// TPDU length in octets, as declared in the header.
        declared_length: u32,
        /// The PDU as hex digits, SMSC information included.
        pdu_hex: String,
    },
}

impl MessageIndication {
    /// Decode the inline PDU, if this indication carries one.
    pub fn pdu_bytes(&self) -> Option<Vec<u8>> {
        match self {
            MessageIndication::RawShortMessage { pdu_hex, .. } => hex::decode(pdu_hex).ok(),
            MessageIndication::MemoryLocation { .. } => None,
        }
    }
}

/// A notification removed from the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsolicitedNotification {
    /// Which shape matched.
    pub kind: UnsolicitedKind,
    /// The extracted content.
    pub indication: MessageIndication,
    /// Human-readable summary for logs.
    pub description: String,
}

/// Known unsolicited notification shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsolicitedKind {
    /// `+CMTI: "<mem>",<index>`: new message stored.
    MessageLocation,
    /// `+CMT: [<alpha>],<length>` followed by the PDU line.
    MessagePdu,
    /// `+CDSI: "<mem>",<index>`: status report stored.
    StatusReportLocation,
    /// `+CDS: <length>` followed by the PDU line.
    StatusReportPdu,
}

impl UnsolicitedKind {
    /// The label that starts this notification on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            UnsolicitedKind::MessageLocation => "+CMTI: ",
            UnsolicitedKind::MessagePdu => "+CMT: ",
            UnsolicitedKind::StatusReportLocation => "+CDSI: ",
            UnsolicitedKind::StatusReportPdu => "+CDS: ",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            UnsolicitedKind::MessageLocation => &MESSAGE_LOCATION,
            UnsolicitedKind::MessagePdu => &MESSAGE_PDU,
            UnsolicitedKind::StatusReportLocation => &STATUS_REPORT_LOCATION,
            UnsolicitedKind::StatusReportPdu => &STATUS_REPORT_PDU,
        }
    }

    /// Whether a notification of this kind appears to begin in `buffer`.
    pub fn is_start(&self, buffer: &str) -> bool {
        buffer.contains(self.label())
    }

    /// Whether enough of the notification has arrived to extract it.
    pub fn is_complete(&self, buffer: &str) -> bool {
        self.pattern()
            .captures(buffer)
            .is_some_and(|caps| self.captures_complete(&caps))
    }

    /// Whether any notification of this kind in `buffer` is still incomplete.
    ///
    /// Every occurrence of the label is checked on its own, so a complete
    /// notification earlier in the buffer does not hide a truncated one
    /// after it.
    pub fn has_pending(&self, buffer: &str) -> bool {
        buffer
            .match_indices(self.label())
            .any(|(offset, _)| !self.is_complete_at(buffer, offset))
    }

    fn is_complete_at(&self, buffer: &str, offset: usize) -> bool {
        let Some(caps) = self.pattern().captures(&buffer[offset..]) else {
            return false;
        };
        // A match further on belongs to a later occurrence.
        caps.get(0).is_some_and(|m| m.start() == 0) && self.captures_complete(&caps)
    }

    fn captures_complete(&self, caps: &Captures<'_>) -> bool {
        match self {
            UnsolicitedKind::MessageLocation | UnsolicitedKind::StatusReportLocation => true,
            UnsolicitedKind::MessagePdu | UnsolicitedKind::StatusReportPdu => {
                let (declared, hex) = self.pdu_fields(caps);
                pdu_is_complete(declared, hex)
            }
        }
    }

    /// Remove the first complete notification of this kind from `buffer`.
    pub fn extract(&self, buffer: &mut String) -> Option<UnsolicitedNotification> {
        if !self.is_complete(buffer.as_str()) {
            return None;
        }
        let caps = self.pattern().captures(buffer.as_str())?;
        let span = caps.get(0)?.range();

        let indication = match self {
            UnsolicitedKind::MessageLocation | UnsolicitedKind::StatusReportLocation => {
                let storage = caps[1].to_string();
                let index = caps[2].parse().ok()?;
                MessageIndication::MemoryLocation { storage, index }
            }
            UnsolicitedKind::MessagePdu => {
                let (declared, hex) = self.pdu_fields(&caps);
                MessageIndication::RawShortMessage {
                    alphabet_hint: caps[1].trim_matches('"').to_string(),
                    declared_length: declared?,
                    pdu_hex: hex.to_string(),
                }
            }
            UnsolicitedKind::StatusReportPdu => {
                let (declared, hex) = self.pdu_fields(&caps);
                MessageIndication::RawShortMessage {
                    alphabet_hint: String::new(),
                    declared_length: declared?,
                    pdu_hex: hex.to_string(),
                }
            }
        };

        let description = self.describe(&indication);
        log::debug!("extracted unsolicited notification: {}", description);
        buffer.replace_range(span, "");

        Some(UnsolicitedNotification {
            kind: *self,
            indication,
            description,
        })
    }

    fn pdu_fields<'a>(&self, caps: &Captures<'a>) -> (Option<u32>, &'a str) {
        let (length, hex) = match self {
            UnsolicitedKind::MessagePdu => (caps.get(2), caps.get(3)),
            _ => (caps.get(1), caps.get(2)),
        };
        let declared = length.and_then(|m| m.as_str().parse().ok());
        (declared, hex.map(|m| m.as_str()).unwrap_or(""))
    }

    fn describe(&self, indication: &MessageIndication) -> String {
        match indication {
            MessageIndication::MemoryLocation { storage, index } => {
                format!("{} stored at {} index {}", self, storage, index)
            }
            MessageIndication::RawShortMessage {
                declared_length, ..
            } => format!("{} delivered inline ({} octets)", self, declared_length),
        }
    }
}

impl fmt::Display for UnsolicitedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsolicitedKind::MessageLocation | UnsolicitedKind::MessagePdu => {
                f.write_str("new message")
            }
            UnsolicitedKind::StatusReportLocation | UnsolicitedKind::StatusReportPdu => {
                f.write_str("status report")
            }
        }
    }
}

fn pdu_is_complete(declared: Option<u32>, hex: &str) -> bool {
    let Some(declared) = declared else {
        log::warn!("unsolicited PDU header with unparsable length");
        return false;
    };
    let Some(first_octet) = hex.get(..2).and_then(|h| hex::decode(h).ok()) else {
        return false;
    };
    hex.len() >= expected_pdu_hex_len(declared, first_octet[0])
}

/// Whether `buffer` holds the beginning of a notification that has not fully
/// arrived yet.
pub fn has_pending_partial(buffer: &str) -> bool {
    CATALOG.iter().any(|kind| kind.has_pending(buffer))
}

/// Remove every complete notification from `buffer`, in catalog order.
///
/// The first kind whose notification is complete is extracted, then the scan
/// starts over until nothing matches. What remains in `buffer` is ordinary
/// response text.
pub fn dispatch_unsolicited(buffer: &mut String) -> Vec<UnsolicitedNotification> {
    let mut extracted = Vec::new();
    while let Some(notification) = CATALOG.iter().find_map(|kind| kind.extract(buffer)) {
        extracted.push(notification);
    }
    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    // 07 = 7 octets of SMSC info, then a 24-octet TPDU: 2*24 + 2*7 + 2 = 64 digits.
    const SMS_DELIVER_PDU: &str =
        "07919471060040340409D0C8721E2F00007030111233440004C8329BFD060A0B";

    fn pdu_of_len(first_octet: u8, digits: usize) -> String {
        let mut pdu = format!("{:02X}", first_octet);
        while pdu.len() < digits {
            pdu.push('A');
        }
        pdu.truncate(digits);
        pdu
    }

    #[test]
    fn test_expected_len_formula() {
        assert_eq!(expected_pdu_hex_len(24, 7), 64);
        assert_eq!(expected_pdu_hex_len(0, 0), 2);
    }

    #[test]
    fn test_extract_memory_location() {
        let mut buffer = String::from("\r\n+CMTI: \"SM\",3\r\n");
        let found = dispatch_unsolicited(&mut buffer);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, UnsolicitedKind::MessageLocation);
        assert_eq!(
            found[0].indication,
            MessageIndication::MemoryLocation {
                storage: "SM".to_string(),
                index: 3
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_extract_status_report_location() {
        let mut buffer = String::from("\r\n+CDSI: \"SR\",12\r\n");
        let found = dispatch_unsolicited(&mut buffer);
        assert_eq!(found[0].kind, UnsolicitedKind::StatusReportLocation);
        assert!(found[0].description.contains("status report"));
    }

    #[test]
    fn test_location_spliced_into_response() {
        let mut buffer =
            String::from("AT+CPMS?\r\r\n+CPMS: 1,\r\n+CMTI: \"ME\",7\r\n10\r\n\r\nOK\r\n");
        let found = dispatch_unsolicited(&mut buffer);
        assert_eq!(found.len(), 1);
        assert_eq!(buffer, "AT+CPMS?\r\r\n+CPMS: 1,10\r\n\r\nOK\r\n");
    }

    #[test]
    fn test_incomplete_location_is_pending() {
        let buffer = "\r\n+CMTI: \"SM\",";
        assert!(UnsolicitedKind::MessageLocation.is_start(buffer));
        assert!(!UnsolicitedKind::MessageLocation.is_complete(buffer));
        assert!(has_pending_partial(buffer));
    }

    #[test]
    fn test_truncated_location_after_complete_one_is_pending() {
        let buffer = "\r\n+CMTI: \"SM\",1\r\n\r\n+CMTI: \"SM\",";
        assert!(UnsolicitedKind::MessageLocation.is_complete(buffer));
        assert!(UnsolicitedKind::MessageLocation.has_pending(buffer));
        assert!(has_pending_partial(buffer));

        let mut rest = buffer.to_string();
        assert_eq!(dispatch_unsolicited(&mut rest).len(), 1);
        assert_eq!(rest, "\r\n+CMTI: \"SM\",");
        assert!(has_pending_partial(&rest));
    }

    #[test]
    fn test_truncated_inline_message_after_complete_one_is_pending() {
        let total = expected_pdu_hex_len(5, 3);
        let buffer = format!(
            "\r\n+CMT: ,5\r\n{}\r\n\r\n+CMT: ,5\r\n{}",
            pdu_of_len(3, total),
            pdu_of_len(3, total - 4)
        );
        assert!(UnsolicitedKind::MessagePdu.is_complete(&buffer));
        assert!(has_pending_partial(&buffer));
    }

    #[test]
    fn test_all_complete_is_not_pending() {
        let buffer = "\r\n+CMTI: \"SM\",1\r\n\r\n+CMTI: \"SM\",2\r\n\r\nOK\r\n";
        assert!(!has_pending_partial(buffer));
    }

    #[test]
    fn test_cmt_label_does_not_match_cmti() {
        assert!(!UnsolicitedKind::MessagePdu.is_start("\r\n+CMTI: \"SM\",1\r\n"));
    }

    #[test]
    fn test_pdu_completeness_threshold() {
        let declared = 5;
        let first_octet = 3;
        let total = expected_pdu_hex_len(declared, first_octet);
        for digits in 0..total {
            let buffer = format!("\r\n+CMT: ,{}\r\n{}", declared, pdu_of_len(first_octet, digits));
            assert!(
                !UnsolicitedKind::MessagePdu.is_complete(&buffer),
                "{} of {} digits reported complete",
                digits,
                total
            );
            assert!(has_pending_partial(&buffer));
        }
        for digits in total..total + 3 {
            let buffer = format!("\r\n+CMT: ,{}\r\n{}", declared, pdu_of_len(first_octet, digits));
            assert!(UnsolicitedKind::MessagePdu.is_complete(&buffer));
        }
    }

    #[test]
    fn test_status_report_pdu_threshold() {
        let total = expected_pdu_hex_len(2, 0);
        let short = format!("\r\n+CDS: 2\r\n{}", pdu_of_len(0, total - 1));
        let full = format!("\r\n+CDS: 2\r\n{}\r\n", pdu_of_len(0, total));
        assert!(!UnsolicitedKind::StatusReportPdu.is_complete(&short));
        assert!(UnsolicitedKind::StatusReportPdu.is_complete(&full));
    }

    #[test]
    fn test_extract_inline_message() {
        let mut buffer = format!("\r\n+CMT: \"\",24\r\n{}\r\n\r\nOK\r\n", SMS_DELIVER_PDU);
        let found = dispatch_unsolicited(&mut buffer);
        assert_eq!(found.len(), 1);
        match &found[0].indication {
            MessageIndication::RawShortMessage {
                alphabet_hint,
                declared_length,
                pdu_hex,
            } => {
                assert_eq!(alphabet_hint, "");
                assert_eq!(*declared_length, 24);
                assert_eq!(pdu_hex, SMS_DELIVER_PDU);
            }
            other => panic!("expected inline message, got {:?}", other),
        }
        assert_eq!(found[0].indication.pdu_bytes().map(|b| b.len()), Some(32));
        assert_eq!(buffer, "\r\nOK\r\n");
    }

    #[test]
    fn test_dispatch_multiple_in_catalog_order() {
        let mut buffer = String::from(
            "\r\n+CDSI: \"SR\",1\r\n\r\n+CMTI: \"SM\",2\r\n\r\n+CMTI: \"SM\",3\r\n",
        );
        let found = dispatch_unsolicited(&mut buffer);
        let kinds: Vec<UnsolicitedKind> = found.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                UnsolicitedKind::MessageLocation,
                UnsolicitedKind::MessageLocation,
                UnsolicitedKind::StatusReportLocation,
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_plain_response_untouched() {
        let mut buffer = String::from("AT+CGMI\r\r\nSiemens\r\n\r\nOK\r\n");
        assert!(dispatch_unsolicited(&mut buffer).is_empty());
        assert!(!has_pending_partial(&buffer));
        assert_eq!(buffer, "AT+CGMI\r\r\nSiemens\r\n\r\nOK\r\n");
    }
}
