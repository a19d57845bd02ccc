//! SMS-SUBMIT PDU encoding
//!
//! Builds the hex body written after `AT+CMGS=<length>` in PDU mode:
//!
//! ```text
//! 00        SMSC info length (use the SIM default)
//! 01        first octet: SMS-SUBMIT
//! 00        message reference (assigned by the modem)
//! 0A 81     recipient length in digits, type of address
//! 10 32 ..  recipient digits as swapped semi-octets
//! 00 00     protocol identifier, data coding scheme (GSM 7-bit)
//! 05 ..     user data length in septets, packed user data
//! ```

use std::fmt;
use thiserror::Error;

/// SMSC information length: use the SMSC stored on the SIM
pub const SMSC_DEFAULT: u8 = 0x00;
/// First octet of an SMS-SUBMIT without validity period
pub const SMS_SUBMIT: u8 = 0x01;
/// Message reference, filled in by the modem
pub const MESSAGE_REFERENCE: u8 = 0x00;
/// Type of address: unknown numbering, ISDN plan
pub const TOA_UNKNOWN: u8 = 0x81;
/// Type of address: international numbering, ISDN plan
pub const TOA_INTERNATIONAL: u8 = 0x91;
/// Protocol identifier: plain short message
pub const PROTOCOL_ID: u8 = 0x00;
/// Data coding scheme: GSM 7-bit default alphabet
pub const DCS_GSM7: u8 = 0x00;
/// Longest single-part message, in septets
pub const MAX_SEPTETS: usize = 160;
/// Longest address, in digits
pub const MAX_ADDRESS_DIGITS: usize = 20;

/// PDU encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PduError {
    /// The phone number is empty, too long, or has non-digit characters
    #[error("Invalid phone number: {0:?}")]
    InvalidNumber(String),

    /// The text has a character outside the GSM default alphabet
    #[error("Character {0:?} is not in the GSM 7-bit alphabet")]
    UnsupportedCharacter(char),

    /// The text does not fit in a single message
    #[error("Message is {0} septets long, at most 160 fit in one SMS")]
    MessageTooLong(usize),
}

/// Encode decimal digits as swapped semi-octets
///
/// `"0123456789"` becomes `10 32 54 76 98`. An odd trailing digit is padded
/// with an `F` nibble: `"12345"` becomes `21 43 F5`.
pub fn semi_octets(digits: &str) -> Result<Vec<u8>, PduError> {
    let nibbles = digits
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or_else(|| PduError::InvalidNumber(digits.to_string()))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(nibbles
        .chunks(2)
        .map(|pair| {
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | pair[0]
        })
        .collect())
}

/// Destination address field: digit count, type of address, semi-octets
fn encode_address(number: &str) -> Result<Vec<u8>, PduError> {
    let (toa, digits) = match number.strip_prefix('+') {
        Some(rest) => (TOA_INTERNATIONAL, rest),
        None => (TOA_UNKNOWN, number),
    };
    if digits.is_empty() || digits.len() > MAX_ADDRESS_DIGITS {
        return Err(PduError::InvalidNumber(number.to_string()));
    }

    let mut field = Vec::with_capacity(2 + digits.len().div_ceil(2));
    field.push(digits.len() as u8);
    field.push(toa);
    field.extend(semi_octets(digits)?);
    Ok(field)
}

/// GSM default alphabet code of `c`, for the characters it shares with Latin-1
fn gsm7_code(c: char) -> Option<u8> {
    let code = match c {
        '@' => 0x00,
        '£' => 0x01,
        '$' => 0x02,
        '¥' => 0x03,
        'è' => 0x04,
        'é' => 0x05,
        'ù' => 0x06,
        'ì' => 0x07,
        'ò' => 0x08,
        'Ç' => 0x09,
        '\n' => 0x0A,
        'Ø' => 0x0B,
        'ø' => 0x0C,
        '\r' => 0x0D,
        'Å' => 0x0E,
        'å' => 0x0F,
        '_' => 0x11,
        'Æ' => 0x1C,
        'æ' => 0x1D,
        'ß' => 0x1E,
        'É' => 0x1F,
        '¤' => 0x24,
        '¡' => 0x40,
        'Ä' => 0x5B,
        'Ö' => 0x5C,
        'Ñ' => 0x5D,
        'Ü' => 0x5E,
        '§' => 0x5F,
        '¿' => 0x60,
        'ä' => 0x7B,
        'ö' => 0x7C,
        'ñ' => 0x7D,
        'ü' => 0x7E,
        'à' => 0x7F,
        ' '..='#' | '%'..='?' | 'A'..='Z' | 'a'..='z' => c as u8,
        _ => return None,
    };
    Some(code)
}

/// Map `text` to GSM default alphabet septets
pub fn encode_gsm7(text: &str) -> Result<Vec<u8>, PduError> {
    let septets = text
        .chars()
        .map(|c| gsm7_code(c).ok_or(PduError::UnsupportedCharacter(c)))
        .collect::<Result<Vec<u8>, _>>()?;
    if septets.len() > MAX_SEPTETS {
        return Err(PduError::MessageTooLong(septets.len()));
    }
    Ok(septets)
}

/// Pack 7-bit septets into octets, least significant bits first
pub fn pack_septets(septets: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity((septets.len() * 7).div_ceil(8));
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &septet in septets {
        acc |= u32::from(septet & 0x7F) << bits;
        bits += 7;
        while bits >= 8 {
            packed.push((acc & 0xFF) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        packed.push((acc & 0xFF) as u8);
    }
    packed
}

/// Encode and pack `text`: `"hello"` becomes `E8 32 9B FD 06`
pub fn pack_gsm7(text: &str) -> Result<Vec<u8>, PduError> {
    Ok(pack_septets(&encode_gsm7(text)?))
}

/// An SMS-SUBMIT PDU, built once per send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    octets: Vec<u8>,
}

impl Pdu {
    /// Build a single-part GSM 7-bit message for `number`
    pub fn submit(number: &str, text: &str) -> Result<Self, PduError> {
        let septets = encode_gsm7(text)?;

        let mut octets = vec![SMSC_DEFAULT, SMS_SUBMIT, MESSAGE_REFERENCE];
        octets.extend(encode_address(number)?);
        octets.push(PROTOCOL_ID);
        octets.push(DCS_GSM7);
        octets.push(septets.len() as u8);
        octets.extend(pack_septets(&septets));

        Ok(Self { octets })
    }

    /// Raw PDU octets, SMSC field included
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// TPDU length in octets: the `AT+CMGS=` argument
    ///
    /// Counts everything after the one-octet SMSC field.
    pub fn tpdu_length(&self) -> usize {
        self.octets.len().saturating_sub(1)
    }

    /// Upper-case hex body written after the prompt
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.octets)
    }
}

impl fmt::Display for Pdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
