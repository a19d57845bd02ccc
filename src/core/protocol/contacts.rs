//! Phonebook reply parsing (`+CPBR`)

use regex::Regex;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

const REGEX_COMP_ERROR: &str = "phonebook regex must compile";

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\((\d+)-(\d+)\),\d+,\d+").expect(REGEX_COMP_ERROR)
});

static CONTACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\d+),"(.+)",(\d+),"(.+)""#).expect(REGEX_COMP_ERROR)
});

/// Index range reported by `AT+CPBR=?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContactRange {
    /// First valid index
    pub min: u32,
    /// Last valid index (inclusive)
    pub max: u32,
}

impl ContactRange {
    /// Indices to query, in order
    pub fn indices(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

/// One phonebook entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Storage index
    pub index: u32,
    /// Phone number as stored
    pub number: String,
    /// Type of address (129 national, 145 international)
    pub number_type: u16,
    /// Display name
    pub name: String,
}

/// Parse `(<min>-<max>),<nlength>,<tlength>`
pub fn parse_contact_range(line: &str) -> Option<ContactRange> {
    let caps = RANGE_RE.captures(line)?;
    Some(ContactRange {
        min: caps[1].parse().ok()?,
        max: caps[2].parse().ok()?,
    })
}

/// Parse `<index>,"<number>",<type>,"<name>"`
pub fn parse_contact(line: &str) -> Option<Contact> {
    let caps = CONTACT_RE.captures(line)?;
    Some(Contact {
        index: caps[1].parse().ok()?,
        number: caps[2].to_string(),
        number_type: caps[3].parse().ok()?,
        name: caps[4].to_string(),
    })
}
