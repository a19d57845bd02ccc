//! Core module containing the main functionality of modemchat
//!
//! This module provides:
//! - Transport layer (serial binding, generic byte streams)
//! - AT protocol engine (formatting, line reading, answer parsing, PDU encoding)
//! - Modem session with state machine
//! - Device power/reset control and vendor reset sequences
//! - GSM check suite
//! - Transcript logger with timestamps

pub mod device;
pub mod logger;
pub mod protocol;
pub mod session;
pub mod suite;
pub mod transport;
