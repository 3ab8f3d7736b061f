//! RADIUS Accounting status types (RFC 2866)
//!
//! - **Start**: session has started
//! - **Stop**: session has ended
//! - **Interim-Update**: periodic heartbeat during an active session
//! - **Accounting-On / Accounting-Off**: NAS is starting up / shutting down
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{AcctStatusType, Attribute, AttributeType, Code, Packet};
//!
//! let mut packet = Packet::new(Code::AccountingRequest, 1, [0u8; 16]);
//! packet.add_attribute(Attribute::integer(AttributeType::AcctStatusType as u8, 3).unwrap());
//!
//! assert_eq!(AcctStatusType::from_packet(&packet), Ok(AcctStatusType::InterimUpdate));
//! ```

use crate::attributes::AttributeType;
use crate::packet::Packet;
use thiserror::Error;

/// Acct-Status-Type values (RFC 2866 Section 5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AcctStatusType {
    Start = 1,
    Stop = 2,
    InterimUpdate = 3,
    AccountingOn = 7,
    AccountingOff = 8,
}

impl AcctStatusType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(AcctStatusType::Start),
            2 => Some(AcctStatusType::Stop),
            3 => Some(AcctStatusType::InterimUpdate),
            7 => Some(AcctStatusType::AccountingOn),
            8 => Some(AcctStatusType::AccountingOff),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Read the Acct-Status-Type attribute of an Accounting-Request
    pub fn from_packet(packet: &Packet) -> Result<Self, AccountingError> {
        let attr = packet
            .find_attribute(AttributeType::AcctStatusType as u8)
            .ok_or(AccountingError::MissingAttribute("Acct-Status-Type"))?;
        let value = attr
            .as_integer()
            .map_err(|e| AccountingError::InvalidAttributeValue {
                attribute: "Acct-Status-Type",
                reason: e.to_string(),
            })?;
        Self::from_u32(value).ok_or(AccountingError::InvalidStatusType(value))
    }

    /// Session lifecycle statuses (Start, Stop, Interim-Update)
    pub fn is_session_status(self) -> bool {
        matches!(
            self,
            AcctStatusType::Start | AcctStatusType::Stop | AcctStatusType::InterimUpdate
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            AcctStatusType::Start => "Start",
            AcctStatusType::Stop => "Stop",
            AcctStatusType::InterimUpdate => "Interim-Update",
            AcctStatusType::AccountingOn => "Accounting-On",
            AcctStatusType::AccountingOff => "Accounting-Off",
        }
    }
}

impl std::fmt::Display for AcctStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Accounting-related decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountingError {
    #[error("Missing required attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid attribute value for {attribute}: {reason}")]
    InvalidAttributeValue {
        attribute: &'static str,
        reason: String,
    },

    #[error("Invalid Acct-Status-Type value: {0}")]
    InvalidStatusType(u32),
}
