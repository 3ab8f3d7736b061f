//! RADIUS Protocol Codec
//!
//! Packet and attribute (de)serialization for the parts of RFC 2865 (access),
//! RFC 2866 (accounting), RFC 3162 (IPv6 framing) and RFC 5176 (CoA and
//! Disconnect) that an AAA server needs.
//!
//! # Features
//!
//! - Packet encoding and decoding
//! - Request/Response Authenticator calculation and verification
//! - MD5-based User-Password hiding
//! - Acct-Status-Type decoding
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{Attribute, AttributeType, Code, Packet};
//! use radius_proto::auth::{calculate_accounting_request_authenticator, verify_accounting_request_authenticator};
//!
//! let mut packet = Packet::new(Code::AccountingRequest, 1, [0u8; 16]);
//! packet.add_attribute(Attribute::integer(AttributeType::AcctStatusType as u8, 1).unwrap());
//! packet.add_attribute(Attribute::string(AttributeType::AcctSessionId as u8, "sess-1").unwrap());
//! packet.authenticator = calculate_accounting_request_authenticator(&packet, b"secret");
//!
//! let bytes = packet.encode().unwrap();
//! let decoded = Packet::decode(&bytes).unwrap();
//! assert!(verify_accounting_request_authenticator(&decoded, b"secret"));
//! ```

pub mod accounting;
pub mod attributes;
pub mod auth;
pub mod packet;

pub use accounting::{AccountingError, AcctStatusType};
pub use attributes::{Attribute, AttributeType};
pub use auth::{
    calculate_accounting_request_authenticator, calculate_response_authenticator,
    decrypt_user_password, encrypt_user_password, generate_request_authenticator,
    verify_accounting_request_authenticator, verify_response_authenticator,
};
pub use packet::{Code, Packet, PacketError};
