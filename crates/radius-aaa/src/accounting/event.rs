use crate::error::AaaError;
use crate::resolver::ResolvedNas;
use crate::subscriber::IpVersion;
use radius_proto::{AcctStatusType, AttributeType, Packet};
use std::net::IpAddr;
use tracing::debug;

/// Identifiers and addressing pulled out of one Accounting-Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingEvent {
    pub status: AcctStatusType,
    pub subscriber_id: String,
    pub session_id: String,
    pub nas_ip: String,
    /// Empty when the packet carries no framed address
    pub framed_ip: String,
    pub ip_version: Option<IpVersion>,
    pub username: Option<String>,
}

impl AccountingEvent {
    /// Extract an event using the per-NAS AVP configuration.
    ///
    /// Subscriber id and session id are read from the attributes configured
    /// for `nas`: an unset or invalid AVP number is a configuration error, an
    /// absent or empty attribute is not-found.
    pub fn from_packet(
        status: AcctStatusType,
        packet: &Packet,
        nas: &ResolvedNas,
    ) -> Result<Self, AaaError> {
        let session_id = nas.avp.session_id.extract(packet, "session ID")?;
        let subscriber_id = nas.avp.subscriber_id.extract(packet, "subscriber ID")?;
        let (framed_ip, ip_version) = match framed_address(packet) {
            Some(addr) => (addr.to_string(), Some(IpVersion::of(&addr))),
            None => (String::new(), None),
        };
        let username = packet
            .find_attribute(AttributeType::UserName.as_u8())
            .and_then(|attr| attr.as_string().ok());

        Ok(AccountingEvent {
            status,
            subscriber_id,
            session_id,
            nas_ip: nas.ip_address.clone(),
            framed_ip,
            ip_version,
            username,
        })
    }
}

/// Framed-IP-Address, else the address part of Framed-IPv6-Prefix
fn framed_address(packet: &Packet) -> Option<IpAddr> {
    if let Some(attr) = packet.find_attribute(AttributeType::FramedIpAddress.as_u8()) {
        match attr.as_ipv4() {
            Ok(addr) => return Some(IpAddr::V4(addr)),
            Err(e) => debug!(error = %e, "Ignoring malformed Framed-IP-Address"),
        }
    }

    let attr = packet.find_attribute(AttributeType::FramedIpv6Prefix.as_u8())?;
    match attr.as_ipv6_prefix() {
        Ok((addr, _prefix_len)) => Some(IpAddr::V6(addr)),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed Framed-IPv6-Prefix");
            None
        }
    }
}
