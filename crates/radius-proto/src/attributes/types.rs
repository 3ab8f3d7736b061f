/// RADIUS attribute types understood by the server
///
/// Covers the RFC 2865/2866 attributes used for access and accounting plus
/// the RFC 3162 IPv6 framing attributes. Any other attribute number can still
/// be read from a packet by its raw `u8` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// User-Password (2) - RFC 2865
    UserPassword = 2,
    /// NAS-IP-Address (4) - RFC 2865
    NasIpAddress = 4,
    /// NAS-Port (5) - RFC 2865
    NasPort = 5,
    /// Service-Type (6) - RFC 2865
    ServiceType = 6,
    /// Framed-IP-Address (8) - RFC 2865
    FramedIpAddress = 8,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// Class (25) - RFC 2865
    Class = 25,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout = 27,
    /// Called-Station-Id (30) - RFC 2865
    CalledStationId = 30,
    /// Calling-Station-Id (31) - RFC 2865
    CallingStationId = 31,
    /// NAS-Identifier (32) - RFC 2865
    NasIdentifier = 32,
    /// Proxy-State (33) - RFC 2865
    ProxyState = 33,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType = 40,
    /// Acct-Delay-Time (41) - RFC 2866
    AcctDelayTime = 41,
    /// Acct-Input-Octets (42) - RFC 2866
    AcctInputOctets = 42,
    /// Acct-Output-Octets (43) - RFC 2866
    AcctOutputOctets = 43,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId = 44,
    /// Acct-Session-Time (46) - RFC 2866
    AcctSessionTime = 46,
    /// Acct-Terminate-Cause (49) - RFC 2866
    AcctTerminateCause = 49,
    /// Acct-Multi-Session-Id (50) - RFC 2866
    AcctMultiSessionId = 50,
    /// Event-Timestamp (55) - RFC 2869
    EventTimestamp = 55,
    /// NAS-Port-Type (61) - RFC 2865
    NasPortType = 61,
    /// Message-Authenticator (80) - RFC 2869
    MessageAuthenticator = 80,
    /// NAS-IPv6-Address (95) - RFC 3162
    NasIpv6Address = 95,
    /// Framed-Interface-Id (96) - RFC 3162
    FramedInterfaceId = 96,
    /// Framed-IPv6-Prefix (97) - RFC 3162
    FramedIpv6Prefix = 97,
    /// Error-Cause (101) - RFC 5176
    ErrorCause = 101,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            2 => Some(AttributeType::UserPassword),
            4 => Some(AttributeType::NasIpAddress),
            5 => Some(AttributeType::NasPort),
            6 => Some(AttributeType::ServiceType),
            8 => Some(AttributeType::FramedIpAddress),
            18 => Some(AttributeType::ReplyMessage),
            25 => Some(AttributeType::Class),
            26 => Some(AttributeType::VendorSpecific),
            27 => Some(AttributeType::SessionTimeout),
            30 => Some(AttributeType::CalledStationId),
            31 => Some(AttributeType::CallingStationId),
            32 => Some(AttributeType::NasIdentifier),
            33 => Some(AttributeType::ProxyState),
            40 => Some(AttributeType::AcctStatusType),
            41 => Some(AttributeType::AcctDelayTime),
            42 => Some(AttributeType::AcctInputOctets),
            43 => Some(AttributeType::AcctOutputOctets),
            44 => Some(AttributeType::AcctSessionId),
            46 => Some(AttributeType::AcctSessionTime),
            49 => Some(AttributeType::AcctTerminateCause),
            50 => Some(AttributeType::AcctMultiSessionId),
            55 => Some(AttributeType::EventTimestamp),
            61 => Some(AttributeType::NasPortType),
            80 => Some(AttributeType::MessageAuthenticator),
            95 => Some(AttributeType::NasIpv6Address),
            96 => Some(AttributeType::FramedInterfaceId),
            97 => Some(AttributeType::FramedIpv6Prefix),
            101 => Some(AttributeType::ErrorCause),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
