use crate::packet::PacketError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// RADIUS Attribute structure as defined in RFC 2865 Section 5
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: u8,
    /// Attribute value (0-253 bytes)
    pub value: Vec<u8>,
}

impl Attribute {
    /// Type + length octets
    pub const MIN_LENGTH: usize = 2;
    pub const MAX_LENGTH: usize = 255;
    pub const MAX_VALUE_LENGTH: usize = 253;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > Self::MAX_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Attribute value too long: {} bytes (max {})",
                value.len(),
                Self::MAX_VALUE_LENGTH
            )));
        }
        Ok(Attribute { attr_type, value })
    }

    pub fn string(attr_type: u8, value: impl Into<String>) -> Result<Self, PacketError> {
        Self::new(attr_type, value.into().into_bytes())
    }

    /// 32-bit big-endian integer attribute
    pub fn integer(attr_type: u8, value: u32) -> Result<Self, PacketError> {
        Self::new(attr_type, value.to_be_bytes().to_vec())
    }

    pub fn ipv4(attr_type: u8, addr: Ipv4Addr) -> Result<Self, PacketError> {
        Self::new(attr_type, addr.octets().to_vec())
    }

    /// IPv6 prefix attribute (RFC 3162 Section 2.3): reserved octet, prefix
    /// length, then only the octets the prefix length covers.
    pub fn ipv6_prefix(attr_type: u8, addr: Ipv6Addr, prefix_len: u8) -> Result<Self, PacketError> {
        if prefix_len > 128 {
            return Err(PacketError::AttributeError(format!(
                "Invalid IPv6 prefix length: {}",
                prefix_len
            )));
        }
        let covered = (prefix_len as usize).div_ceil(8);
        let mut value = Vec::with_capacity(2 + covered);
        value.push(0);
        value.push(prefix_len);
        value.extend_from_slice(&addr.octets()[..covered]);
        Self::new(attr_type, value)
    }

    pub(crate) fn encode_into(&self, buffer: &mut Vec<u8>) -> Result<(), PacketError> {
        let length = self.encoded_length();
        if length > Self::MAX_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Encoded attribute too long: {} bytes",
                length
            )));
        }
        buffer.push(self.attr_type);
        buffer.push(length as u8);
        buffer.extend_from_slice(&self.value);
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut buffer = Vec::with_capacity(self.encoded_length());
        self.encode_into(&mut buffer)?;
        Ok(buffer)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::MIN_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Attribute data too short: {} bytes",
                data.len()
            )));
        }

        let attr_type = data[0];
        let length = data[1] as usize;

        if length < Self::MIN_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "Invalid attribute length: {}",
                length
            )));
        }
        if data.len() < length {
            return Err(PacketError::AttributeError(format!(
                "Insufficient data for attribute: expected {}, got {}",
                length,
                data.len()
            )));
        }

        Ok(Attribute {
            attr_type,
            value: data[Self::MIN_LENGTH..length].to_vec(),
        })
    }

    pub fn encoded_length(&self) -> usize {
        Self::MIN_LENGTH + self.value.len()
    }

    pub fn as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.value.clone())
    }

    pub fn as_integer(&self) -> Result<u32, PacketError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "Expected 4 bytes for integer, got {}",
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn as_ipv4(&self) -> Result<Ipv4Addr, PacketError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "Expected 4 bytes for IPv4, got {}",
                self.value.len()
            ))
        })?;
        Ok(Ipv4Addr::from(bytes))
    }

    /// Decode an RFC 3162 IPv6 prefix into (address, prefix length).
    /// Octets not covered by the prefix are zero.
    pub fn as_ipv6_prefix(&self) -> Result<(Ipv6Addr, u8), PacketError> {
        if self.value.len() < 2 || self.value.len() > 18 {
            return Err(PacketError::AttributeError(format!(
                "Invalid IPv6 prefix length: {} bytes",
                self.value.len()
            )));
        }
        let prefix_len = self.value[1];
        if prefix_len > 128 {
            return Err(PacketError::AttributeError(format!(
                "Invalid IPv6 prefix length: {}",
                prefix_len
            )));
        }
        let mut octets = [0u8; 16];
        let prefix = &self.value[2..];
        octets[..prefix.len()].copy_from_slice(prefix);
        Ok((Ipv6Addr::from(octets), prefix_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_attribute() {
        let attr = Attribute::string(1, "testuser").unwrap();
        assert_eq!(attr.attr_type, 1);
        assert_eq!(attr.as_string().unwrap(), "testuser");
    }

    #[test]
    fn test_integer_attribute() {
        let attr = Attribute::integer(40, 3).unwrap();
        assert_eq!(attr.as_integer().unwrap(), 3);
        assert!(Attribute::new(40, vec![0, 1]).unwrap().as_integer().is_err());
    }

    #[test]
    fn test_ipv4_attribute() {
        let attr = Attribute::ipv4(8, Ipv4Addr::new(10, 0, 0, 5)).unwrap();
        assert_eq!(attr.value, vec![10, 0, 0, 5]);
        assert_eq!(attr.as_ipv4().unwrap(), Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn test_ipv6_prefix_attribute() {
        let addr: Ipv6Addr = "2001:db8:1::".parse().unwrap();
        let attr = Attribute::ipv6_prefix(97, addr, 64).unwrap();
        assert_eq!(attr.value.len(), 10);

        let (decoded, len) = attr.as_ipv6_prefix().unwrap();
        assert_eq!(decoded, addr);
        assert_eq!(len, 64);
    }

    #[test]
    fn test_ipv6_prefix_rejects_bad_length() {
        let attr = Attribute::new(97, vec![0]).unwrap();
        assert!(attr.as_ipv6_prefix().is_err());
        assert!(Attribute::ipv6_prefix(97, Ipv6Addr::LOCALHOST, 129).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(Attribute::decode(&[1, 10, b'a']).is_err());
        assert!(Attribute::decode(&[1, 1]).is_err());
    }

    #[test]
    fn test_max_value_length() {
        let value = vec![0u8; 254];
        assert!(Attribute::new(1, value).is_err());
    }
}
