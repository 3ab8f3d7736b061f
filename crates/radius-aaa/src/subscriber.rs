//! Subscriber session records held in the cache

use crate::state::FieldMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Address family of a session's framed IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            IpVersion::V4 => "v4",
            IpVersion::V6 => "v6",
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v4" => Ok(IpVersion::V4),
            "v6" => Ok(IpVersion::V6),
            other => Err(format!("unknown IP version: {}", other)),
        }
    }
}

/// Who holds which IP right now. At most one record exists per IP since
/// the IP is the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberSession {
    pub subscriber_id: String,
    pub ip: String,
    pub ip_version: Option<IpVersion>,
    pub session_id: String,
    /// Unix seconds
    pub last_updated_time: i64,
}

impl SubscriberSession {
    pub const KEY_PREFIX: &'static str = "subscriber:";

    pub fn key_for(ip: &str) -> String {
        format!("{}{}", Self::KEY_PREFIX, ip)
    }

    pub fn cache_key(&self) -> String {
        Self::key_for(&self.ip)
    }

    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("subscriber_id".to_string(), self.subscriber_id.clone());
        fields.insert("ip".to_string(), self.ip.clone());
        fields.insert(
            "ip_version".to_string(),
            self.ip_version
                .map(|v| v.as_str().to_string())
                .unwrap_or_default(),
        );
        fields.insert("session_id".to_string(), self.session_id.clone());
        fields.insert(
            "last_updated_time".to_string(),
            self.last_updated_time.to_string(),
        );
        fields
    }

    /// Missing fields decode as empty; an unparseable timestamp as zero
    pub fn from_fields(fields: &FieldMap) -> Self {
        let text = |key: &str| fields.get(key).cloned().unwrap_or_default();
        SubscriberSession {
            subscriber_id: text("subscriber_id"),
            ip: text("ip"),
            ip_version: fields.get("ip_version").and_then(|v| v.parse().ok()),
            session_id: text("session_id"),
            last_updated_time: fields
                .get("last_updated_time")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}
