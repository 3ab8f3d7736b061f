//! NAS directory entries and their per-NAS AVP configuration

use crate::error::AaaError;
use crate::state::FieldMap;
use radius_proto::Packet;
use std::fmt;

/// Which attribute number carries an identifier, parsed once from the
/// textual value stored with the NAS record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AvpSetting {
    /// No attribute configured
    #[default]
    Unset,
    /// A valid RADIUS attribute number
    Attribute(u8),
    /// The stored value is not an attribute number (kept for diagnostics)
    Invalid(String),
}

impl AvpSetting {
    /// Parse a stored value; empty or missing values mean "not configured"
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => AvpSetting::Unset,
            Some(value) => match value.parse::<u8>() {
                Ok(number) if number > 0 => AvpSetting::Attribute(number),
                _ => AvpSetting::Invalid(value.to_string()),
            },
        }
    }

    /// Textual form written back to the cache
    pub fn as_stored(&self) -> Option<String> {
        match self {
            AvpSetting::Unset => None,
            AvpSetting::Attribute(number) => Some(number.to_string()),
            AvpSetting::Invalid(raw) => Some(raw.clone()),
        }
    }

    /// Read the configured attribute from `packet` as a string.
    ///
    /// `field` names the identifier in error messages.
    pub fn extract(&self, packet: &Packet, field: &str) -> Result<String, AaaError> {
        let number = match self {
            AvpSetting::Attribute(number) => *number,
            AvpSetting::Unset => {
                return Err(AaaError::Configuration(format!(
                    "{} AVP not configured",
                    field
                )));
            }
            AvpSetting::Invalid(raw) => {
                return Err(AaaError::Configuration(format!(
                    "invalid {} AVP number: {}",
                    field, raw
                )));
            }
        };

        let value = packet
            .find_attribute(number)
            .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
            .unwrap_or_default();
        if value.is_empty() {
            return Err(AaaError::NotFound(format!(
                "{} not found in packet for AVP {}",
                field, number
            )));
        }
        Ok(value)
    }
}

impl fmt::Display for AvpSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvpSetting::Unset => f.write_str("unset"),
            AvpSetting::Attribute(number) => write!(f, "{}", number),
            AvpSetting::Invalid(raw) => write!(f, "invalid({})", raw),
        }
    }
}

/// Attribute numbers carrying the subscriber id and session id for one NAS
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvpConfig {
    pub subscriber_id: AvpSetting,
    pub session_id: AvpSetting,
}

impl AvpConfig {
    pub fn new(subscriber_id: Option<&str>, session_id: Option<&str>) -> Self {
        Self {
            subscriber_id: AvpSetting::parse(subscriber_id),
            session_id: AvpSetting::parse(session_id),
        }
    }
}

/// A Network Access Server allowed to talk to us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasRecord {
    pub id: i64,
    pub name: Option<String>,
    /// Exact textual IP, used as the lookup key
    pub ip_address: String,
    pub secret: String,
    pub avp: AvpConfig,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub updated_at: i64,
}

impl NasRecord {
    /// Cache hash key prefix
    pub const KEY_PREFIX: &'static str = "radius_nas:";

    pub fn cache_key(&self) -> String {
        format!("{}{}", Self::KEY_PREFIX, self.id)
    }

    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("id".to_string(), self.id.to_string());
        fields.insert("ip_address".to_string(), self.ip_address.clone());
        fields.insert("secret".to_string(), self.secret.clone());
        fields.insert("created_at".to_string(), self.created_at.to_string());
        fields.insert("updated_at".to_string(), self.updated_at.to_string());
        if let Some(name) = &self.name {
            fields.insert("nas_name".to_string(), name.clone());
        }
        if let Some(value) = self.avp.subscriber_id.as_stored() {
            fields.insert("subscriber_id".to_string(), value);
        }
        if let Some(value) = self.avp.session_id.as_stored() {
            fields.insert("session_id".to_string(), value);
        }
        fields
    }

    /// Rebuild a record from a cached hash.
    ///
    /// Returns `None` when the identifying fields (`ip_address`, `secret`)
    /// are missing, so a half-written hash is treated as a cache miss.
    pub fn from_fields(fields: &FieldMap) -> Option<Self> {
        let ip_address = fields.get("ip_address")?.clone();
        let secret = fields.get("secret")?.clone();
        let number = |key: &str| {
            fields
                .get(key)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or_default()
        };

        Some(NasRecord {
            id: number("id"),
            name: fields.get("nas_name").cloned(),
            ip_address,
            secret,
            avp: AvpConfig::new(
                fields.get("subscriber_id").map(String::as_str),
                fields.get("session_id").map(String::as_str),
            ),
            created_at: number("created_at"),
            updated_at: number("updated_at"),
        })
    }
}
