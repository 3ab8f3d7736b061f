//! Access-Request handling (PAP against stored bcrypt hashes)

use crate::error::AaaError;
use crate::listener::{PacketHandler, RadiusRequest};
use crate::metrics::{MetricsAggregator, RequestStatus, RequestType};
use crate::store::NasStore;
use async_trait::async_trait;
use radius_proto::{Attribute, AttributeType, Code, Packet, decrypt_user_password};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reply-Message on every Reject; it never says which check failed
pub const REJECT_MESSAGE: &str = "Authentication failed";

pub struct AccessHandler {
    store: Arc<dyn NasStore>,
    metrics: Arc<MetricsAggregator>,
}

impl AccessHandler {
    pub fn new(store: Arc<dyn NasStore>, metrics: Arc<MetricsAggregator>) -> Self {
        Self { store, metrics }
    }

    /// `Ok(true)` on a password match, `Ok(false)` on a mismatch
    async fn authenticate(&self, request: &RadiusRequest) -> Result<bool, AaaError> {
        let packet = &request.packet;
        let username = packet
            .find_attribute(AttributeType::UserName.as_u8())
            .and_then(|attr| attr.as_string().ok())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AaaError::Validation("User-Name missing".to_string()))?;

        let encrypted = packet
            .find_attribute(AttributeType::UserPassword.as_u8())
            .ok_or_else(|| AaaError::Validation("User-Password missing".to_string()))?;
        let password = decrypt_user_password(&encrypted.value, request.secret(), &packet.authenticator)
            .map_err(|e| AaaError::Validation(format!("User-Password: {}", e)))?;

        info!(
            username = %username,
            client_ip = %request.peer.ip(),
            request_id = packet.identifier,
            "Authentication request received"
        );

        let credential = self
            .store
            .get_user_by_username(&username)
            .await?
            .ok_or_else(|| AaaError::NotFound(format!("user {}", username)))?;

        verify_password(password, credential.password_hash).await
    }
}

/// bcrypt is CPU-bound, so it runs on the blocking pool
async fn verify_password(password: String, hash: String) -> Result<bool, AaaError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
        .await
        .map_err(|e| AaaError::Validation(format!("password verification aborted: {}", e)))?
        .map_err(|e| AaaError::Validation(format!("unusable password hash: {}", e)))
}

fn reject(request: &Packet) -> Packet {
    let mut response = Packet::reply_to(request, Code::AccessReject);
    if let Ok(attr) = Attribute::string(AttributeType::ReplyMessage.as_u8(), REJECT_MESSAGE) {
        response.add_attribute(attr);
    }
    response
}

#[async_trait]
impl PacketHandler for AccessHandler {
    async fn handle(&self, request: &RadiusRequest) -> Option<Packet> {
        let outcome = self.authenticate(request).await;
        let accepted = matches!(outcome, Ok(true));

        self.metrics.record(
            RequestType::AccessRequest,
            RequestStatus::from_ok(accepted),
            request.received_at.elapsed(),
        );

        match outcome {
            Ok(true) => {
                debug!(client_ip = %request.peer.ip(), "Access accepted");
                Some(Packet::reply_to(&request.packet, Code::AccessAccept))
            }
            Ok(false) => {
                warn!(client_ip = %request.peer.ip(), "Access rejected: invalid password");
                Some(reject(&request.packet))
            }
            Err(e) => {
                warn!(client_ip = %request.peer.ip(), error = %e, "Access rejected");
                Some(reject(&request.packet))
            }
        }
    }
}
