//! RADIUS accounting: event extraction and session tracking
//!
//! Start, Interim-Update and Stop drive the [`SessionTracker`]; a successful
//! transition is acknowledged with an Accounting-Response. Any failure is
//! logged and the request is left unanswered so the NAS retransmits.

pub mod event;
pub mod tracker;

pub use event::AccountingEvent;
pub use tracker::{SessionTracker, StopOutcome};

use crate::error::AaaError;
use crate::listener::{PacketHandler, RadiusRequest};
use crate::metrics::{MetricsAggregator, RequestStatus, RequestType};
use async_trait::async_trait;
use radius_proto::{AcctStatusType, Code, Packet};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct AccountingHandler {
    tracker: Arc<SessionTracker>,
    metrics: Arc<MetricsAggregator>,
}

impl AccountingHandler {
    pub fn new(tracker: Arc<SessionTracker>, metrics: Arc<MetricsAggregator>) -> Self {
        Self { tracker, metrics }
    }

    async fn apply(&self, event: &AccountingEvent) -> Result<(), AaaError> {
        match event.status {
            AcctStatusType::Start => {
                self.tracker
                    .start(
                        &event.subscriber_id,
                        &event.session_id,
                        &event.framed_ip,
                        event.ip_version,
                    )
                    .await?;
            }
            AcctStatusType::InterimUpdate => {
                self.tracker
                    .interim_update(
                        &event.subscriber_id,
                        &event.session_id,
                        &event.framed_ip,
                        event.ip_version,
                    )
                    .await?;
            }
            AcctStatusType::Stop => {
                self.tracker
                    .stop(&event.subscriber_id, &event.framed_ip)
                    .await?;
            }
            AcctStatusType::AccountingOn | AcctStatusType::AccountingOff => {}
        }
        Ok(())
    }
}

fn request_type(status: AcctStatusType) -> Option<RequestType> {
    match status {
        AcctStatusType::Start => Some(RequestType::AccountingStart),
        AcctStatusType::Stop => Some(RequestType::AccountingStop),
        AcctStatusType::InterimUpdate => Some(RequestType::InterimUpdate),
        AcctStatusType::AccountingOn | AcctStatusType::AccountingOff => None,
    }
}

#[async_trait]
impl PacketHandler for AccountingHandler {
    async fn handle(&self, request: &RadiusRequest) -> Option<Packet> {
        let packet = &request.packet;

        let status = match AcctStatusType::from_packet(packet) {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    nas_ip = %request.nas.ip_address,
                    request_id = packet.identifier,
                    error = %e,
                    "Dropping accounting request without usable status type"
                );
                return None;
            }
        };

        if !status.is_session_status() {
            info!(
                nas_ip = %request.nas.ip_address,
                status_type = %status,
                "NAS accounting state change"
            );
            return Some(Packet::reply_to(packet, Code::AccountingResponse));
        }

        let result = match AccountingEvent::from_packet(status, packet, &request.nas) {
            Ok(event) => {
                info!(
                    session_id = %event.session_id,
                    subscriber_id = %event.subscriber_id,
                    username = event.username.as_deref().unwrap_or(""),
                    nas_ip = %event.nas_ip,
                    framed_ip = %event.framed_ip,
                    status_type = %event.status,
                    "Processing accounting request"
                );
                self.apply(&event).await
            }
            Err(e) => Err(e),
        };

        if let Some(request_type) = request_type(status) {
            self.metrics.record(
                request_type,
                RequestStatus::from_ok(result.is_ok()),
                request.received_at.elapsed(),
            );
        }

        match result {
            Ok(()) => Some(Packet::reply_to(packet, Code::AccountingResponse)),
            Err(e) => {
                error!(
                    nas_ip = %request.nas.ip_address,
                    request_id = packet.identifier,
                    status_type = %status,
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to process accounting request"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nas::AvpConfig;
    use crate::resolver::ResolvedNas;
    use crate::state::MemoryCacheStore;
    use radius_proto::{Attribute, AttributeType};
    use std::net::Ipv4Addr;
    use std::time::Instant;

    fn handler() -> (AccountingHandler, Arc<SessionTracker>, Arc<MetricsAggregator>) {
        let tracker = Arc::new(SessionTracker::new(Arc::new(MemoryCacheStore::new())));
        let metrics = Arc::new(MetricsAggregator::new());
        (
            AccountingHandler::new(Arc::clone(&tracker), Arc::clone(&metrics)),
            tracker,
            metrics,
        )
    }

    fn request(status: Option<u32>, framed: Option<Ipv4Addr>, session_avp: Option<&str>) -> RadiusRequest {
        let mut packet = Packet::new(Code::AccountingRequest, 11, [0u8; 16]);
        if let Some(status) = status {
            packet.add_attribute(
                Attribute::integer(AttributeType::AcctStatusType.as_u8(), status).unwrap(),
            );
        }
        packet.add_attribute(Attribute::string(31, "sub-1").unwrap());
        packet.add_attribute(Attribute::string(44, "sess-1").unwrap());
        if let Some(addr) = framed {
            packet.add_attribute(Attribute::ipv4(8, addr).unwrap());
        }

        RadiusRequest {
            packet,
            peer: "192.168.1.10:1813".parse().unwrap(),
            nas: ResolvedNas {
                id: 1,
                name: None,
                ip_address: "192.168.1.10".to_string(),
                secret: "testSecret".to_string(),
                avp: AvpConfig::new(Some("31"), session_avp),
            },
            received_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_start_acknowledged() {
        let (handler, tracker, metrics) = handler();
        let req = request(Some(1), Some(Ipv4Addr::new(10, 0, 0, 1)), Some("44"));

        let response = handler.handle(&req).await.unwrap();
        assert_eq!(response.code, Code::AccountingResponse);
        assert_eq!(response.identifier, 11);

        let session = tracker.session_at_ip("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(session.session_id, "sess-1");
        assert_eq!(
            metrics
                .get(RequestType::AccountingStart, RequestStatus::Success)
                .unwrap()
                .count,
            1
        );
    }

    #[tokio::test]
    async fn test_start_without_framed_ip_not_acknowledged() {
        let (handler, tracker, metrics) = handler();
        let req = request(Some(1), None, Some("44"));

        assert!(handler.handle(&req).await.is_none());
        assert!(tracker.sessions_for_subscriber("sub-1").await.unwrap().is_empty());
        assert!(metrics
            .get(RequestType::AccountingStart, RequestStatus::Failure)
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_avp_config_not_acknowledged() {
        let (handler, tracker, _) = handler();
        let req = request(Some(1), Some(Ipv4Addr::new(10, 0, 0, 1)), None);

        assert!(handler.handle(&req).await.is_none());
        assert!(tracker.session_at_ip("10.0.0.1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_without_session_acknowledged() {
        let (handler, _, _) = handler();
        let req = request(Some(2), Some(Ipv4Addr::new(10, 0, 0, 1)), Some("44"));

        let response = handler.handle(&req).await.unwrap();
        assert_eq!(response.code, Code::AccountingResponse);
    }

    #[tokio::test]
    async fn test_accounting_on_acknowledged_without_state() {
        let (handler, tracker, metrics) = handler();
        let req = request(Some(7), Some(Ipv4Addr::new(10, 0, 0, 1)), Some("44"));

        assert!(handler.handle(&req).await.is_some());
        assert!(tracker.session_at_ip("10.0.0.1").await.unwrap().is_none());
        assert!(metrics.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_or_missing_status_dropped() {
        let (handler, _, _) = handler();
        assert!(handler
            .handle(&request(Some(99), None, Some("44")))
            .await
            .is_none());
        assert!(handler
            .handle(&request(None, None, Some("44")))
            .await
            .is_none());
    }
}
