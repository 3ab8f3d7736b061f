//! Change-of-Authorization and Disconnect acknowledgement (RFC 5176)

use crate::listener::{PacketHandler, RadiusRequest};
use crate::metrics::{MetricsAggregator, RequestStatus, RequestType};
use async_trait::async_trait;
use radius_proto::{Code, Packet};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CoaHandler {
    metrics: Arc<MetricsAggregator>,
}

impl CoaHandler {
    pub fn new(metrics: Arc<MetricsAggregator>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl PacketHandler for CoaHandler {
    async fn handle(&self, request: &RadiusRequest) -> Option<Packet> {
        let packet = &request.packet;
        let (reply, request_type) = match packet.code {
            Code::DisconnectRequest => (Code::DisconnectAck, Some(RequestType::Disconnect)),
            Code::CoaRequest => (Code::CoaAck, Some(RequestType::CoA)),
            other => {
                warn!(code = %other, client_ip = %request.peer.ip(), "Unsupported CoA packet");
                (Code::CoaNak, None)
            }
        };

        info!(
            nas_ip = %request.nas.ip_address,
            request_id = packet.identifier,
            code = %packet.code,
            reply = %reply,
            "Answering dynamic authorization request"
        );

        if let Some(request_type) = request_type {
            self.metrics.record(
                request_type,
                RequestStatus::Success,
                request.received_at.elapsed(),
            );
        }

        Some(Packet::reply_to(packet, reply))
    }
}
