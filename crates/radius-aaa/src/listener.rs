//! UDP listeners and per-datagram dispatch
//!
//! Three listeners (Access, Accounting, CoA/Disconnect) share one
//! [`SecretResolver`]. Each listener runs on its own task and every datagram
//! is processed on a task of its own, so packets are handled concurrently and
//! in no particular order.

use crate::config::Config;
use crate::resolver::{ResolveError, ResolvedNas, SecretResolver};
use async_trait::async_trait;
use radius_proto::{
    AttributeType, Code, Packet, PacketError, calculate_response_authenticator,
    verify_accounting_request_authenticator,
};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("Invalid listen address: {0}")]
    Address(String),
    #[error("Listener task failed: {0}")]
    Task(String),
    #[error("{0} listener stopped")]
    Stopped(ListenerKind),
}

/// Which RADIUS service a listener provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Access,
    Accounting,
    Coa,
}

impl ListenerKind {
    /// Request codes this listener processes; anything else is dropped
    pub fn accepts(self, code: Code) -> bool {
        match self {
            ListenerKind::Access => code == Code::AccessRequest,
            ListenerKind::Accounting => code == Code::AccountingRequest,
            ListenerKind::Coa => matches!(code, Code::CoaRequest | Code::DisconnectRequest),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListenerKind::Access => "access",
            ListenerKind::Accounting => "accounting",
            ListenerKind::Coa => "coa",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated, decoded request together with the NAS that sent it
#[derive(Debug, Clone)]
pub struct RadiusRequest {
    pub packet: Packet,
    pub peer: SocketAddr,
    pub nas: ResolvedNas,
    pub received_at: Instant,
}

impl RadiusRequest {
    pub fn secret(&self) -> &[u8] {
        self.nas.secret.as_bytes()
    }
}

/// Processes requests for one listener.
///
/// Returning `None` means no reply is sent. Handlers log their own failures;
/// nothing they do can stop the listener.
#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(&self, request: &RadiusRequest) -> Option<Packet>;
}

/// The handler behind each listener
#[derive(Clone)]
pub struct Handlers {
    pub access: Arc<dyn PacketHandler>,
    pub accounting: Arc<dyn PacketHandler>,
    pub coa: Arc<dyn PacketHandler>,
}

struct ListenerContext {
    kind: ListenerKind,
    socket: Arc<UdpSocket>,
    resolver: Arc<SecretResolver>,
    handler: Arc<dyn PacketHandler>,
}

/// One bound UDP socket and its dispatch loop
pub struct RadiusListener {
    ctx: Arc<ListenerContext>,
}

impl RadiusListener {
    pub async fn bind(
        kind: ListenerKind,
        addr: SocketAddr,
        resolver: Arc<SecretResolver>,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr).await?;
        info!(listener = %kind, "RADIUS {} listener on {}", kind, socket.local_addr()?);

        Ok(RadiusListener {
            ctx: Arc::new(ListenerContext {
                kind,
                socket: Arc::new(socket),
                resolver,
                handler,
            }),
        })
    }

    pub fn kind(&self) -> ListenerKind {
        self.ctx.kind
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.ctx.socket.local_addr().map_err(ServerError::from)
    }

    /// Receive forever; only a socket error ends the loop
    pub async fn run(self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; Packet::MAX_PACKET_SIZE];

        loop {
            let (len, peer) = self.ctx.socket.recv_from(&mut buf).await?;
            let data = buf[..len].to_vec();
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                if let Err(e) = handle_datagram(&ctx, data, peer).await {
                    warn!(
                        listener = %ctx.kind,
                        client_ip = %peer.ip(),
                        error = %e,
                        "Dropping datagram"
                    );
                }
            });
        }
    }
}

async fn handle_datagram(
    ctx: &ListenerContext,
    data: Vec<u8>,
    peer: SocketAddr,
) -> Result<(), ServerError> {
    let received_at = Instant::now();

    let nas = match ctx.resolver.resolve(peer.ip()).await {
        Ok(nas) => nas,
        Err(ResolveError::NotFound(ip)) => {
            debug!(listener = %ctx.kind, client_ip = %ip, "Ignoring packet from unknown NAS");
            return Ok(());
        }
        Err(e) => {
            warn!(
                listener = %ctx.kind,
                client_ip = %peer.ip(),
                error = %e,
                "Dropping packet, NAS lookup failed"
            );
            return Ok(());
        }
    };

    let packet = Packet::decode(&data)?;

    if !ctx.kind.accepts(packet.code) {
        warn!(
            listener = %ctx.kind,
            client_ip = %peer.ip(),
            request_id = packet.identifier,
            code = %packet.code,
            "Unexpected packet code for listener"
        );
        return Ok(());
    }

    if packet.code.has_computed_request_authenticator()
        && !verify_accounting_request_authenticator(&packet, nas.secret.as_bytes())
    {
        warn!(
            listener = %ctx.kind,
            client_ip = %peer.ip(),
            nas_id = nas.id,
            request_id = packet.identifier,
            "Request authenticator mismatch"
        );
        return Ok(());
    }

    debug!(
        listener = %ctx.kind,
        client_ip = %peer.ip(),
        nas_id = nas.id,
        request_id = packet.identifier,
        code = %packet.code,
        "Received RADIUS packet"
    );

    let request = RadiusRequest {
        packet,
        peer,
        nas,
        received_at,
    };

    let Some(response) = ctx.handler.handle(&request).await else {
        return Ok(());
    };

    let response = finalize_response(response, &request);
    let bytes = response.encode()?;
    ctx.socket.send_to(&bytes, peer).await?;

    debug!(
        listener = %ctx.kind,
        client_ip = %peer.ip(),
        request_id = response.identifier,
        code = %response.code,
        "Sent RADIUS response"
    );
    Ok(())
}

/// Match the request identifier, echo Proxy-State and sign the response
fn finalize_response(mut response: Packet, request: &RadiusRequest) -> Packet {
    let proxy_state = AttributeType::ProxyState.as_u8();
    response.identifier = request.packet.identifier;
    response.attributes.retain(|attr| attr.attr_type != proxy_state);
    response.attributes.extend(
        request
            .packet
            .find_all_attributes(proxy_state)
            .into_iter()
            .cloned(),
    );
    response.authenticator = calculate_response_authenticator(
        &response,
        &request.packet.authenticator,
        request.secret(),
    );
    response
}

/// The three listeners of one server instance
pub struct ListenerMultiplexer {
    listeners: Vec<RadiusListener>,
}

impl ListenerMultiplexer {
    /// Bind the Access, Accounting and CoA sockets from `config`
    pub async fn bind(
        config: &Config,
        resolver: Arc<SecretResolver>,
        handlers: Handlers,
    ) -> Result<Self, ServerError> {
        let plan = [
            (ListenerKind::Access, config.access_port, handlers.access),
            (ListenerKind::Accounting, config.accounting_port, handlers.accounting),
            (ListenerKind::Coa, config.coa_port, handlers.coa),
        ];

        let mut listeners = Vec::with_capacity(plan.len());
        for (kind, port, handler) in plan {
            let addr = config
                .socket_addr(port)
                .map_err(|e| ServerError::Address(e.to_string()))?;
            listeners.push(RadiusListener::bind(kind, addr, Arc::clone(&resolver), handler).await?);
        }

        Ok(Self { listeners })
    }

    pub fn local_addrs(&self) -> Result<Vec<(ListenerKind, SocketAddr)>, ServerError> {
        self.listeners
            .iter()
            .map(|l| Ok((l.kind(), l.local_addr()?)))
            .collect()
    }

    pub fn local_addr(&self, kind: ListenerKind) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|l| l.kind() == kind)
            .and_then(|l| l.local_addr().ok())
    }

    /// Run every listener until one of them fails.
    ///
    /// The first failure is returned and the remaining listeners are aborted.
    pub async fn run(self) -> Result<(), ServerError> {
        let jobs = self
            .listeners
            .into_iter()
            .map(|listener| (listener.kind(), listener.run()))
            .collect();
        run_until_first_exit(jobs).await
    }
}

/// Drive `jobs` concurrently; the first one to end, for any reason, ends all.
async fn run_until_first_exit<F>(jobs: Vec<(ListenerKind, F)>) -> Result<(), ServerError>
where
    F: Future<Output = Result<(), ServerError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (kind, job) in jobs {
        tasks.spawn(async move { (kind, job.await) });
    }

    let outcome = match tasks.join_next().await {
        Some(Ok((kind, Err(e)))) => {
            error!(listener = %kind, error = %e, "Listener failed");
            Err(e)
        }
        Some(Ok((kind, Ok(())))) => Err(ServerError::Stopped(kind)),
        Some(Err(e)) => Err(ServerError::Task(e.to_string())),
        None => Ok(()),
    };

    tasks.shutdown().await;
    outcome
}
