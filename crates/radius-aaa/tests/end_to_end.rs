//! End-to-end tests for the RADIUS AAA server
//!
//! Each test binds all three listeners on ephemeral ports with in-memory
//! stores and talks to them over UDP:
//! - NAS resolution and silent drops
//! - PAP authentication
//! - Accounting session lifecycle, including roaming
//! - CoA / Disconnect acknowledgement

use radius_aaa::{
    AccessHandler, AccountingHandler, AvpConfig, CoaHandler, Config, Handlers, ListenerKind,
    ListenerMultiplexer, MemoryCacheStore, MemoryStore, MetricsAggregator, NasRecord,
    RequestStatus, RequestType, SecretResolver, SessionTracker,
};
use radius_proto::auth::{
    calculate_accounting_request_authenticator, encrypt_user_password,
    generate_request_authenticator, verify_response_authenticator,
};
use radius_proto::{Attribute, AttributeType, Code, Packet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const SECRET: &[u8] = b"testing123";

struct TestServer {
    access: SocketAddr,
    accounting: SocketAddr,
    coa: SocketAddr,
    cache: Arc<MemoryCacheStore>,
    tracker: Arc<SessionTracker>,
    metrics: Arc<MetricsAggregator>,
}

/// Start a server whose only NAS is `nas_ip`, mapping AVP 31 and 44
async fn start_server(nas_ip: &str) -> TestServer {
    let store = MemoryStore::new();
    store.add_nas(NasRecord {
        id: 1,
        name: Some("test-nas".to_string()),
        ip_address: nas_ip.to_string(),
        secret: String::from_utf8_lossy(SECRET).into_owned(),
        avp: AvpConfig::new(Some("31"), Some("44")),
        created_at: 0,
        updated_at: 0,
    });
    store.add_user("alice", bcrypt::hash("wonderland", 4).expect("hash"));
    let store = Arc::new(store);

    let cache = Arc::new(MemoryCacheStore::new());
    let metrics = Arc::new(MetricsAggregator::new());
    let tracker = Arc::new(SessionTracker::new(cache.clone()));

    let handlers = Handlers {
        access: Arc::new(AccessHandler::new(store.clone(), metrics.clone())),
        accounting: Arc::new(AccountingHandler::new(tracker.clone(), metrics.clone())),
        coa: Arc::new(CoaHandler::new(metrics.clone())),
    };
    let resolver = Arc::new(SecretResolver::new(cache.clone(), store));

    let mut config = Config::default();
    config.listen_address = "127.0.0.1".to_string();
    config.access_port = 0;
    config.accounting_port = 0;
    config.coa_port = 0;

    let server = ListenerMultiplexer::bind(&config, resolver, handlers)
        .await
        .expect("Failed to bind listeners");

    let test_server = TestServer {
        access: server.local_addr(ListenerKind::Access).expect("access addr"),
        accounting: server.local_addr(ListenerKind::Accounting).expect("accounting addr"),
        coa: server.local_addr(ListenerKind::Coa).expect("coa addr"),
        cache,
        tracker,
        metrics,
    };

    tokio::spawn(server.run());
    test_server
}

async fn exchange(packet: &Packet, addr: SocketAddr, wait: Duration) -> Option<Packet> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");
    socket
        .send_to(&packet.encode().expect("encode"), addr)
        .await
        .expect("send");

    let mut buf = [0u8; 4096];
    match timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(Packet::decode(&buf[..len]).expect("decode response")),
        _ => None,
    }
}

async fn send(packet: &Packet, addr: SocketAddr) -> Packet {
    exchange(packet, addr, Duration::from_secs(5))
        .await
        .expect("Timed out waiting for response")
}

async fn send_expect_silence(packet: &Packet, addr: SocketAddr) {
    assert!(
        exchange(packet, addr, Duration::from_millis(500)).await.is_none(),
        "no reply expected"
    );
}

fn access_request(username: &str, password: &str, identifier: u8) -> Packet {
    let req_auth = generate_request_authenticator();
    let mut packet = Packet::new(Code::AccessRequest, identifier, req_auth);
    packet.add_attribute(Attribute::string(AttributeType::UserName as u8, username).unwrap());
    packet.add_attribute(
        Attribute::new(
            AttributeType::UserPassword as u8,
            encrypt_user_password(password, SECRET, &req_auth),
        )
        .unwrap(),
    );
    packet
}

fn accounting_request(
    status: u32,
    subscriber: &str,
    session: &str,
    framed_ip: Ipv4Addr,
    identifier: u8,
) -> Packet {
    let mut packet = Packet::new(Code::AccountingRequest, identifier, [0u8; 16]);
    packet.add_attribute(Attribute::integer(AttributeType::AcctStatusType as u8, status).unwrap());
    packet.add_attribute(Attribute::string(31, subscriber).unwrap());
    packet.add_attribute(Attribute::string(44, session).unwrap());
    packet.add_attribute(Attribute::ipv4(8, framed_ip).unwrap());
    packet.authenticator = calculate_accounting_request_authenticator(&packet, SECRET);
    packet
}

#[tokio::test]
async fn test_unknown_nas_gets_no_reply() {
    // The only configured NAS is somewhere else, so 127.0.0.1 is a stranger
    let server = start_server("10.99.99.99").await;

    send_expect_silence(&access_request("alice", "wonderland", 1), server.access).await;
    send_expect_silence(
        &accounting_request(1, "sub-1", "sess-1", Ipv4Addr::new(10, 0, 0, 1), 2),
        server.accounting,
    )
    .await;
    assert!(server.metrics.snapshot().is_empty());
}

#[tokio::test]
async fn test_access_accept_and_reject() {
    let server = start_server("127.0.0.1").await;

    let request = access_request("alice", "wonderland", 10);
    let response = send(&request, server.access).await;
    assert_eq!(response.code, Code::AccessAccept);
    assert_eq!(response.identifier, 10);
    assert!(verify_response_authenticator(
        &response,
        &request.authenticator,
        SECRET
    ));

    let request = access_request("alice", "looking-glass", 11);
    let response = send(&request, server.access).await;
    assert_eq!(response.code, Code::AccessReject);
    assert!(response
        .find_attribute(AttributeType::ReplyMessage as u8)
        .is_some());
}

#[tokio::test]
async fn test_nas_secret_cached_after_first_request() {
    let server = start_server("127.0.0.1").await;
    assert!(server.cache.is_empty().await);

    send(&access_request("alice", "wonderland", 12), server.access).await;

    let cached = server.cache.get("radius_nas:1").await.expect("NAS cached");
    assert_eq!(cached.get("ip_address").map(String::as_str), Some("127.0.0.1"));
    assert_eq!(cached.get("subscriber_id").map(String::as_str), Some("31"));
}

#[tokio::test]
async fn test_accounting_lifecycle_with_roaming() {
    let server = start_server("127.0.0.1").await;
    let first_ip = Ipv4Addr::new(100, 64, 0, 10);
    let second_ip = Ipv4Addr::new(100, 64, 0, 20);

    let start = accounting_request(1, "sub-42", "sess-a", first_ip, 20);
    let response = send(&start, server.accounting).await;
    assert_eq!(response.code, Code::AccountingResponse);
    assert_eq!(response.identifier, 20);
    assert!(verify_response_authenticator(
        &response,
        &start.authenticator,
        SECRET
    ));

    let session = server
        .tracker
        .session_at_ip("100.64.0.10")
        .await
        .unwrap()
        .expect("session after start");
    assert_eq!(session.subscriber_id, "sub-42");
    assert_eq!(session.session_id, "sess-a");

    // Interim-Update from a new address moves the session
    let interim = accounting_request(3, "sub-42", "sess-a", second_ip, 21);
    assert_eq!(
        send(&interim, server.accounting).await.code,
        Code::AccountingResponse
    );
    assert!(server.tracker.session_at_ip("100.64.0.10").await.unwrap().is_none());
    let sessions = server.tracker.sessions_for_subscriber("sub-42").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].ip, "100.64.0.20");

    let stop = accounting_request(2, "sub-42", "sess-a", second_ip, 22);
    assert_eq!(
        send(&stop, server.accounting).await.code,
        Code::AccountingResponse
    );
    assert!(server
        .tracker
        .sessions_for_subscriber("sub-42")
        .await
        .unwrap()
        .is_empty());

    for request_type in [
        RequestType::AccountingStart,
        RequestType::InterimUpdate,
        RequestType::AccountingStop,
    ] {
        let stats = server
            .metrics
            .get(request_type, RequestStatus::Success)
            .expect("metrics recorded");
        assert_eq!(stats.count, 1);
    }
}

#[tokio::test]
async fn test_accounting_with_bad_authenticator_dropped() {
    let server = start_server("127.0.0.1").await;

    let mut request = accounting_request(1, "sub-1", "sess-1", Ipv4Addr::new(10, 0, 0, 1), 30);
    request.authenticator[0] ^= 0xff;
    send_expect_silence(&request, server.accounting).await;

    assert!(server.tracker.session_at_ip("10.0.0.1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_access_request_on_accounting_port_dropped() {
    let server = start_server("127.0.0.1").await;
    send_expect_silence(&access_request("alice", "wonderland", 31), server.accounting).await;
}

#[tokio::test]
async fn test_disconnect_and_coa_acknowledged() {
    let server = start_server("127.0.0.1").await;

    let mut disconnect = Packet::new(Code::DisconnectRequest, 40, [0u8; 16]);
    disconnect.add_attribute(Attribute::string(44, "sess-a").unwrap());
    disconnect.authenticator = calculate_accounting_request_authenticator(&disconnect, SECRET);
    let response = send(&disconnect, server.coa).await;
    assert_eq!(response.code, Code::DisconnectAck);
    assert!(verify_response_authenticator(
        &response,
        &disconnect.authenticator,
        SECRET
    ));

    let mut coa = Packet::new(Code::CoaRequest, 41, [0u8; 16]);
    coa.authenticator = calculate_accounting_request_authenticator(&coa, SECRET);
    assert_eq!(send(&coa, server.coa).await.code, Code::CoaAck);
}
