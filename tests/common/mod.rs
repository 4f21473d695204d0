//! Shared test infrastructure for ranger-dns integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header::ACCEPT, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hickory_proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, ResponseHandler, ResponseInfo};
use serde_json::{json, Value};

use ranger_dns::plugin::{Handler, RequestContext, ResponseWriter};
use ranger_dns::registry::{RegistrySnapshot, ServiceIdentity, ServiceNode, ServiceRecord};
use ranger_dns::{DnsError, RegistrySource, ServiceCache};

// --- Constants ---

pub const SERVICE_NAME: &str = "test";
pub const NAMESPACE: &str = "testN";
pub const SERVICE_FQDN: &str = "test.testN.";
pub const UNKNOWN_FQDN: &str = "test1.testN.";
pub const NODE_HOST: &str = "host";
pub const NODE_PORT: u16 = 2344;
pub const NEXT_ANSWER_IP: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(io::Error::other)?;
        Ok(info)
    }
}

// --- Query/Request construction ---

/// Build a query message.
pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    build_query(name, record_type, id).to_vec().unwrap()
}

/// Build a full server-side `Request` as if received over UDP from `src`.
pub fn build_request(name: &str, record_type: RecordType, src: SocketAddr, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let mut decoder = BinDecoder::new(&bytes);
    let msg = MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest");
    Request::new(msg, src, Protocol::Udp)
}

pub fn test_src() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn test_ctx() -> RequestContext {
    RequestContext::new(test_src())
}

// --- Registry fixtures ---

pub fn node(host: &str, port: i32) -> ServiceNode {
    ServiceNode {
        host: host.to_string(),
        port,
        port_scheme: "HTTP".to_string(),
    }
}

pub fn service(service_name: &str, namespace: &str, nodes: Vec<ServiceNode>) -> ServiceRecord {
    ServiceRecord {
        identity: ServiceIdentity {
            service_name: service_name.to_string(),
            namespace: namespace.to_string(),
        },
        nodes,
    }
}

/// One service `test.testN` with a single node `host:2344`.
pub fn scenario_snapshot() -> RegistrySnapshot {
    RegistrySnapshot {
        status: "SUCCESS".to_string(),
        message: String::new(),
        records: vec![Arc::new(service(
            SERVICE_NAME,
            NAMESPACE,
            vec![node(NODE_HOST, NODE_PORT as i32)],
        ))],
    }
}

/// Registry JSON matching [`scenario_snapshot`].
pub fn scenario_json() -> Value {
    json!({
        "status": "SUCCESS",
        "message": "",
        "data": [
            {
                "service": { "serviceName": SERVICE_NAME, "namespace": NAMESPACE },
                "nodes": [
                    { "host": NODE_HOST, "port": NODE_PORT, "portScheme": "HTTP" }
                ]
            }
        ]
    })
}

// --- Mock registry sources ---

/// Always returns the same snapshot.
pub struct StaticSource {
    snapshot: RegistrySnapshot,
    pub calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RegistrySource for StaticSource {
    async fn fetch_services(&self) -> Result<RegistrySnapshot, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

/// Every pull fails as if the registry answered 503.
pub struct FailingSource;

#[async_trait]
impl RegistrySource for FailingSource {
    async fn fetch_services(&self) -> Result<RegistrySnapshot, DnsError> {
        Err(DnsError::Status { code: 503 })
    }
}

/// Cache refreshed once from [`scenario_snapshot`].
pub async fn ready_cache() -> ServiceCache {
    let cache = ServiceCache::new(Arc::new(StaticSource::new(scenario_snapshot())));
    assert!(cache.refresh().await, "static refresh should succeed");
    cache
}

/// Cache whose only refresh attempt failed.
pub async fn unready_cache() -> ServiceCache {
    let cache = ServiceCache::new(Arc::new(FailingSource));
    assert!(!cache.refresh().await);
    cache
}

// --- Mock next handler ---

/// Downstream handler that answers every query with an A record for 1.1.1.1.
#[derive(Default)]
pub struct StaticAnswerHandler {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Handler for StaticAnswerHandler {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn serve_dns(
        &self,
        _ctx: &RequestContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, DnsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut reply = Message::new();
        reply.set_header(Header::response_from_request(request.header()));
        reply.add_queries(request.queries().iter().cloned());
        if let Some(query) = request.queries().first() {
            reply.add_answer(Record::from_rdata(
                query.name().clone(),
                60,
                RData::A(A(NEXT_ANSWER_IP)),
            ));
        }

        writer.write_msg(reply).await?;
        Ok(ResponseCode::NoError)
    }
}

// --- Mock registry HTTP server ---

/// Shared state behind the mock Ranger server.
#[derive(Default)]
pub struct MockRegistry {
    /// Bulk listing body; `None` answers 502.
    pub services: Mutex<Option<Value>>,
    /// Per-service bodies keyed by `namespace/serviceName`; missing keys answer 502.
    pub nodes: Mutex<HashMap<String, Value>>,
    /// Number of requests served.
    pub hits: AtomicUsize,
    /// `Accept` header of the last request.
    pub last_accept: Mutex<Option<String>>,
}

impl MockRegistry {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_services(&self, body: Option<Value>) {
        *self.services.lock().unwrap() = body;
    }

    pub fn set_nodes(&self, namespace: &str, service_name: &str, body: Value) {
        self.nodes
            .lock()
            .unwrap()
            .insert(format!("{namespace}/{service_name}"), body);
    }

    fn observe(&self, headers: &HeaderMap) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        *self.last_accept.lock().unwrap() = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
}

async fn services_route(State(registry): State<Arc<MockRegistry>>, headers: HeaderMap) -> Response {
    registry.observe(&headers);
    match registry.services.lock().unwrap().clone() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn nodes_route(
    State(registry): State<Arc<MockRegistry>>,
    Path((namespace, service_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    registry.observe(&headers);
    let key = format!("{namespace}/{service_name}");
    match registry.nodes.lock().unwrap().get(&key).cloned() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::BAD_GATEWAY.into_response(),
    }
}

/// Start a mock Ranger server on a random local port.
///
/// Returns the endpoint URL (`http://127.0.0.1:PORT`) and the shared state.
pub async fn start_mock_registry() -> (String, Arc<MockRegistry>) {
    let registry = Arc::new(MockRegistry::default());

    let app = Router::new()
        .route("/ranger/services/nodes/v1", get(services_route))
        .route("/ranger/nodes/v1/{namespace}/{service_name}", get(nodes_route))
        .with_state(registry.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock registry");
    let addr = listener.local_addr().expect("failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock registry failed");
    });

    (format!("http://{addr}"), registry)
}

// --- Response helpers ---

/// Extract SRV records (owner, rdata) from a record section.
pub fn extract_srv(records: &[Record]) -> Vec<(Name, SRV)> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some((r.name().clone(), srv.clone())),
            _ => None,
        })
        .collect()
}

/// Extract A addresses from a record section.
pub fn extract_a(records: &[Record]) -> Vec<Ipv4Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect()
}

/// Assert a record section holds exactly the scenario's SRV record.
pub fn assert_scenario_srv(records: &[Record]) {
    let srv = extract_srv(records);
    assert_eq!(srv.len(), 1, "expected one SRV record, got {records:?}");

    let (owner, rdata) = &srv[0];
    assert_eq!(owner.to_string(), SERVICE_FQDN);
    assert_eq!(rdata.target().to_string(), "host.");
    assert_eq!(rdata.port(), NODE_PORT);
    assert_eq!(rdata.priority(), 1);
    assert_eq!(rdata.weight(), 1);

    let record = records
        .iter()
        .find(|r| r.record_type() == RecordType::SRV)
        .unwrap();
    assert_eq!(record.ttl(), 30);
    assert_eq!(record.dns_class(), DNSClass::IN);
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
