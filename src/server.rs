//! DNS server setup and lifecycle management.

use async_trait::async_trait;
use hickory_proto::op::{Header, Message, ResponseCode};
use hickory_proto::rr::Record;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::RangerClient;
use crate::config::{Config, FetchMode};
use crate::error::DnsError;
use crate::handler::RangerHandler;
use crate::lookup::{DirectLookup, ServiceLookup};
use crate::plugin::{BufferedWriter, Handler, RequestContext};
use crate::state::ServiceCache;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Idle timeout for TCP connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit state metrics.
async fn metrics_loop(cache: ServiceCache, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                cache.emit_metrics();
                debug!(
                    ready = cache.is_ready(),
                    services = cache.services_count(),
                    "emitted state metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Adapts a handler chain to hickory's `RequestHandler`.
///
/// The chain writes into a buffer; whatever it wrote is sent back. When the
/// chain writes nothing, an empty reply carrying the chain's error code is
/// sent instead.
#[derive(Clone)]
pub struct ChainRequestHandler {
    chain: Arc<dyn Handler>,
}

impl ChainRequestHandler {
    /// Serve requests through `chain`.
    pub fn new(chain: Arc<dyn Handler>) -> Self {
        Self { chain }
    }

    /// Run the chain for a decoded request and return the reply to send.
    pub async fn resolve(&self, ctx: &RequestContext, request: &Message) -> Message {
        let mut writer = BufferedWriter::new();
        let result = self.chain.serve_dns(ctx, &mut writer, request).await;

        if let Some(reply) = writer.into_message() {
            if let Err(e) = result {
                debug!(src = %ctx.src, error = %e, "chain failed after writing a reply");
            }
            return reply;
        }

        let code = match result {
            Ok(code) => code,
            Err(e) => {
                debug!(src = %ctx.src, error = %e, "chain failed without a reply");
                e.response_code()
            }
        };
        error_reply(request, code)
    }
}

/// Empty reply to `request` with the given response code.
pub fn error_reply(request: &Message, code: ResponseCode) -> Message {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(code);

    let mut reply = Message::new();
    reply.set_header(header);
    reply.add_queries(request.queries().iter().cloned());
    reply
}

/// Rebuild a `Message` from a server-side request.
fn request_to_message(request: &Request) -> Message {
    let mut message = Message::new();
    message.set_header(*request.header());
    message.add_queries(request.queries().iter().map(|q| q.original().clone()));
    message
}

#[async_trait]
impl RequestHandler for ChainRequestHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let ctx = RequestContext::new(request.src());
        let message = request_to_message(request);
        let reply = self.resolve(&ctx, &message).await;

        let header = *reply.header();
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            reply.answers().iter(),
            reply.name_servers().iter(),
            std::iter::empty::<&Record>(),
            reply.additionals().iter(),
        );

        response_handle
            .send_response(response)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "DNS response error");
                header.into()
            })
    }
}

/// Standalone DNS server running the ranger handler.
pub struct DnsServer {
    config: Config,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        let ranger = &self.config.ranger;
        ranger.validate()?;

        info!(
            listen_addr = %self.config.dns.listen_addr,
            endpoint = %ranger.endpoint,
            mode = ?ranger.mode,
            "Starting ranger-dns server"
        );

        if ranger.skip_data_from_replication_sources {
            warn!("skip_data_from_replication_sources is reserved and currently has no effect");
        }

        let client = RangerClient::new(ranger)?;

        // Listeners come up before any background task is spawned
        let udp_socket = UdpSocket::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS UDP listening");

        let tcp_listener = TcpListener::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS TCP listening");

        let mut background = Vec::new();
        let lookup: Arc<dyn ServiceLookup> = match ranger.mode {
            FetchMode::Bulk => {
                let (cache, refresh_handle) = ServiceCache::start(
                    Arc::new(client),
                    ranger.refresh_interval(),
                    shutdown.child_token(),
                )
                .await;
                background.push(refresh_handle);

                if !cache.is_ready() {
                    warn!("Initial service sync failed; answering SERVFAIL until a refresh succeeds");
                }

                let metrics_cache = cache.clone();
                let metrics_shutdown = shutdown.child_token();
                background.push(tokio::spawn(async move {
                    metrics_loop(metrics_cache, metrics_shutdown).await;
                }));

                Arc::new(cache)
            }
            FetchMode::PerService => Arc::new(DirectLookup::new(client)),
        };

        let handler: Arc<dyn Handler> = Arc::new(RangerHandler::new(lookup));
        let mut server = ServerFuture::new(ChainRequestHandler::new(handler));
        server.register_socket(udp_socket);
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!("DNS server ready to serve queries");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
                shutdown.cancel();
            }
        }

        info!("Waiting for background tasks to stop...");
        for handle in background {
            if let Err(e) = handle.await {
                error!("Background task panicked: {}", e);
            }
        }

        info!("DNS server stopped");
        Ok(())
    }
}
