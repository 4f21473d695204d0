//! Request-handling chain contract.
//!
//! A DNS server built from stages: each [`Handler`] either answers a query by
//! writing to its [`ResponseWriter`], or hands it to the next handler in the
//! chain. The host only inspects what was written and the returned code.

use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::DnsError;

/// Per-request information passed down the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Address the query came from.
    pub src: SocketAddr,
}

impl RequestContext {
    /// Context for a query from `src`.
    pub fn new(src: SocketAddr) -> Self {
        Self { src }
    }
}

/// Destination for a handler's response message.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Write the response for the current request.
    async fn write_msg(&mut self, msg: Message) -> Result<(), DnsError>;
}

/// One stage of the request-handling chain.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stage name, used in errors and logs.
    fn name(&self) -> &'static str;

    /// Handle `request`, writing any response to `writer`.
    async fn serve_dns(
        &self,
        ctx: &RequestContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, DnsError>;
}

/// Call `next` if present, otherwise fail with SERVFAIL on behalf of `name`.
pub async fn next_or_failure(
    name: &'static str,
    next: Option<&Arc<dyn Handler>>,
    ctx: &RequestContext,
    writer: &mut dyn ResponseWriter,
    request: &Message,
) -> Result<ResponseCode, DnsError> {
    match next {
        Some(next) => next.serve_dns(ctx, writer, request).await,
        None => Err(DnsError::NoNextHandler(name)),
    }
}

/// Writer that keeps the written message in memory.
///
/// Used by the server bridge to capture a chain's response before sending it.
#[derive(Debug, Default)]
pub struct BufferedWriter {
    message: Option<Message>,
    writes: usize,
}

impl BufferedWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write_msg` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// The last written message, if any.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Take the last written message.
    pub fn into_message(self) -> Option<Message> {
        self.message
    }
}

#[async_trait]
impl ResponseWriter for BufferedWriter {
    async fn write_msg(&mut self, msg: Message) -> Result<(), DnsError> {
        self.writes += 1;
        self.message = Some(msg);
        Ok(())
    }
}
