//! The `ranger` request handler: answers SRV queries for registered services.

use async_trait::async_trait;
use hickory_proto::op::{Header, Message, ResponseCode};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::answer::{synthesize, SynthesizedAnswer};
use crate::combine::CombiningResponseWriter;
use crate::error::DnsError;
use crate::lookup::ServiceLookup;
use crate::metrics::{self, QueryResult, Timer};
use crate::plugin::{next_or_failure, Handler, RequestContext, ResponseWriter};

/// Name of this stage in the handler chain.
pub const PLUGIN_NAME: &str = "ranger";

/// Which path a request took through the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No question section; passed straight to the next handler.
    NoQuestion,
    /// Cache never populated; failed with SERVFAIL, nothing written.
    CacheUnready,
    /// Name not registered; passed to the next handler untouched.
    NoMatch,
    /// Matched with no next handler; synthesized reply written directly.
    MatchDirect,
    /// Matched; next handler invoked behind a combining writer.
    MatchForwarded,
}

/// Request handler backed by a [`ServiceLookup`].
pub struct RangerHandler {
    lookup: Arc<dyn ServiceLookup>,
    next: Option<Arc<dyn Handler>>,
}

impl RangerHandler {
    /// Handler with no next stage.
    pub fn new(lookup: Arc<dyn ServiceLookup>) -> Self {
        Self { lookup, next: None }
    }

    /// Set the next handler in the chain.
    pub fn with_next(mut self, next: Arc<dyn Handler>) -> Self {
        self.next = Some(next);
        self
    }

    /// True once the lookup can answer queries.
    pub fn is_ready(&self) -> bool {
        self.lookup.is_ready()
    }

    /// Handle a request, also reporting which path it took.
    pub async fn serve_with_state(
        &self,
        ctx: &RequestContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> (HandlerState, Result<ResponseCode, DnsError>) {
        let timer = Timer::start();

        if !self.lookup.is_ready() {
            debug!(src = %ctx.src, "ranger cache not ready, returning SERVFAIL");
            metrics::record_query("unknown", QueryResult::NotReady, timer.elapsed());
            return (HandlerState::CacheUnready, Err(DnsError::NotReady));
        }

        let Some(query) = request.queries().first() else {
            trace!(src = %ctx.src, "request without question, passing through");
            metrics::record_query("none", QueryResult::PassThrough, timer.elapsed());
            let result = self.forward(ctx, writer, request).await;
            return (HandlerState::NoQuestion, result);
        };

        let rtype_str = query.query_type().to_string();
        let qname = query.name().to_ascii();

        let answer = match self.lookup.search_service(&qname).await {
            Some(record) => synthesize(&record, query),
            None => SynthesizedAnswer::default(),
        };

        if answer.is_empty() {
            debug!(name = %qname, rtype = %rtype_str, "no registered service, forwarding");
            metrics::record_query(&rtype_str, QueryResult::NoMatch, timer.elapsed());
            let result = self.forward(ctx, writer, request).await;
            return (HandlerState::NoMatch, result);
        }

        metrics::record_srv_records_returned(answer.len());

        if let Some(next) = &self.next {
            debug!(
                name = %qname,
                rtype = %rtype_str,
                records = answer.len(),
                next = next.name(),
                "service matched, merging with next handler"
            );
            metrics::record_query(&rtype_str, QueryResult::Forwarded, timer.elapsed());
            let mut combining = CombiningResponseWriter::new(writer, answer);
            let result = next.serve_dns(ctx, &mut combining, request).await;
            return (HandlerState::MatchForwarded, result);
        }

        debug!(name = %qname, rtype = %rtype_str, records = answer.len(), "service matched");
        let reply = build_reply(request, answer);
        let result = writer.write_msg(reply).await.map(|_| ResponseCode::NoError);
        metrics::record_query(&rtype_str, QueryResult::Answered, timer.elapsed());
        (HandlerState::MatchDirect, result)
    }

    async fn forward(
        &self,
        ctx: &RequestContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, DnsError> {
        next_or_failure(PLUGIN_NAME, self.next.as_ref(), ctx, writer, request).await
    }
}

/// Authoritative reply to `request` carrying the synthesized records.
pub fn build_reply(request: &Message, answer: SynthesizedAnswer) -> Message {
    let mut reply = Message::new();
    reply.set_header(Header::response_from_request(request.header()));
    reply.set_authoritative(true);
    reply.add_queries(request.queries().iter().cloned());
    reply.add_answers(answer.answers);
    reply.add_additionals(answer.additionals);
    reply
}

#[async_trait]
impl Handler for RangerHandler {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    async fn serve_dns(
        &self,
        ctx: &RequestContext,
        writer: &mut dyn ResponseWriter,
        request: &Message,
    ) -> Result<ResponseCode, DnsError> {
        let (_, result) = self.serve_with_state(ctx, writer, request).await;
        result
    }
}
