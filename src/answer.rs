//! SRV answer synthesis from registry nodes.

use hickory_proto::op::Query;
use hickory_proto::rr::rdata::SRV;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tracing::warn;

use crate::registry::{ServiceNode, ServiceRecord};

/// TTL of synthesized SRV records, in seconds.
pub const SRV_TTL: u32 = 30;

/// Priority of synthesized SRV records.
pub const SRV_PRIORITY: u16 = 1;

/// Weight of synthesized SRV records.
pub const SRV_WEIGHT: u16 = 1;

/// SRV records for one matched service, already split by section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedAnswer {
    /// Records for the Answer section (SRV queries).
    pub answers: Vec<Record>,
    /// Records for the Additional section (any other query type).
    pub additionals: Vec<Record>,
}

impl SynthesizedAnswer {
    /// True when no record was produced.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.additionals.is_empty()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.answers.len() + self.additionals.len()
    }
}

/// Build one SRV record per node of `record`, owned by the query name.
///
/// SRV queries get the records as answers; every other type gets them as
/// additional records. Node order is preserved. Nodes whose host is not a
/// valid DNS name or whose port does not fit in 16 bits are skipped.
pub fn synthesize(record: &ServiceRecord, query: &Query) -> SynthesizedAnswer {
    let owner = query.name();
    let srv: Vec<Record> = record
        .nodes
        .iter()
        .filter_map(|node| srv_record(owner, node, query))
        .collect();

    if query.query_type() == RecordType::SRV {
        SynthesizedAnswer {
            answers: srv,
            additionals: Vec::new(),
        }
    } else {
        SynthesizedAnswer {
            answers: Vec::new(),
            additionals: srv,
        }
    }
}

fn srv_record(owner: &Name, node: &ServiceNode, query: &Query) -> Option<Record> {
    let Ok(port) = u16::try_from(node.port) else {
        warn!(host = %node.host, port = node.port, "skipping node with out-of-range port");
        return None;
    };

    let target = match Name::from_ascii(format!("{}.", node.host)) {
        Ok(target) => target,
        Err(e) => {
            warn!(host = %node.host, error = %e, "skipping node with invalid host");
            return None;
        }
    };

    let mut record = Record::from_rdata(
        owner.clone(),
        SRV_TTL,
        RData::SRV(SRV::new(SRV_PRIORITY, SRV_WEIGHT, port, target)),
    );
    record.set_dns_class(query.query_class());
    Some(record)
}
