//! Response writer that merges synthesized records into a downstream reply.

use async_trait::async_trait;
use hickory_proto::op::Message;

use crate::answer::SynthesizedAnswer;
use crate::error::DnsError;
use crate::plugin::ResponseWriter;

/// Wraps the real writer and appends synthesized records to whatever the
/// downstream handler writes.
///
/// Only the Answer and Additional sections are touched; header, question and
/// authority sections pass through as written.
pub struct CombiningResponseWriter<'a> {
    inner: &'a mut dyn ResponseWriter,
    answer: SynthesizedAnswer,
}

impl<'a> CombiningResponseWriter<'a> {
    /// Wrap `inner`, carrying `answer` to be appended on write.
    pub fn new(inner: &'a mut dyn ResponseWriter, answer: SynthesizedAnswer) -> Self {
        Self { inner, answer }
    }
}

#[async_trait]
impl<'a> ResponseWriter for CombiningResponseWriter<'a> {
    async fn write_msg(&mut self, mut msg: Message) -> Result<(), DnsError> {
        msg.add_answers(self.answer.answers.iter().cloned());
        msg.add_additionals(self.answer.additionals.iter().cloned());
        self.inner.write_msg(msg).await
    }
}
