//! Order assignment.
//!
//! Single pass, no reordering: `order` is the message's 0-based position in
//! the decode stream. A message dropped during normalization still takes its
//! position, so the records of a file may show gaps but never reuse one.

use crate::decoder::NativeMessage;
use crate::extraction::normalize::NormalizedMessage;
use crate::extraction::values::stringify_ciphering_keys;
use crate::storage::models::CanonicalRecord;

#[derive(Debug, Default)]
pub struct Sequencer {
    position: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the current stream position and build the canonical record.
    pub fn sequence(&mut self, msg: NativeMessage, normalized: NormalizedMessage) -> CanonicalRecord {
        let NormalizedMessage {
            mut fields,
            message,
        } = normalized;
        stringify_ciphering_keys(&mut fields);

        CanonicalRecord {
            type_id: msg.type_id,
            timestamp: msg.timestamp,
            order: self.advance(),
            fields,
            message,
        }
    }

    /// Consume the position of a message that yields no record.
    pub fn skip(&mut self) -> u64 {
        self.advance()
    }

    fn advance(&mut self) -> u64 {
        let position = self.position;
        self.position += 1;
        position
    }
}
