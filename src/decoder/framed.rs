//! Length-prefixed capture container.
//!
//! Layout:
//!
//! ```text
//! header  : "MI2F" | version u16 LE | reserved u16
//! frame*  : body_len u32 LE | body
//! body    : type_len u16 LE | type_id (UTF-8) | timestamp i64 LE (µs) | payload JSON
//! ```
//!
//! The type id and timestamp sit ahead of the payload so filtered decodes can
//! skip payload parsing for frames that do not match. Encoding copies each
//! message's original frame verbatim.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::decoder::{CaptureCodec, MessageStream, NativeMessage, Payload};
use crate::error::DecodeError;
use crate::filter::spec::FilterSpec;

pub const MAGIC: &[u8; 4] = b"MI2F";
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 8;

const LEN_PREFIX: usize = 4;
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

/// Codec for the framed container.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramedCodec;

impl FramedCodec {
    pub fn new() -> Self {
        Self
    }

    fn frames(&self, raw: &Bytes, filter: Option<FilterSpec>) -> Result<FrameIter, DecodeError> {
        check_header(raw)?;
        Ok(FrameIter {
            buf: raw.slice(HEADER_LEN..),
            offset: HEADER_LEN,
            filter,
            done: false,
        })
    }
}

impl CaptureCodec for FramedCodec {
    fn decode(&self, raw: &Bytes) -> Result<MessageStream<'_>, DecodeError> {
        Ok(Box::new(self.frames(raw, None)?))
    }

    fn decode_with_filter(
        &self,
        raw: &Bytes,
        spec: &FilterSpec,
    ) -> Result<MessageStream<'_>, DecodeError> {
        Ok(Box::new(self.frames(raw, Some(spec.clone()))?))
    }

    fn encode(&self, messages: MessageStream<'_>) -> Result<Bytes, DecodeError> {
        let mut writer = FramedWriter::new();
        for msg in messages {
            let msg = msg?;
            if msg.frame.is_empty() {
                writer.push(&msg.type_id, msg.timestamp, msg.payload.as_ref())?;
            } else {
                writer.push_frame(&msg.frame);
            }
        }
        Ok(writer.finish())
    }
}

fn check_header(raw: &[u8]) -> Result<(), DecodeError> {
    let magic_len = MAGIC.len().min(raw.len());
    if raw[..magic_len] != MAGIC[..magic_len] {
        return Err(DecodeError::BadHeader);
    }
    if raw.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            offset: raw.len(),
            needed: HEADER_LEN - raw.len(),
        });
    }
    let version = u16::from_le_bytes([raw[4], raw[5]]);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Iterator over the frames following the header.
struct FrameIter {
    buf: Bytes,
    offset: usize,
    filter: Option<FilterSpec>,
    done: bool,
}

impl FrameIter {
    fn next_frame(&mut self) -> Option<Result<NativeMessage, DecodeError>> {
        loop {
            if self.buf.is_empty() {
                return None;
            }
            let offset = self.offset;
            if self.buf.len() < LEN_PREFIX {
                return Some(Err(DecodeError::Truncated {
                    offset,
                    needed: LEN_PREFIX - self.buf.len(),
                }));
            }

            let mut len_bytes = [0u8; LEN_PREFIX];
            len_bytes.copy_from_slice(&self.buf[..LEN_PREFIX]);
            let body_len = u32::from_le_bytes(len_bytes) as usize;
            if body_len > MAX_FRAME_SIZE {
                return Some(Err(DecodeError::FrameTooLarge(body_len)));
            }
            if self.buf.len() < LEN_PREFIX + body_len {
                return Some(Err(DecodeError::Truncated {
                    offset,
                    needed: LEN_PREFIX + body_len - self.buf.len(),
                }));
            }

            let frame = self.buf.split_to(LEN_PREFIX + body_len);
            self.offset += frame.len();

            let (type_id, timestamp, payload_at) = match read_head(&frame[LEN_PREFIX..], offset) {
                Ok(head) => head,
                Err(e) => return Some(Err(e)),
            };

            if let Some(spec) = &self.filter {
                if !spec.matches(&type_id, timestamp) {
                    continue;
                }
            }

            let payload_bytes = &frame[LEN_PREFIX + payload_at..];
            return Some(read_payload(payload_bytes, offset).map(|payload| NativeMessage {
                type_id,
                timestamp,
                payload,
                frame,
            }));
        }
    }
}

impl Iterator for FrameIter {
    type Item = Result<NativeMessage, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_frame();
        if matches!(item, Some(Err(_)) | None) {
            self.done = true;
        }
        item
    }
}

/// Parse type id and timestamp. Returns the body offset of the payload.
fn read_head(body: &[u8], offset: usize) -> Result<(String, DateTime<Utc>, usize), DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidFrame {
        offset,
        reason: reason.to_string(),
    };

    let mut cur = body;
    if cur.remaining() < 2 {
        return Err(invalid("missing type id length"));
    }
    let type_len = cur.get_u16_le() as usize;
    if cur.remaining() < type_len + 8 {
        return Err(invalid("frame shorter than its head"));
    }
    let type_id = std::str::from_utf8(&cur[..type_len])
        .map_err(|_| invalid("type id is not UTF-8"))?
        .to_string();
    cur.advance(type_len);
    let micros = cur.get_i64_le();
    let timestamp =
        DateTime::from_timestamp_micros(micros).ok_or_else(|| invalid("timestamp out of range"))?;

    Ok((type_id, timestamp, body.len() - cur.remaining()))
}

fn read_payload(bytes: &[u8], offset: usize) -> Result<Option<Payload>, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|source| DecodeError::Payload { offset, source })?;
    match value {
        Value::Null => Ok(None),
        Value::Object(obj) => Payload::from_json(obj)
            .map(Some)
            .map_err(|source| DecodeError::Payload { offset, source }),
        _ => Err(DecodeError::InvalidFrame {
            offset,
            reason: "payload is neither an object nor null".to_string(),
        }),
    }
}

/// Incremental builder for framed captures.
#[derive(Debug)]
pub struct FramedWriter {
    buf: BytesMut,
}

impl Default for FramedWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FramedWriter {
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(0);
        Self { buf }
    }

    /// Serialize and append one message.
    pub fn push(
        &mut self,
        type_id: &str,
        timestamp: DateTime<Utc>,
        payload: Option<&Payload>,
    ) -> Result<&mut Self, DecodeError> {
        let payload_json = match payload {
            Some(p) => p.to_json().to_string(),
            None => Value::Null.to_string(),
        };
        if type_id.len() > u16::MAX as usize {
            return Err(DecodeError::InvalidFrame {
                offset: self.buf.len(),
                reason: "type id longer than 65535 bytes".to_string(),
            });
        }
        let body_len = 2 + type_id.len() + 8 + payload_json.len();
        if body_len > MAX_FRAME_SIZE {
            return Err(DecodeError::FrameTooLarge(body_len));
        }

        self.buf.reserve(LEN_PREFIX + body_len);
        self.buf.put_u32_le(body_len as u32);
        self.buf.put_u16_le(type_id.len() as u16);
        self.buf.put_slice(type_id.as_bytes());
        self.buf.put_i64_le(timestamp.timestamp_micros());
        self.buf.put_slice(payload_json.as_bytes());
        Ok(self)
    }

    /// Append an already encoded frame, length prefix included.
    pub fn push_frame(&mut self, frame: &[u8]) -> &mut Self {
        self.buf.put_slice(frame);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
