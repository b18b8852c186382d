//! Consumers of decoded blocks.
//!
//! The decoder reports every block through [`BlockSink`]: `on_header`
//! followed by `on_data`, exactly once each, in stream order.  Both methods
//! default to doing nothing, so a sink only implements what it needs.
//!
//! The payload passed to `on_data` borrows the decoder's read buffer, which
//! is reused for the next block.  Copy it to keep it.

mod dump;

pub use dump::{DirectoryStore, DumpingSink, ModuleStore};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::block::parse_timestamp;
use crate::error::ParseError;
use crate::module_type::ModuleId;

/// Header fields surfaced to a sink.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEvent<'a> {
    /// Stream offset of the block magic.
    pub offset:        u64,
    pub unlock_code:   &'a [u8; 8],
    pub module_id:     ModuleId,
    pub date:          &'a str,
    pub time:          &'a str,
    pub display_name:  &'a str,
    pub block_size:    u16,
    pub block_size_hw: u16,
    pub data_len:      u32,
    /// Uninterpreted header tail; empty when `header_len` is the minimum.
    pub extra_header:  &'a [u8],
}

pub trait BlockSink {
    fn on_header(&mut self, _header: &HeaderEvent<'_>) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_data(&mut self, _payload: &[u8]) -> Result<(), ParseError> {
        Ok(())
    }
}

impl<S: BlockSink + ?Sized> BlockSink for &mut S {
    fn on_header(&mut self, header: &HeaderEvent<'_>) -> Result<(), ParseError> {
        (**self).on_header(header)
    }

    fn on_data(&mut self, payload: &[u8]) -> Result<(), ParseError> {
        (**self).on_data(payload)
    }
}

/// Discards every block.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BlockSink for NullSink {}

// ── CollectingSink ───────────────────────────────────────────────────────────

/// One block as recorded by [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectedBlock {
    pub offset:        u64,
    #[serde(serialize_with = "serialize_module_id")]
    pub module_id:     ModuleId,
    /// Table name for `module_id`, if it is a known code.
    pub module_type:   Option<&'static str>,
    pub date:          String,
    pub time:          String,
    pub display_name:  String,
    pub block_size:    u16,
    pub block_size_hw: u16,
    pub data_len:      u32,
    pub extra_header_len: usize,
    #[serde(skip)]
    pub payload:       Option<Vec<u8>>,
}

impl CollectedBlock {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.date, &self.time)
    }
}

/// Records every block in memory.  Payload bytes are kept only when built
/// with [`CollectingSink::with_payloads`].
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub blocks:    Vec<CollectedBlock>,
    keep_payloads: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payloads() -> Self {
        Self { blocks: Vec::new(), keep_payloads: true }
    }
}

impl BlockSink for CollectingSink {
    fn on_header(&mut self, header: &HeaderEvent<'_>) -> Result<(), ParseError> {
        self.blocks.push(CollectedBlock {
            offset:           header.offset,
            module_id:        header.module_id,
            module_type:      header.module_id.module_type().map(|m| m.name()),
            date:             header.date.to_owned(),
            time:             header.time.to_owned(),
            display_name:     header.display_name.to_owned(),
            block_size:       header.block_size,
            block_size_hw:    header.block_size_hw,
            data_len:         header.data_len,
            extra_header_len: header.extra_header.len(),
            payload:          None,
        });
        Ok(())
    }

    fn on_data(&mut self, payload: &[u8]) -> Result<(), ParseError> {
        if self.keep_payloads {
            if let Some(last) = self.blocks.last_mut() {
                last.payload = Some(payload.to_vec());
            }
        }
        Ok(())
    }
}

fn serialize_module_id<S: serde::Serializer>(id: &ModuleId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event<'a>(display_name: &'a str, module_id: [u8; 4]) -> HeaderEvent<'a> {
        HeaderEvent {
            offset:        92,
            unlock_code:   &crate::block::UNLOCK_CODE,
            module_id:     ModuleId(module_id),
            date:          "2017.05.12",
            time:          "10.17.04",
            display_name,
            block_size:    0x1000,
            block_size_hw: 0x0200,
            data_len:      3,
            extra_header:  &[],
        }
    }

    #[test]
    fn null_sink_accepts_everything() {
        let mut sink = NullSink;
        sink.on_header(&event("anything", [9, 9, 9, 9])).unwrap();
        sink.on_data(b"abc").unwrap();
    }

    #[test]
    fn collecting_sink_keeps_payloads_on_request() {
        let mut plain = CollectingSink::new();
        let mut full = CollectingSink::with_payloads();
        for sink in [&mut plain, &mut full] {
            sink.on_header(&event("BOOT", [0, 0, 0, 0xFC])).unwrap();
            sink.on_data(b"abc").unwrap();
        }
        assert_eq!(plain.blocks[0].payload, None);
        assert_eq!(full.blocks[0].payload.as_deref(), Some(&b"abc"[..]));
        assert_eq!(full.blocks[0].module_type, Some("BOOT"));
        assert_eq!(full.blocks[0].timestamp().unwrap().to_string(), "2017-05-12 10:17:04");
    }

    #[test]
    fn collected_block_serializes_without_payload() {
        let mut sink = CollectingSink::with_payloads();
        sink.on_header(&event("BOOT", [0, 0, 0, 0xFC])).unwrap();
        sink.on_data(b"abc").unwrap();
        let json = serde_json::to_value(&sink.blocks[0]).unwrap();
        assert_eq!(json["module_id"], "0x000000fc");
        assert_eq!(json["module_type"], "BOOT");
        assert!(json.get("payload").is_none());
    }
}
