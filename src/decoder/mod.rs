//! Sequential block-stream decoder.
//!
//! # State machine
//! ```text
//! Start ──leading pad──▶ ReadHeader ──block──▶ ReadHeader ... ──EOF──▶ Done
//!   │                         │
//!   └──────── any error ──────┴──▶ Failed
//! ```
//!
//! [`BlockStreamDecoder::step`] decodes one whole block (header, extra
//! header, payload and alignment pad) before handing anything to the sink,
//! so a truncated or malformed block is never partially delivered.  The
//! stream may only end at a block boundary: a zero-byte read where the next
//! magic would start.
//!
//! There is no resynchronisation.  The first error moves the decoder to
//! `Failed` and every later step returns [`ParseError::Aborted`].

use std::io::Read;

use log::{debug, info, trace};

use crate::block::{read_full, BlockHeader, BLOCK_MAGIC, FIXED_HEADER_SIZE};
use crate::error::ParseError;
use crate::leading_pad::{read_leading_pad, LEADING_PAD_SIZE};
use crate::module_type::ModuleId;
use crate::sink::{BlockSink, HeaderEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Leading pad not yet consumed.
    Start,
    /// Positioned at a block boundary.
    ReadHeader,
    /// Clean end of stream reached.
    Done,
    /// A previous step failed.
    Failed,
}

/// Layout of one decoded block, as returned by [`BlockStreamDecoder::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset:           u64,
    pub module_id:        ModuleId,
    pub header_len:       u32,
    pub data_len:         u32,
    pub extra_header_len: u32,
    pub pad_len:          usize,
}

impl BlockInfo {
    /// Total bytes this block occupies in the stream.
    pub fn encoded_len(&self) -> u64 {
        FIXED_HEADER_SIZE as u64
            + self.extra_header_len as u64
            + self.data_len as u64
            + self.pad_len as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Block(BlockInfo),
    End,
}

/// Totals reported by [`BlockStreamDecoder::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseSummary {
    pub blocks:        usize,
    pub payload_bytes: u64,
    pub stream_bytes:  u64,
}

pub struct BlockStreamDecoder<R: Read> {
    reader:  R,
    state:   DecoderState,
    offset:  u64,
    blocks:  usize,
    payload: Vec<u8>,
    extra:   Vec<u8>,
}

impl<R: Read> BlockStreamDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state:   DecoderState::Start,
            offset:  0,
            blocks:  0,
            payload: Vec::new(),
            extra:   Vec::new(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Bytes consumed from the stream so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn blocks_decoded(&self) -> usize {
        self.blocks
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode the next block and report it to `sink`.  Returns
    /// [`Step::End`] once the stream is exhausted at a block boundary.
    pub fn step<S: BlockSink + ?Sized>(&mut self, sink: &mut S) -> Result<Step, ParseError> {
        match self.state {
            DecoderState::Done   => return Ok(Step::End),
            DecoderState::Failed => return Err(ParseError::Aborted { offset: self.offset }),
            DecoderState::Start | DecoderState::ReadHeader => {}
        }
        let result = self.advance(sink);
        match &result {
            Ok(Step::End) => self.state = DecoderState::Done,
            Ok(Step::Block(_)) => {}
            Err(_) => self.state = DecoderState::Failed,
        }
        result
    }

    /// Decode every remaining block.
    pub fn run<S: BlockSink + ?Sized>(&mut self, sink: &mut S) -> Result<ParseSummary, ParseError> {
        let mut summary = ParseSummary::default();
        while let Step::Block(block) = self.step(sink)? {
            summary.blocks += 1;
            summary.payload_bytes += block.data_len as u64;
        }
        summary.stream_bytes = self.offset;
        info!("decoded {} block(s), {} bytes", summary.blocks, summary.stream_bytes);
        Ok(summary)
    }

    fn advance<S: BlockSink + ?Sized>(&mut self, sink: &mut S) -> Result<Step, ParseError> {
        if self.state == DecoderState::Start {
            read_leading_pad(&mut self.reader, self.offset)?;
            self.offset += LEADING_PAD_SIZE as u64;
            self.state = DecoderState::ReadHeader;
        }

        let block_offset = self.offset;
        let mut raw = [0u8; FIXED_HEADER_SIZE];

        let got = read_full(&mut self.reader, &mut raw[..4])?;
        if got == 0 {
            debug!("end of stream at {block_offset:#x}");
            return Ok(Step::End);
        }
        if got < 4 {
            return Err(truncated(block_offset, "block header", FIXED_HEADER_SIZE, got));
        }
        if raw[..4] != BLOCK_MAGIC {
            return Err(ParseError::BadMagic { offset: block_offset, found: hex::encode(&raw[..4]) });
        }
        let got = read_full(&mut self.reader, &mut raw[4..])?;
        if got < FIXED_HEADER_SIZE - 4 {
            return Err(truncated(block_offset, "block header", FIXED_HEADER_SIZE, got + 4));
        }
        self.offset += FIXED_HEADER_SIZE as u64;

        let header = BlockHeader::decode(&raw, block_offset)?;
        debug!("header_len = {}", header.header_len);
        debug!("module_id = {}", header.module_id);
        debug!("data_len = {:#010x}", header.data_len);
        debug!("date = {:?}, time = {:?}", header.date, header.time);
        debug!("display_name = {:?}", header.display_name);
        debug!("unknown_a = {}", hex::encode(header.unknown_a));
        debug!("block_size = {:#06x}", header.block_size);
        debug!("block_size_hw = {:#06x}", header.block_size_hw);
        debug!("unknown_b = {}", hex::encode(header.unknown_b));

        let extra_len = header.extra_header_len();
        self.read_exact_into_extra(extra_len)?;
        self.read_payload(header.data_len)?;
        let pad_len = header.pad_len();
        self.read_alignment_pad(pad_len)?;

        let event = HeaderEvent {
            offset:        block_offset,
            unlock_code:   &header.unlock_code,
            module_id:     header.module_id,
            date:          &header.date,
            time:          &header.time,
            display_name:  &header.display_name,
            block_size:    header.block_size,
            block_size_hw: header.block_size_hw,
            data_len:      header.data_len,
            extra_header:  &self.extra,
        };
        sink.on_header(&event)?;
        sink.on_data(&self.payload)?;

        self.blocks += 1;
        info!(
            "block {} at {:#x}: {} ({}), {} bytes",
            self.blocks, block_offset, header.display_name, header.module_id, header.data_len
        );

        Ok(Step::Block(BlockInfo {
            offset:           block_offset,
            module_id:        header.module_id,
            header_len:       header.header_len,
            data_len:         header.data_len,
            extra_header_len: extra_len,
            pad_len,
        }))
    }

    fn read_exact_into_extra(&mut self, len: u32) -> Result<(), ParseError> {
        if len > 0 {
            debug!("extra_header_len = {len}");
        }
        let start = self.offset;
        let got = read_into(&mut self.reader, &mut self.extra, len)?;
        self.offset += got;
        if got < len as u64 {
            return Err(truncated(start, "extra header", len as usize, got as usize));
        }
        Ok(())
    }

    fn read_payload(&mut self, len: u32) -> Result<(), ParseError> {
        let start = self.offset;
        let got = read_into(&mut self.reader, &mut self.payload, len)?;
        self.offset += got;
        if got < len as u64 {
            return Err(truncated(start, "payload", len as usize, got as usize));
        }
        Ok(())
    }

    fn read_alignment_pad(&mut self, len: usize) -> Result<(), ParseError> {
        if len == 0 {
            return Ok(());
        }
        trace!("skipping {len} byte(s) of alignment pad at {:#x}", self.offset);
        let start = self.offset;
        let mut pad = [0u8; 3];
        let got = read_full(&mut self.reader, &mut pad[..len])?;
        self.offset += got as u64;
        if got < len {
            return Err(truncated(start, "alignment pad", len, got));
        }
        if pad[..len].iter().any(|&b| b != 0) {
            return Err(ParseError::BadAlignmentPad { offset: start, found: hex::encode(&pad[..len]) });
        }
        Ok(())
    }
}

/// Replace the contents of `buf` with up to `len` bytes from `reader`.  The
/// buffer grows only as bytes arrive, so a huge declared length on a short
/// stream does not allocate up front.
fn read_into<R: Read>(reader: &mut R, buf: &mut Vec<u8>, len: u32) -> Result<u64, ParseError> {
    buf.clear();
    let got = reader.by_ref().take(len as u64).read_to_end(buf)?;
    Ok(got as u64)
}

fn truncated(offset: u64, what: &'static str, expected: usize, got: usize) -> ParseError {
    ParseError::Truncated { offset, what, expected: expected as u64, got: got as u64 }
}
