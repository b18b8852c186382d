//! Block header layout.
//!
//! ```text
//! offset  size  field
//!      0     4  magic          55 AA 5A A5
//!      4     4  header_len     u32 LE, >= HEADER_LEN_BASE
//!      8     4  tag            01 00 00 00
//!     12     8  unlock_code    "HW8953" FF FF
//!     20     4  module_id      raw type code
//!     24     4  data_len       u32 LE
//!     28    16  date           zero-padded text
//!     44    16  time           zero-padded text
//!     60    32  display_name   zero-padded text
//!     92     2  unknown_a      opaque
//!     94     2  block_size     u16 LE
//!     96     2  block_size_hw  u16 LE
//!     98     2  unknown_b      opaque
//!    100     *  extra header   header_len - HEADER_LEN_BASE bytes
//! ```
//!
//! The payload (`data_len` bytes) follows the extra header, then 0-3 zero
//! bytes so that `data_len + extra_header_len` is padded to a multiple of 4.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ParseError;
use crate::module_type::{ModuleId, ModuleType};

pub const BLOCK_MAGIC: [u8; 4] = [0x55, 0xAA, 0x5A, 0xA5];
pub const HEADER_TAG:  [u8; 4] = [0x01, 0x00, 0x00, 0x00];
pub const UNLOCK_CODE: [u8; 8] = *b"HW8953\xff\xff";

/// Bytes of fixed-layout header, magic included.
pub const FIXED_HEADER_SIZE: usize = 100;
/// Smallest legal `header_len`; anything above it is the extra header.
pub const HEADER_LEN_BASE: u32 = 86;

pub const DATE_LEN: usize = 16;
pub const TIME_LEN: usize = 16;
pub const DISPLAY_NAME_LEN: usize = 32;

const DATE_OFFSET: u64 = 28;
const TIME_OFFSET: u64 = 44;
const DISPLAY_NAME_OFFSET: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub header_len:    u32,
    pub unlock_code:   [u8; 8],
    pub module_id:     ModuleId,
    pub data_len:      u32,
    pub date:          String,
    pub time:          String,
    pub display_name:  String,
    pub unknown_a:     [u8; 2],
    pub block_size:    u16,
    pub block_size_hw: u16,
    pub unknown_b:     [u8; 2],
}

impl BlockHeader {
    /// A header for `module` with no extra header, the canonical display
    /// name, and empty date/time strings.
    pub fn for_module(module: ModuleType, data_len: u32) -> Self {
        Self {
            header_len:    HEADER_LEN_BASE,
            unlock_code:   UNLOCK_CODE,
            module_id:     module.into(),
            data_len,
            date:          String::new(),
            time:          String::new(),
            display_name:  module.name().to_owned(),
            unknown_a:     [0; 2],
            block_size:    0,
            block_size_hw: 0,
            unknown_b:     [0; 2],
        }
    }

    /// Decode and validate the fixed part of a header.  `offset` is the
    /// stream position of the magic and is only used for diagnostics.
    pub fn decode(raw: &[u8; FIXED_HEADER_SIZE], offset: u64) -> Result<Self, ParseError> {
        if raw[..4] != BLOCK_MAGIC {
            return Err(ParseError::BadMagic { offset, found: hex::encode(&raw[..4]) });
        }
        let mut r = &raw[4..];

        let header_len = r.read_u32::<LittleEndian>()?;

        let mut tag = [0u8; 4];
        r.read_exact(&mut tag)?;
        if tag != HEADER_TAG {
            return Err(ParseError::FieldMismatch {
                offset:   offset + 8,
                field:    "tag",
                expected: hex::encode(HEADER_TAG),
                found:    hex::encode(tag),
            });
        }

        let mut unlock_code = [0u8; 8];
        r.read_exact(&mut unlock_code)?;
        if unlock_code != UNLOCK_CODE {
            return Err(ParseError::FieldMismatch {
                offset:   offset + 12,
                field:    "unlock code",
                expected: hex::encode(UNLOCK_CODE),
                found:    hex::encode(unlock_code),
            });
        }

        let mut module_id = [0u8; 4];
        r.read_exact(&mut module_id)?;
        let data_len = r.read_u32::<LittleEndian>()?;

        let mut date = [0u8; DATE_LEN];
        let mut time = [0u8; TIME_LEN];
        let mut display_name = [0u8; DISPLAY_NAME_LEN];
        r.read_exact(&mut date)?;
        r.read_exact(&mut time)?;
        r.read_exact(&mut display_name)?;

        let mut unknown_a = [0u8; 2];
        r.read_exact(&mut unknown_a)?;
        let block_size = r.read_u16::<LittleEndian>()?;
        let block_size_hw = r.read_u16::<LittleEndian>()?;
        let mut unknown_b = [0u8; 2];
        r.read_exact(&mut unknown_b)?;

        if header_len < HEADER_LEN_BASE {
            return Err(ParseError::HeaderTooSmall {
                offset: offset + 4,
                header_len,
                minimum: HEADER_LEN_BASE,
            });
        }

        Ok(Self {
            header_len,
            unlock_code,
            module_id: ModuleId(module_id),
            data_len,
            date:         decode_str(&date, "date", offset + DATE_OFFSET)?,
            time:         decode_str(&time, "time", offset + TIME_OFFSET)?,
            display_name: decode_str(&display_name, "display name", offset + DISPLAY_NAME_OFFSET)?,
            unknown_a,
            block_size,
            block_size_hw,
            unknown_b,
        })
    }

    /// Encode the fixed part of the header.  The tag is always written as
    /// [`HEADER_TAG`]; string fields longer than their slot are rejected.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&BLOCK_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.header_len)?;
        writer.write_all(&HEADER_TAG)?;
        writer.write_all(&self.unlock_code)?;
        writer.write_all(self.module_id.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.data_len)?;
        write_str(&mut writer, &self.date, DATE_LEN)?;
        write_str(&mut writer, &self.time, TIME_LEN)?;
        write_str(&mut writer, &self.display_name, DISPLAY_NAME_LEN)?;
        writer.write_all(&self.unknown_a)?;
        writer.write_u16::<LittleEndian>(self.block_size)?;
        writer.write_u16::<LittleEndian>(self.block_size_hw)?;
        writer.write_all(&self.unknown_b)?;
        Ok(())
    }

    pub fn extra_header_len(&self) -> u32 {
        self.header_len.saturating_sub(HEADER_LEN_BASE)
    }

    /// Number of zero bytes following this block's payload.
    pub fn pad_len(&self) -> usize {
        alignment_pad(self.data_len, self.extra_header_len())
    }

    /// Build timestamp from the `YYYY.MM.DD` date and `HH.MM.SS` time
    /// strings.  `None` when either is empty or in another format.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.date, &self.time)
    }
}

/// Combine header date and time strings (`YYYY.MM.DD`, `HH.MM.SS`).
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, "%Y.%m.%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H.%M.%S").ok()?;
    Some(date.and_time(time))
}

/// Pad needed after `data_len` payload bytes and `extra_header_len` extra
/// header bytes.  Always in `0..=3`.
pub fn alignment_pad(data_len: u32, extra_header_len: u32) -> usize {
    let region = data_len as u64 + extra_header_len as u64;
    ((4 - region % 4) % 4) as usize
}

/// Write one complete block: header, extra header, payload and zero pad.
///
/// `header.header_len` and `header.data_len` must agree with the lengths of
/// `extra_header` and `payload`.
pub fn write_block<W: Write>(
    mut writer:   W,
    header:       &BlockHeader,
    extra_header: &[u8],
    payload:      &[u8],
) -> io::Result<()> {
    if header.extra_header_len() as usize != extra_header.len()
        || header.header_len < HEADER_LEN_BASE
    {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!(
            "header_len {} does not cover {} extra header bytes",
            header.header_len, extra_header.len()
        )));
    }
    if header.data_len as usize != payload.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!(
            "data_len {} does not match payload of {} bytes",
            header.data_len, payload.len()
        )));
    }
    header.write(&mut writer)?;
    writer.write_all(extra_header)?;
    writer.write_all(payload)?;
    writer.write_all(&[0u8; 3][..header.pad_len()])?;
    Ok(())
}

/// Fill `buf` from `reader`, stopping early only at end of stream.  Returns
/// the number of bytes read.
pub(crate) fn read_full<R: Read>(mut reader: R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn decode_str(raw: &[u8], field: &'static str, offset: u64) -> Result<String, ParseError> {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    std::str::from_utf8(&raw[..end])
        .map(str::to_owned)
        .map_err(|source| ParseError::Encoding { offset, field, source })
}

fn write_str<W: Write>(mut writer: W, s: &str, width: usize) -> io::Result<()> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, format!(
            "{s:?} does not fit in a {width}-byte field"
        )));
    }
    writer.write_all(bytes)?;
    writer.write_all(&vec![0u8; width - bytes.len()])
}
