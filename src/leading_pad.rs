use std::io::{self, Read, Write};

use crate::block::read_full;
use crate::error::ParseError;

/// Size of the zero-filled region that precedes the first block.
pub const LEADING_PAD_SIZE: usize = 92;

/// Consume the leading pad, failing on a short read or any non-zero byte.
/// `offset` is the stream position of the first pad byte.
pub fn read_leading_pad<R: Read>(mut reader: R, offset: u64) -> Result<(), ParseError> {
    let mut pad = [0u8; LEADING_PAD_SIZE];
    let got = read_full(&mut reader, &mut pad)?;
    if got < LEADING_PAD_SIZE {
        return Err(ParseError::Truncated {
            offset,
            what:     "leading pad",
            expected: LEADING_PAD_SIZE as u64,
            got:      got as u64,
        });
    }
    if let Some(pos) = pad.iter().position(|&b| b != 0) {
        return Err(ParseError::BadLeadingPad { offset: offset + pos as u64 });
    }
    Ok(())
}

pub fn write_leading_pad<W: Write>(mut writer: W) -> io::Result<()> {
    writer.write_all(&[0u8; LEADING_PAD_SIZE])
}
