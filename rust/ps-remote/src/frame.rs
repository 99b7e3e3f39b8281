//! Length-delimited framing (u32 little-endian length prefix).

use std::io::{Read, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large: {len} > {max}")]
    TooLarge { len: u32, max: u32 },
    #[error("unexpected EOF while reading frame")]
    UnexpectedEof,
    #[error("peer closed the channel")]
    Closed,
}

pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len: u32 = payload.len().try_into().map_err(|_| FrameError::TooLarge {
        len: u32::MAX,
        max: MAX_FRAME_LEN,
    })?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    w.write_all(&len.to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed cleanly between frames.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len_bytes = [0u8; 4];
    match read_exact_or_eof(r, &mut len_bytes)? {
        0 => return Ok(None),
        n if n < len_bytes.len() => return Err(FrameError::UnexpectedEof),
        _ => {}
    }
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len as usize];
    if read_exact_or_eof(r, &mut payload)? < payload.len() {
        return Err(FrameError::UnexpectedEof);
    }
    Ok(Some(payload))
}

/// Fill `buf`, returning how many bytes arrived before EOF.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, FrameError> {
    let mut off = 0usize;
    while off < buf.len() {
        match r.read(&mut buf[off..]) {
            Ok(0) => break,
            Ok(n) => off += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(off)
}
