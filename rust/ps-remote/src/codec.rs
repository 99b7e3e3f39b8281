//! Binary codec for protocol v1 (payload inside a length-delimited frame).
//!
//! Header (16 bytes): `u32 version | u8 kind | u8 code | u16 reserved | u64 request_id`.
//! `code` is the [`OpCode`] of a request or the [`ResponseTag`] of a response.
//! Integers and floats are little-endian; vectors are `u32 len` + elements;
//! booleans are a single `0`/`1` byte.

use thiserror::Error;

use ps_core::{BetSizeSchedule, SolverConfig, VariantKind};
use ps_session::{SessionInfo, SessionState};

use crate::protocol::{
    FailureKind, MsgKind, OpCode, RemoteFailure, Request, Response, ResponseTag, PROTOCOL_VERSION,
};

pub const HEADER_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload too short")]
    TooShort,
    #[error("unsupported protocol version: {0}")]
    BadVersion(u32),
    #[error("unexpected message kind: {0}")]
    BadKind(u8),
    #[error("unknown op code: {0}")]
    BadOp(u8),
    #[error("unknown response tag: {0}")]
    BadTag(u8),
    #[error("invalid boolean byte in {field}: {value}")]
    BadBool { field: &'static str, value: u8 },
    #[error("invalid {field} code: {value}")]
    BadEnum { field: &'static str, value: u8 },
    #[error("string is not valid utf-8")]
    BadUtf8,
    #[error("{0} trailing bytes after message")]
    Trailing(usize),
}

fn put_header(out: &mut Vec<u8>, kind: MsgKind, code: u8, request_id: u64) {
    out.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    out.push(kind as u8);
    out.push(code);
    out.extend_from_slice(&[0, 0]); // reserved
    out.extend_from_slice(&request_id.to_le_bytes());
}

fn put_f32s(out: &mut Vec<u8>, v: &[f32]) {
    out.extend_from_slice(&(v.len() as u32).to_le_bytes());
    for &f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Append a `SolverConfig` in engine argument order.
pub fn encode_solver_config_into(out: &mut Vec<u8>, config: &SolverConfig) {
    put_f32s(out, &config.oop_range);
    put_f32s(out, &config.ip_range);
    out.extend_from_slice(&(config.board.len() as u32).to_le_bytes());
    out.extend_from_slice(&config.board);
    out.extend_from_slice(&config.starting_pot.to_le_bytes());
    out.extend_from_slice(&config.effective_stack.to_le_bytes());
    for list in config.size_lists() {
        put_f32s(out, list);
    }
    out.extend_from_slice(&config.add_allin_threshold.to_le_bytes());
    out.extend_from_slice(&config.force_allin_threshold.to_le_bytes());
    out.push(config.adjust_last_two_bet_sizes as u8);
}

pub fn encode_request(request_id: u64, req: &Request) -> Vec<u8> {
    let mut out = Vec::new();
    encode_request_into(&mut out, request_id, req);
    out
}

pub fn encode_request_into(out: &mut Vec<u8>, request_id: u64, req: &Request) {
    out.clear();
    put_header(out, MsgKind::Request, req.op() as u8, request_id);
    match req {
        Request::Bootstrap { thread_count } => out.extend_from_slice(&thread_count.to_le_bytes()),
        Request::Init(config) => encode_solver_config_into(out, config),
        Request::MemoryUsage { enable_compression }
        | Request::AllocateMemory { enable_compression } => out.push(*enable_compression as u8),
        Request::Iterate { iteration } => out.extend_from_slice(&iteration.to_le_bytes()),
        Request::GetHandle | Request::Exploitability | Request::Ev | Request::Finalize => {}
    }
}

/// `request_id` of a payload whose header is intact, even if the body is not.
pub fn peek_request_id(bytes: &[u8]) -> Option<u64> {
    let b = bytes.get(8..HEADER_LEN)?;
    Some(u64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

pub fn decode_request(bytes: &[u8]) -> Result<(u64, Request), DecodeError> {
    let mut c = Cursor::new(bytes);
    let (code, request_id) = c.read_header(MsgKind::Request)?;
    let op = OpCode::from_u8(code).ok_or(DecodeError::BadOp(code))?;
    let req = match op {
        OpCode::Bootstrap => Request::Bootstrap {
            thread_count: c.read_u32()?,
        },
        OpCode::GetHandle => Request::GetHandle,
        OpCode::Init => Request::Init(c.read_solver_config()?),
        OpCode::MemoryUsage => Request::MemoryUsage {
            enable_compression: c.read_bool("enable_compression")?,
        },
        OpCode::AllocateMemory => Request::AllocateMemory {
            enable_compression: c.read_bool("enable_compression")?,
        },
        OpCode::Iterate => Request::Iterate {
            iteration: c.read_u32()?,
        },
        OpCode::Exploitability => Request::Exploitability,
        OpCode::Ev => Request::Ev,
        OpCode::Finalize => Request::Finalize,
    };
    c.finish()?;
    Ok((request_id, req))
}

pub fn encode_response(request_id: u64, resp: &Response) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 16);
    put_header(&mut out, MsgKind::Response, resp.tag() as u8, request_id);
    match resp {
        Response::Unit => {}
        Response::Handle(info) => {
            out.extend_from_slice(&info.session_id.to_le_bytes());
            out.push(variant_code(info.variant));
            out.extend_from_slice(&info.thread_count.to_le_bytes());
            out.push(state_code(info.state));
            put_str(&mut out, &info.variant_name);
        }
        Response::Bytes(n) => out.extend_from_slice(&n.to_le_bytes()),
        Response::Scalar(x) => out.extend_from_slice(&x.to_le_bytes()),
        Response::Values(v) => put_f32s(&mut out, v),
        Response::Error(f) => {
            out.push(f.kind as u8);
            put_str(&mut out, &f.message);
        }
    }
    out
}

pub fn decode_response(bytes: &[u8]) -> Result<(u64, Response), DecodeError> {
    let mut c = Cursor::new(bytes);
    let (code, request_id) = c.read_header(MsgKind::Response)?;
    let tag = ResponseTag::from_u8(code).ok_or(DecodeError::BadTag(code))?;
    let resp = match tag {
        ResponseTag::Unit => Response::Unit,
        ResponseTag::Handle => {
            let session_id = c.read_u64()?;
            let variant = c.read_u8()?;
            let variant = variant_from_code(variant).ok_or(DecodeError::BadEnum {
                field: "variant",
                value: variant,
            })?;
            let thread_count = c.read_u32()?;
            let state = c.read_u8()?;
            let state = state_from_code(state).ok_or(DecodeError::BadEnum {
                field: "state",
                value: state,
            })?;
            let variant_name = c.read_string()?;
            Response::Handle(SessionInfo {
                session_id,
                variant,
                variant_name,
                thread_count,
                state,
            })
        }
        ResponseTag::Bytes => Response::Bytes(c.read_u64()?),
        ResponseTag::Scalar => Response::Scalar(c.read_f32()?),
        ResponseTag::Values => Response::Values(c.read_f32_vec()?),
        ResponseTag::Error => {
            let kind = c.read_u8()?;
            let kind = FailureKind::from_u8(kind).ok_or(DecodeError::BadEnum {
                field: "failure kind",
                value: kind,
            })?;
            Response::Error(RemoteFailure {
                kind,
                message: c.read_string()?,
            })
        }
    };
    c.finish()?;
    Ok((request_id, resp))
}

fn variant_code(v: VariantKind) -> u8 {
    match v {
        VariantKind::Baseline => 0,
        VariantKind::Accelerated => 1,
    }
}

fn variant_from_code(b: u8) -> Option<VariantKind> {
    match b {
        0 => Some(VariantKind::Baseline),
        1 => Some(VariantKind::Accelerated),
        _ => None,
    }
}

fn state_code(s: SessionState) -> u8 {
    match s {
        SessionState::Uninitialized => 0,
        SessionState::Configured => 1,
        SessionState::Allocated => 2,
        SessionState::Solving => 3,
        SessionState::Finalized => 4,
    }
}

fn state_from_code(b: u8) -> Option<SessionState> {
    Some(match b {
        0 => SessionState::Uninitialized,
        1 => SessionState::Configured,
        2 => SessionState::Allocated,
        3 => SessionState::Solving,
        4 => SessionState::Finalized,
        _ => return None,
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, off: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.off
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::TooShort);
        }
        let s = &self.bytes[self.off..self.off + n];
        self.off += n;
        Ok(s)
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::Trailing(n)),
        }
    }

    fn read_header(&mut self, expected: MsgKind) -> Result<(u8, u64), DecodeError> {
        let version = self.read_u32()?;
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::BadVersion(version));
        }
        let kind = self.read_u8()?;
        if kind != expected as u8 {
            return Err(DecodeError::BadKind(kind));
        }
        let code = self.read_u8()?;
        self.take(2)?;
        let request_id = self.read_u64()?;
        Ok((code, request_id))
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::BadBool { field, value }),
        }
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Length is checked against the remaining bytes before allocating.
    fn read_f32_vec(&mut self) -> Result<Vec<f32>, DecodeError> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len.checked_mul(4).ok_or(DecodeError::TooShort)?)?;
        Ok(raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn read_byte_vec(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        String::from_utf8(self.read_byte_vec()?).map_err(|_| DecodeError::BadUtf8)
    }

    fn read_solver_config(&mut self) -> Result<SolverConfig, DecodeError> {
        let oop_range = self.read_f32_vec()?;
        let ip_range = self.read_f32_vec()?;
        let board = self.read_byte_vec()?;
        let starting_pot = self.read_i32()?;
        let effective_stack = self.read_i32()?;
        let mut lists: [Vec<f32>; 12] = Default::default();
        for list in lists.iter_mut() {
            *list = self.read_f32_vec()?;
        }
        let add_allin_threshold = self.read_f64()?;
        let force_allin_threshold = self.read_f64()?;
        let adjust_last_two_bet_sizes = self.read_bool("adjust_last_two_bet_sizes")?;
        Ok(SolverConfig {
            oop_range,
            ip_range,
            board,
            starting_pot,
            effective_stack,
            bet_sizes: BetSizeSchedule::from_lists(lists),
            add_allin_threshold,
            force_allin_threshold,
            adjust_last_two_bet_sizes,
        })
    }
}
