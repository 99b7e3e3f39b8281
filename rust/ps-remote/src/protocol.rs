//! Message contract between a caller and the worker.
//!
//! One request message per externally callable operation, one response
//! message per result shape. Every message travels with a `request_id`
//! that the response echoes.

use std::fmt;

use thiserror::Error;

use ps_core::SolverConfig;
use ps_session::SessionInfo;

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Request = 1,
    Response = 2,
}

/// Wire code of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Bootstrap = 1,
    GetHandle = 2,
    Init = 3,
    MemoryUsage = 4,
    AllocateMemory = 5,
    Iterate = 6,
    Exploitability = 7,
    Ev = 8,
    Finalize = 9,
}

impl OpCode {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => OpCode::Bootstrap,
            2 => OpCode::GetHandle,
            3 => OpCode::Init,
            4 => OpCode::MemoryUsage,
            5 => OpCode::AllocateMemory,
            6 => OpCode::Iterate,
            7 => OpCode::Exploitability,
            8 => OpCode::Ev,
            9 => OpCode::Finalize,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::Bootstrap => "bootstrap",
            OpCode::GetHandle => "get_handle",
            OpCode::Init => "init",
            OpCode::MemoryUsage => "memory_usage",
            OpCode::AllocateMemory => "allocate_memory",
            OpCode::Iterate => "iterate",
            OpCode::Exploitability => "exploitability",
            OpCode::Ev => "ev",
            OpCode::Finalize => "finalize",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Bootstrap { thread_count: u32 },
    GetHandle,
    Init(SolverConfig),
    MemoryUsage { enable_compression: bool },
    AllocateMemory { enable_compression: bool },
    Iterate { iteration: u32 },
    Exploitability,
    Ev,
    Finalize,
}

impl Request {
    pub fn op(&self) -> OpCode {
        match self {
            Request::Bootstrap { .. } => OpCode::Bootstrap,
            Request::GetHandle => OpCode::GetHandle,
            Request::Init(_) => OpCode::Init,
            Request::MemoryUsage { .. } => OpCode::MemoryUsage,
            Request::AllocateMemory { .. } => OpCode::AllocateMemory,
            Request::Iterate { .. } => OpCode::Iterate,
            Request::Exploitability => OpCode::Exploitability,
            Request::Ev => OpCode::Ev,
            Request::Finalize => OpCode::Finalize,
        }
    }
}

/// Wire tag of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTag {
    Unit = 1,
    Handle = 2,
    Bytes = 3,
    Scalar = 4,
    Values = 5,
    Error = 6,
}

impl ResponseTag {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => ResponseTag::Unit,
            2 => ResponseTag::Handle,
            3 => ResponseTag::Bytes,
            4 => ResponseTag::Scalar,
            5 => ResponseTag::Values,
            6 => ResponseTag::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseTag::Unit => "unit",
            ResponseTag::Handle => "handle",
            ResponseTag::Bytes => "bytes",
            ResponseTag::Scalar => "scalar",
            ResponseTag::Values => "values",
            ResponseTag::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Unit,
    Handle(SessionInfo),
    Bytes(u64),
    Scalar(f32),
    Values(Vec<f32>),
    Error(RemoteFailure),
}

impl Response {
    pub fn tag(&self) -> ResponseTag {
        match self {
            Response::Unit => ResponseTag::Unit,
            Response::Handle(_) => ResponseTag::Handle,
            Response::Bytes(_) => ResponseTag::Bytes,
            Response::Scalar(_) => ResponseTag::Scalar,
            Response::Values(_) => ResponseTag::Values,
            Response::Error(_) => ResponseTag::Error,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Response::Error(RemoteFailure {
            kind,
            message: message.into(),
        })
    }
}

/// Worker-side failure class carried across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Probe, load, runtime or pool initialization failed, or a session already exists.
    Bootstrap = 1,
    /// The engine rejected a forwarded operation.
    Engine = 2,
    /// A session operation arrived before a successful bootstrap.
    NoSession = 3,
    /// The worker could not decode the request.
    Protocol = 4,
}

impl FailureKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            1 => FailureKind::Bootstrap,
            2 => FailureKind::Engine,
            3 => FailureKind::NoSession,
            4 => FailureKind::Protocol,
            _ => return None,
        })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Bootstrap => "bootstrap",
            FailureKind::Engine => "engine",
            FailureKind::NoSession => "no-session",
            FailureKind::Protocol => "protocol",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failure: {message}")]
pub struct RemoteFailure {
    pub kind: FailureKind,
    pub message: String,
}
