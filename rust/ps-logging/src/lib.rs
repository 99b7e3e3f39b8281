//! ps-logging: NDJSON events for worker post-mortems.
//!
//! One JSON object per line, append-only. The worker writes a `bootstrap`
//! event per bootstrap attempt and an `op` event per forwarded session call.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

/// Content hash used to fingerprint `init` payloads.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    /// Variant name, if selection got that far.
    pub variant: Option<String>,
    pub accelerated: Option<bool>,
    pub thread_count: u32,
    pub duration_us: u64,
    pub ok: bool,
    pub error: Option<String>,
}

impl BootstrapEventV1 {
    pub fn new(thread_count: u32) -> Self {
        Self {
            event: "bootstrap",
            ts_ms: now_ms(),
            variant: None,
            accelerated: None,
            thread_count,
            duration_us: 0,
            ok: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,
    pub session_id: Option<u64>,
    pub request_id: u64,
    pub op: &'static str,
    pub duration_us: u64,
    pub ok: bool,
    pub error: Option<String>,
    /// blake3 of the encoded configuration (`init` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    /// Caller-supplied iteration index (`iterate` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl OpEventV1 {
    pub fn new(request_id: u64, op: &'static str) -> Self {
        Self {
            event: "op",
            ts_ms: now_ms(),
            session_id: None,
            request_id,
            op,
            duration_us: 0,
            ok: false,
            error: None,
            config_hash: None,
            iteration: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NdjsonError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only NDJSON writer.
///
/// Contract: each call writes exactly one JSON object followed by a newline.
pub struct NdjsonWriter {
    w: BufWriter<File>,
    lines_since_flush: u64,
    flush_every_lines: u64,
}

impl NdjsonWriter {
    /// Open a file for append. Creates it if it doesn't exist.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, NdjsonError> {
        Self::open_append_with_flush(path, 0)
    }

    /// `flush_every_lines=0` disables periodic flushing.
    pub fn open_append_with_flush(
        path: impl AsRef<Path>,
        flush_every_lines: u64,
    ) -> Result<Self, NdjsonError> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            w: BufWriter::new(f),
            lines_since_flush: 0,
            flush_every_lines,
        })
    }

    pub fn write_event<T: Serialize>(&mut self, event: &T) -> Result<(), NdjsonError> {
        let mut buf = serde_json::to_vec(event)?;
        buf.push(b'\n');
        self.w.write_all(&buf)?;
        self.lines_since_flush += 1;
        if self.flush_every_lines > 0 && self.lines_since_flush >= self.flush_every_lines {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NdjsonError> {
        self.w.flush()?;
        self.lines_since_flush = 0;
        Ok(())
    }
}

impl Drop for NdjsonWriter {
    fn drop(&mut self) {
        let _ = self.w.flush();
    }
}
