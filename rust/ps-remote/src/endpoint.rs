//! Receiving side: decode, dispatch to the orchestrator or its session, encode.
//!
//! Requests are handled strictly one at a time in arrival order. Engine and
//! bootstrap failures become `Response::Error`; only transport failures end the loop.

use std::time::Instant;

use ps_logging::{hash_bytes, BootstrapEventV1, NdjsonWriter, OpEventV1};
use ps_session::{ComputeSession, Orchestrator};

use crate::codec::{
    decode_request, encode_response, encode_solver_config_into, peek_request_id,
};
use crate::frame::FrameError;
use crate::protocol::{FailureKind, Request, Response};
use crate::transport::{FrameSink, FrameSource};

pub struct Endpoint {
    orchestrator: Orchestrator,
    events: Option<NdjsonWriter>,
    handled: u64,
}

impl Endpoint {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            events: None,
            handled: 0,
        }
    }

    pub fn with_event_log(mut self, writer: NdjsonWriter) -> Self {
        self.events = Some(writer);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Requests handled so far, including rejected ones.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Serve until the source closes. Returns the number of frames answered.
    pub fn serve<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<u64, FrameError>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let mut answered = 0u64;
        while let Some(payload) = source.recv_frame()? {
            let reply = self.handle_frame(&payload);
            sink.send_frame(reply)?;
            answered += 1;
        }
        if let Some(w) = self.events.as_mut() {
            let _ = w.flush();
        }
        Ok(answered)
    }

    /// One encoded request in, one encoded response out.
    pub fn handle_frame(&mut self, payload: &[u8]) -> Vec<u8> {
        match decode_request(payload) {
            Ok((request_id, req)) => {
                let resp = self.handle(request_id, req);
                encode_response(request_id, &resp)
            }
            Err(e) => {
                self.handled += 1;
                let request_id = peek_request_id(payload).unwrap_or(0);
                let failure = Response::failure(FailureKind::Protocol, e.to_string());
                encode_response(request_id, &failure)
            }
        }
    }

    pub fn handle(&mut self, request_id: u64, req: Request) -> Response {
        self.handled += 1;
        match req {
            Request::Bootstrap { thread_count } => self.bootstrap(thread_count),
            Request::GetHandle => match self.orchestrator.session() {
                Some(s) => Response::Handle(s.info()),
                None => no_session(),
            },
            other => self.forward(request_id, other),
        }
    }

    fn bootstrap(&mut self, thread_count: u32) -> Response {
        let t0 = Instant::now();
        let result = self.orchestrator.bootstrap(thread_count);

        if let Some(w) = self.events.as_mut() {
            let attempt = self.orchestrator.last_attempt();
            let mut ev = BootstrapEventV1::new(thread_count);
            ev.variant = attempt.variant.clone();
            ev.accelerated = attempt.accelerated;
            ev.duration_us = t0.elapsed().as_micros() as u64;
            ev.ok = result.is_ok();
            ev.error = result.as_ref().err().map(|e| e.to_string());
            let _ = w.write_event(&ev);
            // Bootstrap happens once per process; make it visible immediately.
            let _ = w.flush();
        }

        match result {
            Ok(_) => Response::Unit,
            Err(e) => Response::failure(FailureKind::Bootstrap, e.to_string()),
        }
    }

    fn forward(&mut self, request_id: u64, req: Request) -> Response {
        let op = req.op();
        let mut ev = self.events.as_ref().map(|_| OpEventV1::new(request_id, op.as_str()));
        if let Some(ev) = ev.as_mut() {
            match &req {
                Request::Init(config) => {
                    let mut buf = Vec::new();
                    encode_solver_config_into(&mut buf, config);
                    ev.config_hash = Some(hash_bytes(&buf));
                }
                Request::Iterate { iteration } => ev.iteration = Some(*iteration),
                _ => {}
            }
        }

        let t0 = Instant::now();
        let resp = match self.orchestrator.session_mut() {
            Some(session) => {
                if let Some(ev) = ev.as_mut() {
                    ev.session_id = Some(session.id());
                }
                dispatch(session, req)
            }
            None => no_session(),
        };

        if let (Some(w), Some(mut ev)) = (self.events.as_mut(), ev) {
            ev.duration_us = t0.elapsed().as_micros() as u64;
            match &resp {
                Response::Error(f) => ev.error = Some(f.to_string()),
                _ => ev.ok = true,
            }
            let _ = w.write_event(&ev);
        }
        resp
    }
}

fn no_session() -> Response {
    Response::failure(FailureKind::NoSession, "bootstrap has not completed")
}

fn dispatch(session: &mut ComputeSession, req: Request) -> Response {
    let result = match req {
        Request::Init(config) => session.init(config).map(|()| Response::Unit),
        Request::MemoryUsage { enable_compression } => {
            session.memory_usage(enable_compression).map(Response::Bytes)
        }
        Request::AllocateMemory { enable_compression } => session
            .allocate_memory(enable_compression)
            .map(|()| Response::Unit),
        Request::Iterate { iteration } => session.iterate(iteration).map(|()| Response::Unit),
        Request::Exploitability => session.exploitability().map(Response::Scalar),
        Request::Ev => session.ev().map(Response::Values),
        Request::Finalize => session.finalize().map(|()| Response::Unit),
        Request::Bootstrap { .. } | Request::GetHandle => {
            return Response::failure(FailureKind::Protocol, "not a session operation")
        }
    };
    result.unwrap_or_else(|e| Response::failure(FailureKind::Engine, e.to_string()))
}
