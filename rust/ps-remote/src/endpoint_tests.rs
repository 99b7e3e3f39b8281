use std::sync::{Arc, Mutex};

use ps_core::{BetSizeSchedule, FixedProbe, SolverConfig, VariantKind, NUM_HANDS};
use ps_logging::NdjsonWriter;
use ps_session::scripted::{CallLog, FailAt, ScriptedVariant};
use ps_session::{BackendSelector, Orchestrator};

use crate::codec::{decode_response, encode_request};
use crate::endpoint::Endpoint;
use crate::protocol::{FailureKind, Request, Response};
use crate::transport::{ChannelSink, ChannelSource};

fn endpoint(log: &CallLog, fail_at: Option<FailAt>) -> Endpoint {
    let mut baseline = ScriptedVariant::new(VariantKind::Baseline, Arc::clone(log));
    if let Some(stage) = fail_at {
        baseline = baseline.failing_at(stage);
    }
    let selector = BackendSelector::new(
        Arc::new(baseline),
        Arc::new(ScriptedVariant::new(VariantKind::Accelerated, Arc::clone(log))),
    );
    Endpoint::new(Orchestrator::new(selector, Arc::new(FixedProbe(false))))
}

fn config() -> SolverConfig {
    SolverConfig {
        oop_range: vec![1.0; NUM_HANDS],
        ip_range: vec![1.0; NUM_HANDS],
        board: vec![0, 4, 8],
        starting_pot: 80,
        effective_stack: 400,
        bet_sizes: BetSizeSchedule::symmetric(&[0.5], &[2.0]),
        add_allin_threshold: 1.5,
        force_allin_threshold: 0.15,
        adjust_last_two_bet_sizes: false,
    }
}

fn failure_kind(resp: &Response) -> Option<FailureKind> {
    match resp {
        Response::Error(f) => Some(f.kind),
        _ => None,
    }
}

#[test]
fn session_ops_before_bootstrap_report_no_session() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut ep = endpoint(&log, None);
    for req in [Request::GetHandle, Request::Exploitability, Request::Iterate { iteration: 0 }] {
        assert_eq!(failure_kind(&ep.handle(1, req)), Some(FailureKind::NoSession));
    }
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn dispatches_to_the_bootstrapped_session() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut ep = endpoint(&log, None);
    assert_eq!(ep.handle(1, Request::Bootstrap { thread_count: 2 }), Response::Unit);

    let Response::Handle(info) = ep.handle(2, Request::GetHandle) else {
        panic!("expected a handle");
    };
    assert_eq!(info.thread_count, 2);
    assert_eq!(info.variant, VariantKind::Baseline);

    assert_eq!(ep.handle(3, Request::Init(config())), Response::Unit);
    assert_eq!(
        ep.handle(4, Request::MemoryUsage { enable_compression: false }),
        Response::Bytes(1024)
    );
    assert_eq!(ep.handle(5, Request::Ev), Response::Values(vec![40.0, 40.0]));
    assert_eq!(ep.handled(), 5);
}

#[test]
fn bootstrap_and_engine_failures_become_error_responses() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut ep = endpoint(&log, Some(FailAt::ThreadPool));
    let resp = ep.handle(1, Request::Bootstrap { thread_count: 2 });
    assert_eq!(failure_kind(&resp), Some(FailureKind::Bootstrap));
    assert_eq!(failure_kind(&ep.handle(2, Request::GetHandle)), Some(FailureKind::NoSession));

    let mut ep = endpoint(&log, None);
    ep.handle(1, Request::Bootstrap { thread_count: 1 });
    let mut bad = config();
    bad.board = vec![1];
    assert_eq!(failure_kind(&ep.handle(2, Request::Init(bad))), Some(FailureKind::Engine));

    let again = ep.handle(3, Request::Bootstrap { thread_count: 1 });
    assert_eq!(failure_kind(&again), Some(FailureKind::Bootstrap));
}

#[test]
fn garbage_frame_gets_a_protocol_error() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut ep = endpoint(&log, None);
    let mut bytes = encode_request(31, &Request::Ev);
    bytes[5] = 99;
    let (id, resp) = decode_response(&ep.handle_frame(&bytes)).unwrap();
    assert_eq!(id, 31);
    assert_eq!(failure_kind(&resp), Some(FailureKind::Protocol));

    let (id, resp) = decode_response(&ep.handle_frame(&[1, 2, 3])).unwrap();
    assert_eq!(id, 0);
    assert_eq!(failure_kind(&resp), Some(FailureKind::Protocol));
}

#[test]
fn serve_answers_in_order_until_the_source_closes() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut ep = endpoint(&log, None);
    let (in_tx, in_rx) = std::sync::mpsc::channel();
    let (out_tx, out_rx) = std::sync::mpsc::channel();

    in_tx.send(encode_request(1, &Request::Bootstrap { thread_count: 1 })).unwrap();
    in_tx.send(encode_request(2, &Request::Init(config()))).unwrap();
    for i in 0..5u32 {
        in_tx.send(encode_request(10 + i as u64, &Request::Iterate { iteration: i })).unwrap();
    }
    drop(in_tx);

    let n = ep
        .serve(&mut ChannelSource(in_rx), &mut ChannelSink(out_tx))
        .unwrap();
    assert_eq!(n, 7);
    let ids: Vec<u64> = out_rx
        .iter()
        .map(|b| decode_response(&b).unwrap().0)
        .collect();
    assert_eq!(ids, vec![1, 2, 10, 11, 12, 13, 14]);

    let steps: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("solve_step"))
        .cloned()
        .collect();
    let expected: Vec<String> = (0..5).map(|i| format!("solve_step:{i}")).collect();
    assert_eq!(steps, expected);
}

#[test]
fn event_log_records_bootstrap_and_ops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.ndjson");
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    {
        let events = NdjsonWriter::open_append(&path).unwrap();
        let mut ep = endpoint(&log, None).with_event_log(events);
        ep.handle(1, Request::Bootstrap { thread_count: 2 });
        ep.handle(2, Request::Init(config()));
        ep.handle(3, Request::Iterate { iteration: 7 });
        ep.handle(4, Request::Finalize);
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 4);

    assert_eq!(events[0]["event"], "bootstrap");
    assert_eq!(events[0]["ok"], true);
    assert_eq!(events[0]["accelerated"], false);
    assert_eq!(events[0]["variant"], "scripted-baseline");

    assert_eq!(events[1]["op"], "init");
    assert_eq!(events[1]["config_hash"].as_str().unwrap().len(), 64);
    assert_eq!(events[1]["session_id"], 1);

    assert_eq!(events[2]["op"], "iterate");
    assert_eq!(events[2]["iteration"], 7);
    assert_eq!(events[3]["op"], "finalize");
    assert!(events[1..].iter().all(|e| e["ok"] == true));
}

#[test]
fn bootstrap_event_is_on_disk_while_serving() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.ndjson");
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let events = NdjsonWriter::open_append(&path).unwrap();
    let mut ep = endpoint(&log, None).with_event_log(events);
    ep.handle(1, Request::Bootstrap { thread_count: 1 });

    // Endpoint still alive: nothing has dropped the writer.
    let text = std::fs::read_to_string(&path).unwrap();
    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["event"], "bootstrap");
    assert_eq!(ep.handled(), 1);
}
