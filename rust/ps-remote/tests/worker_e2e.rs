use std::sync::Arc;
use std::time::Duration;

use ps_core::{
    BetSizeSchedule, CapabilityProbe, FixedProbe, ProbeError, SolverConfig, VariantKind, NUM_HANDS,
};
use ps_engine::{AcceleratedVariant, BaselineVariant};
use ps_remote::{spawn_worker, ClientOptions, Endpoint, FailureKind, RemoteClient, RemoteError};
use ps_session::{BackendSelector, Orchestrator};

const T: Duration = Duration::from_secs(30);

fn worker_with(probe: Arc<dyn CapabilityProbe>) -> RemoteClient {
    let selector = BackendSelector::new(Arc::new(BaselineVariant), Arc::new(AcceleratedVariant));
    let endpoint = Endpoint::new(Orchestrator::new(selector, probe));
    spawn_worker(endpoint, ClientOptions::default()).unwrap()
}

fn worker(accelerated: bool) -> RemoteClient {
    worker_with(Arc::new(FixedProbe(accelerated)))
}

fn flop_config() -> SolverConfig {
    SolverConfig {
        oop_range: vec![1.0; NUM_HANDS],
        ip_range: vec![1.0; NUM_HANDS],
        board: vec![33, 29, 18],
        starting_pot: 200,
        effective_stack: 900,
        bet_sizes: BetSizeSchedule::symmetric(&[0.33, 0.75], &[2.5]),
        add_allin_threshold: 1.5,
        force_allin_threshold: 0.15,
        adjust_last_two_bet_sizes: false,
    }
}

fn remote_kind(e: RemoteError) -> FailureKind {
    match e {
        RemoteError::Remote(f) => f.kind,
        other => panic!("expected a remote failure, got {other:?}"),
    }
}

#[test]
fn bootstrap_then_full_solve_over_the_boundary() {
    let client = worker(false);
    client.bootstrap(2).unwrap().recv_timeout(T).unwrap();

    let h1 = client.get_handle().unwrap();
    let h2 = client.get_handle().unwrap();
    assert_eq!(h1.session_id(), h2.session_id());
    assert_eq!(h1.info().thread_count, 2);
    assert_eq!(h1.info().variant, VariantKind::Baseline);

    h1.init(flop_config()).unwrap().recv_timeout(T).unwrap();
    let bytes = h1.memory_usage(false).unwrap().recv_timeout(T).unwrap();
    assert!(bytes > 0);
    assert_eq!(h1.memory_usage(false).unwrap().recv_timeout(T).unwrap(), bytes);
    h1.allocate_memory(false).unwrap().recv_timeout(T).unwrap();

    let before = h1.exploitability().unwrap().recv_timeout(T).unwrap();
    h1.iterate(0).unwrap().recv_timeout(T).unwrap();
    let after = h1.exploitability().unwrap().recv_timeout(T).unwrap();
    assert!(after.is_finite() && after >= 0.0);
    assert!(after <= before + 1e-4, "{before} -> {after}");

    for i in 1..100 {
        h1.iterate(i).unwrap().recv_timeout(T).unwrap();
    }
    let late = h1.exploitability().unwrap().recv_timeout(T).unwrap();
    assert!(late < before, "{before} -> {late}");

    let ev = h1.ev().unwrap().recv_timeout(T).unwrap();
    assert_eq!(ev.len(), 2);
    h1.finalize().unwrap().recv_timeout(T).unwrap();

    // Engine rejects stepping a finalized game; the error crosses the boundary intact.
    let err = h1.iterate(100).unwrap().recv_timeout(T).unwrap_err();
    assert_eq!(remote_kind(err), FailureKind::Engine);

    let stats = client.stats_snapshot();
    assert_eq!(stats.sent, stats.received);
    assert_eq!(stats.inflight, 0);
}

#[test]
fn probe_outcome_picks_the_variant() {
    for (probe, kind) in [(true, VariantKind::Accelerated), (false, VariantKind::Baseline)] {
        let client = worker(probe);
        client.bootstrap(1).unwrap().recv_timeout(T).unwrap();
        assert_eq!(client.get_handle().unwrap().info().variant, kind);
    }
}

#[test]
fn pipelined_calls_arrive_in_order() {
    let client = worker(true);
    let boot = client.bootstrap(1).unwrap();
    boot.recv_timeout(T).unwrap();
    let h = client.get_handle().unwrap();

    // Submit everything up front; the worker must still see init, allocate, steps, finalize.
    let init = h.init(flop_config()).unwrap();
    let alloc = h.allocate_memory(true).unwrap();
    let steps: Vec<_> = (0..20).map(|i| h.iterate(i).unwrap()).collect();
    let fin = h.finalize().unwrap();

    init.recv_timeout(T).unwrap();
    alloc.recv_timeout(T).unwrap();
    for s in steps {
        s.recv_timeout(T).unwrap();
    }
    fin.recv_timeout(T).unwrap();
    assert_eq!(h.ev().unwrap().recv_timeout(T).unwrap().len(), 2);
}

#[test]
fn finalize_with_zero_iterations_still_reports() {
    let client = worker(false);
    client.bootstrap(1).unwrap().recv_timeout(T).unwrap();
    let h = client.get_handle().unwrap();

    let init = h.init(flop_config()).unwrap();
    let alloc = h.allocate_memory(false).unwrap();
    let fin = h.finalize().unwrap();
    init.recv_timeout(T).unwrap();
    alloc.recv_timeout(T).unwrap();
    fin.recv_timeout(T).unwrap();

    let ev = h.ev().unwrap().recv_timeout(T).unwrap();
    assert!((ev[0] + ev[1] - 200.0).abs() < 1e-2);
    let expl = h.exploitability().unwrap().recv_timeout(T).unwrap();
    assert!(expl.is_finite() && expl >= 0.0);
}

#[test]
fn huge_stakes_keep_the_session_alive() {
    let client = worker(true);
    client.bootstrap(1).unwrap().recv_timeout(T).unwrap();
    let h = client.get_handle().unwrap();

    let mut cfg = flop_config();
    cfg.starting_pot = 1_000_000_000;
    cfg.effective_stack = 2_000_000_000;
    cfg.bet_sizes = BetSizeSchedule::symmetric(&[1.5], &[]);
    h.init(cfg).unwrap().recv_timeout(T).unwrap();

    // Out-of-order call is rejected by the engine; the worker keeps serving.
    let err = h.exploitability().unwrap().recv_timeout(T).unwrap_err();
    assert_eq!(remote_kind(err), FailureKind::Engine);

    h.allocate_memory(false).unwrap().recv_timeout(T).unwrap();
    h.iterate(0).unwrap().recv_timeout(T).unwrap();
    assert!(h.exploitability().unwrap().recv_timeout(T).unwrap().is_finite());
    assert_eq!(client.get_handle().unwrap().session_id(), h.session_id());
}

#[test]
fn single_thread_pool_still_solves() {
    let client = worker(false);
    client.bootstrap(1).unwrap().recv_timeout(T).unwrap();
    let h = client.get_handle().unwrap();
    assert_eq!(h.info().thread_count, 1);
    h.init(flop_config()).unwrap().recv_timeout(T).unwrap();
    h.allocate_memory(false).unwrap().recv_timeout(T).unwrap();
    h.iterate(0).unwrap().recv_timeout(T).unwrap();
    assert!(h.exploitability().unwrap().recv_timeout(T).unwrap().is_finite());
}

#[test]
fn garbled_board_rejects_init() {
    let client = worker(false);
    client.bootstrap(2).unwrap().recv_timeout(T).unwrap();
    let h = client.get_handle().unwrap();
    for board in [vec![], vec![7, 7, 9], vec![52, 1, 2], vec![1, 2, 3, 4, 5, 6]] {
        let mut cfg = flop_config();
        cfg.board = board;
        let err = h.init(cfg).unwrap().recv_timeout(T).unwrap_err();
        assert_eq!(remote_kind(err), FailureKind::Engine);
    }
}

#[test]
fn get_handle_before_bootstrap_fails() {
    let client = worker(false);
    let err = client.get_handle().err().unwrap();
    assert_eq!(remote_kind(err), FailureKind::NoSession);
}

#[test]
fn second_bootstrap_keeps_the_first_session() {
    let client = worker(false);
    client.bootstrap(2).unwrap().recv_timeout(T).unwrap();
    let first = client.get_handle().unwrap().session_id();
    let err = client.bootstrap(4).unwrap().recv_timeout(T).unwrap_err();
    assert_eq!(remote_kind(err), FailureKind::Bootstrap);
    let h = client.get_handle().unwrap();
    assert_eq!(h.session_id(), first);
    assert_eq!(h.info().thread_count, 2);
}

struct BrokenProbe;

impl CapabilityProbe for BrokenProbe {
    fn accelerated_supported(&self) -> Result<bool, ProbeError> {
        Err(ProbeError("feature detection unavailable".to_string()))
    }
}

#[test]
fn failing_probe_is_a_bootstrap_error_and_leaves_no_session() {
    let client = worker_with(Arc::new(BrokenProbe));
    let err = client.bootstrap(2).unwrap().recv_timeout(T).unwrap_err();
    assert_eq!(remote_kind(err), FailureKind::Bootstrap);
    let err = client.get_handle().err().unwrap();
    assert_eq!(remote_kind(err), FailureKind::NoSession);
}

#[test]
fn zero_threads_is_a_bootstrap_error() {
    let client = worker(false);
    let err = client.bootstrap(0).unwrap().recv_timeout(T).unwrap_err();
    assert_eq!(remote_kind(err), FailureKind::Bootstrap);
    client.bootstrap(1).unwrap().recv_timeout(T).unwrap();
}
