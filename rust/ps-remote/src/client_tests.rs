use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::client::{ClientOptions, RemoteClient, RemoteError};
use crate::codec::{decode_request, encode_response};
use crate::protocol::{Request, Response};
use crate::transport::{ChannelSink, ChannelSource};

/// Peer that reads `n` requests, then answers them in reverse order.
fn reverse_peer(n: usize) -> (RemoteClient, JoinHandle<()>, mpsc::Receiver<Vec<Request>>) {
    let (to_peer_tx, to_peer_rx) = mpsc::channel::<Vec<u8>>();
    let (to_client_tx, to_client_rx) = mpsc::channel::<Vec<u8>>();
    let (seen_tx, seen_rx) = mpsc::channel();

    let peer = thread::spawn(move || {
        let mut ids = Vec::with_capacity(n);
        let mut seen = Vec::with_capacity(n);
        for _ in 0..n {
            let (id, req) = decode_request(&to_peer_rx.recv().unwrap()).unwrap();
            ids.push(id);
            seen.push(req);
        }
        seen_tx.send(seen).unwrap();
        for id in ids.into_iter().rev() {
            to_client_tx.send(encode_response(id, &Response::Scalar(id as f32))).unwrap();
        }
        // Hold the link open until the client hangs up.
        for _ in to_peer_rx.iter() {}
    });
    let client = RemoteClient::from_channel(
        Box::new(ChannelSource(to_client_rx)),
        Box::new(ChannelSink(to_peer_tx)),
        ClientOptions {
            max_inflight_total: 4096,
            max_outbound_queue: 4096,
            request_id_start: 100,
        },
        thread::spawn(|| {}),
    )
    .unwrap();
    (client, peer, seen_rx)
}

#[test]
fn routes_out_of_order_responses() {
    let n = 128usize;
    let (client, peer, seen) = reverse_peer(n);

    let tickets: Vec<_> = (0..n as u32)
        .map(|i| client.submit(Request::Iterate { iteration: i }).unwrap())
        .collect();
    for t in &tickets {
        let resp = t.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(resp, Response::Scalar(t.request_id as f32));
    }

    // Submission order is delivery order.
    let seen = seen.recv().unwrap();
    let iterations: Vec<u32> = seen
        .iter()
        .map(|r| match r {
            Request::Iterate { iteration } => *iteration,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(iterations, (0..n as u32).collect::<Vec<_>>());

    let stats = client.stats_snapshot();
    assert_eq!(stats.sent, n as u64);
    assert_eq!(stats.received, n as u64);
    assert_eq!(stats.latency_us.count, n as u64);
    assert_eq!(stats.inflight, 0);

    drop(client);
    peer.join().unwrap();
}

#[test]
fn typed_ticket_rejects_wrong_response_shape() {
    let (client, peer, _seen) = reverse_peer(1);
    // The peer answers with a scalar; bootstrap expects unit.
    let t = client.bootstrap(1).unwrap();
    assert!(matches!(
        t.recv_timeout(Duration::from_secs(5)),
        Err(RemoteError::UnexpectedResponse { expected: "unit", got: "scalar" })
    ));
    drop(client);
    peer.join().unwrap();
}

#[test]
fn inflight_cap_and_disconnect() {
    let (to_peer_tx, to_peer_rx) = mpsc::channel::<Vec<u8>>();
    let (to_client_tx, to_client_rx) = mpsc::channel::<Vec<u8>>();
    // Silent peer: swallows requests, never answers.
    let peer = thread::spawn(move || {
        let _keep = to_client_tx;
        for _ in to_peer_rx.iter() {}
    });
    let client = RemoteClient::from_channel(
        Box::new(ChannelSource(to_client_rx)),
        Box::new(ChannelSink(to_peer_tx)),
        ClientOptions {
            max_inflight_total: 2,
            ..ClientOptions::default()
        },
        peer,
    )
    .unwrap();

    let a = client.submit(Request::Ev).unwrap();
    let b = client.submit(Request::Ev).unwrap();
    assert!(matches!(client.submit(Request::Ev), Err(RemoteError::Backpressure(_))));
    assert!(matches!(a.try_recv(), Ok(None)));
    assert!(matches!(
        b.recv_timeout(Duration::from_millis(20)),
        Err(RemoteError::Timeout)
    ));
    assert_eq!(client.stats_snapshot().inflight, 2);
    assert_eq!(client.stats_snapshot().errors, 1);

    drop(client);
    assert!(matches!(a.recv(), Err(RemoteError::Disconnected)));
    assert!(matches!(b.recv(), Err(RemoteError::Disconnected)));
}
