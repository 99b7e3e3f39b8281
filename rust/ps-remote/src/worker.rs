use std::sync::mpsc;
use std::thread;

use crate::client::{ClientOptions, RemoteClient, RemoteError};
use crate::endpoint::Endpoint;
use crate::transport::{ChannelSink, ChannelSource};

/// Run `endpoint` on its own thread and return a client connected to it.
///
/// The worker exits when the client is dropped.
pub fn spawn_worker(
    mut endpoint: Endpoint,
    opts: ClientOptions,
) -> Result<RemoteClient, RemoteError> {
    let (to_worker_tx, to_worker_rx) = mpsc::channel::<Vec<u8>>();
    let (to_client_tx, to_client_rx) = mpsc::channel::<Vec<u8>>();

    let worker = thread::Builder::new()
        .name("ps-worker".to_string())
        .spawn(move || {
            let mut source = ChannelSource(to_worker_rx);
            let mut sink = ChannelSink(to_client_tx);
            // A closed client channel is the normal way out.
            let _ = endpoint.serve(&mut source, &mut sink);
        })?;

    RemoteClient::from_channel(
        Box::new(ChannelSource(to_client_rx)),
        Box::new(ChannelSink(to_worker_tx)),
        opts,
        worker,
    )
}
