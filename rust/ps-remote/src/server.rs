//! Socket servers. Connections are served one after another by the same
//! endpoint, so every connection sees the one session.

use std::io;
use std::net::TcpListener;
use std::os::unix::net::UnixListener;

use crate::endpoint::Endpoint;
use crate::transport::{StreamSink, StreamSource};

/// Serve up to `max_connections` connections (`None` = forever).
pub fn serve_tcp(
    endpoint: &mut Endpoint,
    listener: &TcpListener,
    max_connections: Option<usize>,
) -> io::Result<()> {
    let mut served = 0usize;
    while max_connections.map_or(true, |m| served < m) {
        let (stream, peer) = listener.accept()?;
        stream.set_nodelay(true).ok();
        let mut source = StreamSource(stream.try_clone()?);
        let mut sink = StreamSink(stream);
        if let Err(e) = endpoint.serve(&mut source, &mut sink) {
            eprintln!("ps-remote: connection {peer} ended: {e}");
        }
        served += 1;
    }
    Ok(())
}

pub fn serve_uds(
    endpoint: &mut Endpoint,
    listener: &UnixListener,
    max_connections: Option<usize>,
) -> io::Result<()> {
    let mut served = 0usize;
    while max_connections.map_or(true, |m| served < m) {
        let (stream, _addr) = listener.accept()?;
        let mut source = StreamSource(stream.try_clone()?);
        let mut sink = StreamSink(stream);
        if let Err(e) = endpoint.serve(&mut source, &mut sink) {
            eprintln!("ps-remote: uds connection ended: {e}");
        }
        served += 1;
    }
    Ok(())
}
