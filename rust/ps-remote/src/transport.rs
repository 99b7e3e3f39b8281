//! Frame transports: in-process channels and byte streams behind one pair of traits.

use std::io::{Read, Write};
use std::sync::mpsc;

use crate::frame::{read_frame, write_frame, FrameError};

pub trait FrameSource {
    /// Next frame, or `None` once the peer is gone.
    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError>;
}

pub trait FrameSink {
    fn send_frame(&mut self, payload: Vec<u8>) -> Result<(), FrameError>;
}

pub struct ChannelSource(pub mpsc::Receiver<Vec<u8>>);

impl FrameSource for ChannelSource {
    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        Ok(self.0.recv().ok())
    }
}

pub struct ChannelSink(pub mpsc::Sender<Vec<u8>>);

impl FrameSink for ChannelSink {
    fn send_frame(&mut self, payload: Vec<u8>) -> Result<(), FrameError> {
        self.0.send(payload).map_err(|_| FrameError::Closed)
    }
}

pub struct StreamSource<R>(pub R);

impl<R: Read> FrameSource for StreamSource<R> {
    fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        read_frame(&mut self.0)
    }
}

pub struct StreamSink<W>(pub W);

impl<W: Write> FrameSink for StreamSink<W> {
    fn send_frame(&mut self, payload: Vec<u8>) -> Result<(), FrameError> {
        write_frame(&mut self.0, &payload)
    }
}
