//! Framed socket: buffered non-blocking I/O with delimiter framing.
//!
//! One step of a [`FramedSocket`]:
//!
//! 1. drain as much of the write buffer as the transport accepts;
//! 2. read at most [`READ_CHUNK`] bytes;
//! 3. split the read buffer into frames, decode and trim each one.
//!
//! The I/O part ([`FramedSocket::poll`]) only moves buffered state
//! forward and returns [`SocketEvent`]s; the unit's `step` then hands
//! those events to the owner's [`SocketEvents`] hooks with no borrow
//! held, so hooks are free to enqueue replies or close the socket.

use std::cell::RefCell;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::rc::Weak;

use mathcp_loop::{Schedulable, UnitSlot};
use tracing::{debug, trace};

use crate::codec::LineCodec;
use crate::error::FrameError;

/// Bytes requested from the transport per step.
pub const READ_CHUNK: usize = 1024;

/// A non-blocking byte stream.
///
/// Reads and writes must return `WouldBlock` instead of waiting.
pub trait Transport: Read + Write + 'static {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Hooks through which a socket reports to its owner.
pub trait SocketEvents {
    /// A complete, decoded, trimmed message. An error is reported back
    /// through [`on_error`](Self::on_error).
    fn on_message(&self, message: String) -> anyhow::Result<()>;

    fn on_error(&self, error: FrameError) -> anyhow::Result<()>;

    fn on_disconnect(&self) -> anyhow::Result<()>;
}

/// Output of one I/O poll.
#[derive(Debug)]
pub enum SocketEvent {
    Message(String),
    Error(FrameError),
    Disconnected,
}

struct SocketState<S> {
    transport: Option<S>,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl<S: Transport> SocketState<S> {
    fn poll(&mut self, codec: &LineCodec) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        let Some(transport) = self.transport.as_mut() else {
            return events;
        };

        if !self.write_buf.is_empty() {
            match transport.write(&self.write_buf) {
                Ok(0) => events.push(SocketEvent::Error(io::Error::from(ErrorKind::WriteZero).into())),
                Ok(n) => {
                    self.write_buf.drain(..n);
                    trace!(sent = n, pending = self.write_buf.len(), "socket write");
                }
                Err(e) if is_busy(&e) => {}
                Err(e) if is_peer_gone(&e) => {
                    events.push(SocketEvent::Disconnected);
                    return events;
                }
                Err(e) => events.push(SocketEvent::Error(e.into())),
            }
        }

        let mut chunk = [0u8; READ_CHUNK];
        match transport.read(&mut chunk) {
            Ok(0) => {
                events.push(SocketEvent::Disconnected);
                return events;
            }
            Ok(n) => {
                self.read_buf.extend_from_slice(&chunk[..n]);
                trace!(received = n, buffered = self.read_buf.len(), "socket read");
            }
            Err(e) if is_busy(&e) => {}
            Err(e) if is_peer_gone(&e) => {
                events.push(SocketEvent::Disconnected);
                return events;
            }
            Err(e) => events.push(SocketEvent::Error(e.into())),
        }

        for frame in codec.split_frames(&mut self.read_buf) {
            events.push(match codec.decode(&frame) {
                Ok(text) => SocketEvent::Message(text),
                Err(e) => SocketEvent::Error(e),
            });
        }

        events
    }
}

fn is_busy(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}

/// A transport wrapped with read/write buffers and line framing.
pub struct FramedSocket<S: Transport = TcpStream> {
    slot: UnitSlot,
    codec: LineCodec,
    state: RefCell<SocketState<S>>,
    events: Weak<dyn SocketEvents>,
}

impl<S: Transport> FramedSocket<S> {
    pub fn new(transport: S, codec: LineCodec, events: Weak<dyn SocketEvents>) -> Self {
        Self {
            slot: UnitSlot::new(),
            codec,
            state: RefCell::new(SocketState {
                transport: Some(transport),
                read_buf: Vec::new(),
                write_buf: Vec::new(),
            }),
            events,
        }
    }

    /// Append `message + terminator` to the write buffer. Never blocks;
    /// the bytes go out on later steps.
    pub fn enqueue(&self, message: &str, terminator: &str) -> Result<(), FrameError> {
        let mut state = self.state.borrow_mut();
        if state.transport.is_none() {
            return Err(FrameError::Closed);
        }
        let mut bytes = self.codec.encode(message)?;
        bytes.extend(self.codec.encode(terminator)?);
        state.write_buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Perform the I/O half of a step and return what happened.
    pub fn poll(&self) -> Vec<SocketEvent> {
        self.state.borrow_mut().poll(&self.codec)
    }

    /// Close the transport, drop both buffers and leave the scheduler.
    /// Returns `false` if already closed.
    pub fn close(&self) -> bool {
        let transport = {
            let mut state = self.state.borrow_mut();
            state.read_buf = Vec::new();
            state.write_buf = Vec::new();
            state.transport.take()
        };

        let Some(mut transport) = transport else {
            return false;
        };
        if let Err(e) = transport.close() {
            // Typically the peer is already gone.
            debug!(error = %e, "transport shutdown failed");
        }
        drop(transport);

        self.slot.detach();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().transport.is_none()
    }

    pub fn pending_write(&self) -> usize {
        self.state.borrow().write_buf.len()
    }

    pub fn buffered_read(&self) -> usize {
        self.state.borrow().read_buf.len()
    }

    fn dispatch(&self, events: Vec<SocketEvent>) -> anyhow::Result<()> {
        for event in events {
            // A hook may have closed us; later messages are dropped.
            if self.is_closed() {
                break;
            }
            let Some(sink) = self.events.upgrade() else {
                self.close();
                break;
            };

            match event {
                SocketEvent::Message(text) => {
                    if let Err(e) = sink.on_message(text) {
                        sink.on_error(FrameError::Handler(e))?;
                    }
                }
                SocketEvent::Error(e) => sink.on_error(e)?,
                SocketEvent::Disconnected => sink.on_disconnect()?,
            }
        }
        Ok(())
    }
}

impl<S: Transport> Schedulable for FramedSocket<S> {
    fn slot(&self) -> &UnitSlot {
        &self.slot
    }

    fn step(&self) -> anyhow::Result<()> {
        let events = self.poll();
        self.dispatch(events)
    }

    /// Detaching a socket closes it.
    fn detach(&self) -> bool {
        self.close()
    }

    fn label(&self) -> &'static str {
        "socket"
    }
}
