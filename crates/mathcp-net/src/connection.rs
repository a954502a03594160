//! One client session on top of a framed socket.
//!
//! A [`Connection`] is generic over its [`Protocol`], the capability
//! that decides what each decoded message means. The listener can only
//! be instantiated with a type implementing `Protocol`, so a factory
//! that does not satisfy the contract is rejected when the server is
//! built, before anything is bound.
//!
//! Lifecycle:
//!
//! ```text
//! new ──► registered (by the listener) ──► activate ──► ... ──► disconnect
//!                                          │                     │
//!                                          └ socket registered   └ connection and
//!                                                                  socket detached,
//!                                                                  transport closed
//! ```

use std::cell::Cell;
use std::net::{SocketAddr, TcpStream};
use std::rc::{Rc, Weak};

use mathcp_loop::{Schedulable, UnitSlot};
use tracing::{debug, info, warn};

use crate::codec::Framing;
use crate::error::FrameError;
use crate::socket::{FramedSocket, SocketEvents, Transport};

/// Protocol-specific behaviour of a connection.
///
/// One value is created per connection from the listener's injected
/// dependencies. Hooks run on the scheduling thread and must not block.
pub trait Protocol: Sized + 'static {
    /// Collaborators injected into every connection.
    type Deps: 'static;

    fn create(deps: &Self::Deps) -> Self;

    /// The connection is wired into the loop and may start talking.
    fn on_connected<S: Transport>(&self, _conn: &Connection<Self, S>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_message<S: Transport>(&self, conn: &Connection<Self, S>, message: &str) -> anyhow::Result<()>;

    /// A transport, decode or handler failure affecting one message.
    fn on_message_error<S: Transport>(
        &self,
        _conn: &Connection<Self, S>,
        _error: &FrameError,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_disconnect<S: Transport>(&self, _conn: &Connection<Self, S>) {}
}

/// A client session. Owns exactly one framed socket.
pub struct Connection<P: Protocol, S: Transport = TcpStream> {
    slot: UnitSlot,
    socket: Rc<FramedSocket<S>>,
    protocol: P,
    peer: SocketAddr,
    terminator: String,
    closed: Cell<bool>,
    this: Weak<Self>,
}

impl<P: Protocol, S: Transport> Connection<P, S> {
    pub fn new(transport: S, peer: SocketAddr, framing: &Framing, deps: &P::Deps) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let events: Weak<dyn SocketEvents> = this.clone();
            Self {
                slot: UnitSlot::new(),
                socket: Rc::new(FramedSocket::new(
                    transport,
                    framing.codec().clone(),
                    events,
                )),
                protocol: P::create(deps),
                peer,
                terminator: framing.terminator().to_string(),
                closed: Cell::new(false),
                this: this.clone(),
            }
        })
    }

    /// Register the socket with the scheduler this connection is
    /// attached to, then run the protocol's `on_connected` hook.
    ///
    /// Called once, after the connection itself has been registered.
    pub fn activate(&self) -> anyhow::Result<()> {
        let owner = self.slot.owner()?;
        owner.register(self.socket.clone())?;
        debug!(peer = %self.peer, "connection activated");
        self.protocol.on_connected(self)
    }

    /// Queue one line for the client.
    pub fn send(&self, message: &str) -> Result<(), FrameError> {
        self.socket.enqueue(message, &self.terminator)
    }

    /// Queue `message` followed by a custom terminator.
    pub fn send_with(&self, message: &str, end: &str) -> Result<(), FrameError> {
        self.socket.enqueue(message, end)
    }

    /// Tear the connection down: detach it, detach and close its socket.
    ///
    /// Idempotent. Returns `false` if it was already disconnected.
    pub fn disconnect(&self) -> bool {
        if self.closed.replace(true) {
            return false;
        }

        self.protocol.on_disconnect(self);
        self.slot.detach();
        self.socket.close();
        info!(peer = %self.peer, "connection closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn socket(&self) -> &FramedSocket<S> {
        &self.socket
    }

    /// Non-owning handle for callbacks that may outlive the session.
    pub fn weak(&self) -> Weak<Self> {
        self.this.clone()
    }
}

impl<P: Protocol, S: Transport> SocketEvents for Connection<P, S> {
    fn on_message(&self, message: String) -> anyhow::Result<()> {
        debug!(peer = %self.peer, %message, "message received");
        self.protocol.on_message(self, &message)
    }

    fn on_error(&self, error: FrameError) -> anyhow::Result<()> {
        warn!(peer = %self.peer, %error, "failed to process message");
        self.protocol.on_message_error(self, &error)
    }

    fn on_disconnect(&self) -> anyhow::Result<()> {
        self.disconnect();
        Ok(())
    }
}

impl<P: Protocol, S: Transport> Schedulable for Connection<P, S> {
    fn slot(&self) -> &UnitSlot {
        &self.slot
    }

    /// All per-pass work happens in the socket; the connection reacts
    /// to its events.
    fn step(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn detach(&self) -> bool {
        self.disconnect()
    }

    fn label(&self) -> &'static str {
        "connection"
    }
}
