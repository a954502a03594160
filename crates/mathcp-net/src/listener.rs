//! Accepts clients and turns them into connections.

use std::cell::Cell;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::rc::Rc;

use mathcp_loop::{Schedulable, UnitSlot};
use tracing::{debug, info, warn};

use crate::codec::Framing;
use crate::connection::{Connection, Protocol};
use crate::error::{NetError, NetResult};

/// Everything injected into each connection a listener creates.
///
/// Fixed once at listener construction.
#[derive(Debug, Clone)]
pub struct ConnectionConfig<D> {
    pub framing: Framing,
    pub deps: D,
}

impl<D> ConnectionConfig<D> {
    pub fn new(framing: Framing, deps: D) -> Self {
        Self { framing, deps }
    }
}

/// A failing accept is warned about once per this many consecutive
/// failures; the rest go to `debug!`.
const ACCEPT_WARN_EVERY: u32 = 1000;

/// Owns the listening socket. Each step accepts at most one client.
pub struct Listener<P: Protocol> {
    slot: UnitSlot,
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ConnectionConfig<P::Deps>,
    accept_failures: Cell<u32>,
}

impl<P: Protocol> Listener<P> {
    /// Bind a non-blocking listener on `host:port`.
    ///
    /// On Unix the standard library enables `SO_REUSEADDR` before
    /// binding, so a restarted server can reclaim the port at once.
    pub fn bind(host: &str, port: u16, config: ConnectionConfig<P::Deps>) -> NetResult<Rc<Self>> {
        let listener = TcpListener::bind((host, port)).map_err(|source| NetError::Bind {
            addr: format!("{host}:{port}"),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening");
        Ok(Rc::new(Self {
            slot: UnitSlot::new(),
            listener,
            local_addr,
            config,
            accept_failures: Cell::new(0),
        }))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ConnectionConfig<P::Deps> {
        &self.config
    }

    /// Count a failed accept. True for the first failure of a streak
    /// and every [`ACCEPT_WARN_EVERY`]th one after it.
    fn note_accept_failure(&self) -> bool {
        let streak = self.accept_failures.get().saturating_add(1);
        self.accept_failures.set(streak);
        streak % ACCEPT_WARN_EVERY == 1
    }
}

impl<P: Protocol> Schedulable for Listener<P> {
    fn slot(&self) -> &UnitSlot {
        &self.slot
    }

    fn step(&self) -> anyhow::Result<()> {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
            Err(e) => {
                if self.note_accept_failure() {
                    warn!(error = %e, failures = self.accept_failures.get(), "accept failed");
                } else {
                    debug!(error = %e, failures = self.accept_failures.get(), "accept failed");
                }
                return Ok(());
            }
        };
        self.accept_failures.set(0);

        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "dropping connection, cannot make it non-blocking");
            return Ok(());
        }
        info!(%peer, "new connection");

        let owner = self.slot.owner()?;
        let connection = Connection::<P>::new(stream, peer, &self.config.framing, &self.config.deps);
        owner.register(connection.clone())?;
        connection.activate()
    }

    fn label(&self) -> &'static str {
        "listener"
    }
}
