//! Server assembly: scheduler, worker pool and listener.

use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use mathcp_core::{FramingConfig, MathcpConfig};
use mathcp_loop::{Pool, PoolConfig, Scheduler, StopToken};
use mathcp_net::{ConnectionConfig, Encoding, FrameError, Framing, Listener};
use tracing::info;

use crate::solver::{MathSolver, SolverDeps};

/// A bound, ready-to-run solver server.
///
/// Lives on one thread; only the [`StopToken`] may cross to another.
pub struct Server {
    scheduler: Scheduler,
    listener: Rc<Listener<MathSolver>>,
    pool: Rc<Pool>,
    pause: Duration,
}

impl Server {
    /// Validate the framing, start the worker pool and bind the listener.
    ///
    /// Fails before binding on a bad framing configuration.
    pub fn bind(config: &MathcpConfig) -> anyhow::Result<Self> {
        let framing = framing_from(&config.framing)?;

        let pool_config = match config.pool.workers {
            Some(workers) => PoolConfig { workers },
            None => PoolConfig::default(),
        };
        let pool = Rc::new(Pool::new(pool_config)?);

        let scheduler = Scheduler::new();
        scheduler.register(pool.clone())?;

        let deps = SolverDeps { pool: pool.clone() };
        let listener = Listener::<MathSolver>::bind(
            &config.server.host,
            config.server.port,
            ConnectionConfig::new(framing, deps),
        )?;
        scheduler.register(listener.clone())?;

        Ok(Self {
            scheduler,
            listener,
            pool,
            pause: config.pause(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn stop_token(&self) -> StopToken {
        self.scheduler.stop_token()
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Serve until the stop token fires or a unit fails.
    pub fn run(&self) -> anyhow::Result<()> {
        info!(addr = %self.local_addr(), "math solver ready");
        self.scheduler.run(0, self.pause)?;
        info!("server stopped");
        Ok(())
    }
}

/// Build the wire framing from its configuration.
pub fn framing_from(config: &FramingConfig) -> Result<Framing, FrameError> {
    let encoding: Encoding = config.encoding.parse()?;
    Framing::new(&config.delimiter, &config.terminator, encoding)
}
