//! The arithmetic-solving protocol.

use std::rc::{Rc, Weak};

use mathcp_eval::{EvalError, Number};
use mathcp_loop::{JobError, Pool};
use mathcp_net::{Connection, FrameError, Protocol, Transport};
use tracing::debug;

/// Sent line by line when a client connects.
pub const BANNER: [&str; 6] = [
    "=====================================",
    " Welcome to math solver :D",
    " Allowed operations are: +, -, *, /",
    "",
    " Send 'exit' or Ctrl-C to quit",
    "=====================================",
];

pub const EMPTY_INPUT: &str = "Please enter an expression, e.g. 1 + 1";
pub const INVALID_EXPRESSION: &str = "Error: Invalid expression!";
pub const PROCESSING_FAILED: &str = "Error: Failed to process the message!";

const EXIT: &str = "exit";
const INTERRUPT: &str = "\u{3}";

/// Collaborators shared by every solver connection of a server.
#[derive(Clone)]
pub struct SolverDeps {
    pub pool: Rc<Pool>,
}

/// Evaluates each line on the worker pool and answers with the result.
pub struct MathSolver {
    pool: Rc<Pool>,
}

impl Protocol for MathSolver {
    type Deps = SolverDeps;

    fn create(deps: &SolverDeps) -> Self {
        Self {
            pool: deps.pool.clone(),
        }
    }

    fn on_connected<S: Transport>(&self, conn: &Connection<Self, S>) -> anyhow::Result<()> {
        for line in BANNER {
            conn.send(line)?;
        }
        Ok(())
    }

    fn on_message<S: Transport>(&self, conn: &Connection<Self, S>, message: &str) -> anyhow::Result<()> {
        if message.is_empty() {
            conn.send(EMPTY_INPUT)?;
            return Ok(());
        }
        if message == EXIT || message == INTERRUPT {
            conn.disconnect();
            return Ok(());
        }

        debug!(peer = %conn.peer_addr(), expression = message, "evaluating");
        let expression = message.to_string();
        let on_value = conn.weak();
        let on_failure = conn.weak();
        self.pool.submit(
            move || mathcp_eval::evaluate(&expression),
            move |value: Number| reply(&on_value, &value.to_string()),
            move |error: JobError<EvalError>| reply(&on_failure, &failure_reply(&error)),
        )?;
        Ok(())
    }

    fn on_message_error<S: Transport>(
        &self,
        conn: &Connection<Self, S>,
        _error: &FrameError,
    ) -> anyhow::Result<()> {
        conn.send(PROCESSING_FAILED)?;
        Ok(())
    }
}

/// The client may have left while its expression was being evaluated.
fn reply<S: Transport>(conn: &Weak<Connection<MathSolver, S>>, text: &str) -> anyhow::Result<()> {
    match conn.upgrade() {
        Some(conn) if !conn.is_closed() => {
            conn.send(text)?;
            Ok(())
        }
        _ => {
            debug!("dropping result for a closed connection");
            Ok(())
        }
    }
}

fn failure_reply(error: &JobError<EvalError>) -> String {
    match error.failure() {
        Some(e) if e.is_syntax() => INVALID_EXPRESSION.to_string(),
        _ => format!("Error: {error}"),
    }
}
