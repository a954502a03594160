//! mathcpd — arithmetic over a line-oriented TCP session.
//!
//! [`Server`] wires the pieces together on one scheduling thread:
//!
//! ```text
//! Scheduler ──┬── Pool (worker runtime)
//!             ├── Listener<MathSolver>
//!             ├── Connection<MathSolver> ── FramedSocket   (per client)
//!             └── Task                                    (per expression)
//! ```

pub mod server;
pub mod solver;

pub use server::{Server, framing_from};
pub use solver::{BANNER, EMPTY_INPUT, INVALID_EXPRESSION, MathSolver, PROCESSING_FAILED, SolverDeps};
