//! mathcp-loop — single-threaded cooperative scheduling.
//!
//! Every participant of the server (listener, connections, framed
//! sockets, offloaded tasks) is a [`Schedulable`] unit. The
//! [`Scheduler`] steps each attached unit once per pass, in
//! registration order, and never blocks on any of them.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── LoopState (ordered units, weak back-references via LoopHandle)
//!   ├── StopToken (cross-thread shutdown flag, checked between passes)
//!   └── Units
//!       ├── Pool (no per-pass work, owns the tokio worker runtime)
//!       └── Task (polls a oneshot result, fires one callback, detaches)
//! ```
//!
//! CPU-bound work leaves the loop through [`Pool::submit`] and comes
//! back through the [`Task`] that polls its result.

pub mod error;
pub mod pool;
pub mod scheduler;
pub mod unit;

pub use error::{JobError, LoopError, LoopResult};
pub use pool::{Pool, PoolConfig, Task, TaskStatus};
pub use scheduler::{LoopHandle, Scheduler, StopToken};
pub use unit::{Schedulable, UnitId, UnitSlot};
