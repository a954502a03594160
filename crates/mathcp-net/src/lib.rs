//! mathcp-net — line-oriented TCP on the cooperative loop.
//!
//! # Components
//!
//! - **`codec`** — delimiter framing and text encodings
//! - **`socket`** — [`FramedSocket`], buffered non-blocking I/O as a unit
//! - **`connection`** — [`Connection`] and the [`Protocol`] capability
//! - **`listener`** — [`Listener`], accepts clients into connections
//!
//! ```text
//! Listener ──accept──► Connection<P> ──owns──► FramedSocket
//!                            ▲                     │
//!                            └── SocketEvents ◄────┘
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod listener;
pub mod socket;

#[cfg(test)]
mod mock;

pub use codec::{Encoding, Framing, LineCodec};
pub use connection::{Connection, Protocol};
pub use error::{FrameError, NetError, NetResult};
pub use listener::{ConnectionConfig, Listener};
pub use socket::{FramedSocket, READ_CHUNK, SocketEvent, SocketEvents, Transport};
