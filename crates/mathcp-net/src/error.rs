//! Network layer error types.

use std::io;

use thiserror::Error;

/// Errors local to one framed socket or one message.
///
/// None of these tear the connection down on their own; they are
/// handed to the connection's error hook.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error("message is not valid {encoding}: {reason}")]
    Decode {
        encoding: &'static str,
        reason: String,
    },

    #[error("message cannot be encoded as {encoding}: {reason}")]
    Encode {
        encoding: &'static str,
        reason: String,
    },

    #[error("message handler failed: {0:#}")]
    Handler(anyhow::Error),

    #[error("socket is closed")]
    Closed,

    #[error("delimiter must not be empty")]
    InvalidDelimiter,

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

/// Errors raised while setting up the listening socket.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

pub type NetResult<T> = Result<T, NetError>;
