//! Scripted in-memory transport for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;

use crate::connection::{Connection, Protocol};
use crate::error::FrameError;
use crate::socket::Transport;

#[derive(Default)]
struct MockState {
    reads: VecDeque<io::Result<Vec<u8>>>,
    written: Vec<u8>,
    write_limit: Option<usize>,
    blocked_writes: usize,
    closed: bool,
}

/// Clones share state, so a test keeps one handle while the socket
/// owns another.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue bytes returned by one future read.
    pub(crate) fn feed(&self, bytes: &[u8]) {
        self.state.borrow_mut().reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue a zero-length read (peer closed).
    pub(crate) fn feed_eof(&self) {
        self.state.borrow_mut().reads.push_back(Ok(Vec::new()));
    }

    pub(crate) fn feed_error(&self, kind: ErrorKind) {
        self.state.borrow_mut().reads.push_back(Err(kind.into()));
    }

    pub(crate) fn pending_reads(&self) -> usize {
        self.state.borrow().reads.len()
    }

    /// Make the next `n` writes report `WouldBlock`.
    pub(crate) fn block_writes(&self, n: usize) {
        self.state.borrow_mut().blocked_writes = n;
    }

    /// Accept at most `n` bytes per write.
    pub(crate) fn limit_writes(&self, n: usize) {
        self.state.borrow_mut().write_limit = Some(n);
    }

    pub(crate) fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().written).into_owned()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        match state.reads.pop_front() {
            None => Err(ErrorKind::WouldBlock.into()),
            Some(Err(e)) => Err(e),
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    state.reads.push_front(Ok(bytes[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.blocked_writes > 0 {
            state.blocked_writes -= 1;
            return Err(ErrorKind::WouldBlock.into());
        }
        let n = state.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn close(&mut self) -> io::Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}

/// Shared record of what an [`Echo`] session saw.
#[derive(Clone, Default)]
pub(crate) struct EchoLog {
    seen: Rc<RefCell<Vec<String>>>,
    hangups: Rc<std::cell::Cell<u32>>,
}

impl EchoLog {
    pub(crate) fn seen(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }

    pub(crate) fn hangups(&self) -> u32 {
        self.hangups.get()
    }
}

/// Greets with `hello`, answers `echo: <msg>`, hangs up on `quit`.
pub(crate) struct Echo {
    log: EchoLog,
}

impl Protocol for Echo {
    type Deps = EchoLog;

    fn create(deps: &EchoLog) -> Self {
        Self { log: deps.clone() }
    }

    fn on_connected<S: Transport>(&self, conn: &Connection<Self, S>) -> anyhow::Result<()> {
        conn.send("hello")?;
        Ok(())
    }

    fn on_message<S: Transport>(&self, conn: &Connection<Self, S>, message: &str) -> anyhow::Result<()> {
        self.log.seen.borrow_mut().push(message.to_string());
        if message == "quit" {
            conn.disconnect();
        } else {
            conn.send(&format!("echo: {message}"))?;
        }
        Ok(())
    }

    fn on_message_error<S: Transport>(
        &self,
        conn: &Connection<Self, S>,
        _error: &FrameError,
    ) -> anyhow::Result<()> {
        conn.send("error")?;
        Ok(())
    }

    fn on_disconnect<S: Transport>(&self, _conn: &Connection<Self, S>) {
        self.log.hangups.set(self.log.hangups.get() + 1);
    }
}
