//! End-to-end sessions against a real server.
//!
//! Each test starts a server on an ephemeral port in a background
//! thread and talks to it over `std::net::TcpStream`.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mathcp_core::MathcpConfig;
use mathcp_loop::StopToken;
use mathcpd::{BANNER, EMPTY_INPUT, INVALID_EXPRESSION, Server};

struct Running {
    addr: SocketAddr,
    stop: StopToken,
    thread: Option<JoinHandle<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn start_with(config: MathcpConfig) -> Running {
    let (tx, rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        let server = Server::bind(&config).unwrap();
        tx.send((server.local_addr(), server.stop_token())).unwrap();
        server.run().unwrap();
    });
    let (addr, stop) = rx.recv().unwrap();
    Running {
        addr,
        stop,
        thread: Some(thread),
    }
}

fn start() -> Running {
    start_with(MathcpConfig::default().with_overrides(Some("127.0.0.1".to_string()), Some(0)))
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(server: &Running) -> Self {
        let stream = TcpStream::connect(server.addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    /// Connect and consume the banner.
    fn session(server: &Running) -> Self {
        let mut client = Self::connect(server);
        let banner: Vec<String> = (0..BANNER.len()).map(|_| client.read_line()).collect();
        assert_eq!(banner, BANNER);
        client
    }

    fn send(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).unwrap();
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).unwrap();
        assert!(n > 0, "server closed the connection unexpectedly");
        assert!(line.ends_with("\r\n"), "line not CRLF-terminated: {line:?}");
        line.truncate(line.len() - 2);
        line
    }

    fn ask(&mut self, expression: &str) -> String {
        self.send(&format!("{expression}\r\n"));
        self.read_line()
    }

    fn assert_closed(&mut self) {
        let mut rest = String::new();
        assert_eq!(self.reader.read_line(&mut rest).unwrap(), 0, "got {rest:?}");
    }
}

#[test]
fn greets_with_banner() {
    let server = start();
    let _client = Client::session(&server);
}

#[test]
fn solves_expressions() {
    let server = start();
    let mut client = Client::session(&server);

    assert_eq!(client.ask("1 + 1"), "2");
    assert_eq!(client.ask("2 / 2"), "1.0");
    assert_eq!(client.ask("((1 + 3) / 3.14) * 4 - 5.1"), "-0.004458598726114538");
    assert_eq!(client.ask("2 + (-1 + 3)"), "4");
}

#[test]
fn reports_errors_and_stays_open() {
    let server = start();
    let mut client = Client::session(&server);

    assert_eq!(client.ask("2 * pi"), INVALID_EXPRESSION);
    assert_eq!(client.ask("1 ++ 3"), INVALID_EXPRESSION);
    assert_eq!(client.ask("1 / 0"), "Error: division by zero");
    assert_eq!(client.ask("   "), EMPTY_INPUT);
    assert_eq!(client.ask("3 * 3"), "9");
}

#[test]
fn exit_closes_the_connection() {
    let server = start();
    let mut client = Client::session(&server);

    client.send("exit\r\n");
    client.assert_closed();
}

#[test]
fn interrupt_closes_the_connection() {
    let server = start();
    let mut client = Client::session(&server);

    client.send("\u{3}\r\n");
    client.assert_closed();
}

#[test]
fn exit_is_case_sensitive() {
    let server = start();
    let mut client = Client::session(&server);

    assert_eq!(client.ask("EXIT"), INVALID_EXPRESSION);
}

#[test]
fn messages_after_exit_are_dropped() {
    let server = start();
    let mut client = Client::session(&server);

    client.send("exit\r\n1 + 1\r\n");
    let mut rest = String::new();
    match client.reader.read_line(&mut rest) {
        Ok(n) => assert_eq!(n, 0, "got {rest:?}"),
        Err(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
    }
}

#[test]
fn pipelined_requests_all_get_answers() {
    let server = start();
    let mut client = Client::session(&server);

    client.send("1 + 1\r\n2 * 3\r\n10 - 4 - 3\r\n");
    let mut answers: Vec<String> = (0..3).map(|_| client.read_line()).collect();
    answers.sort();
    assert_eq!(answers, ["2", "3", "6"]);
}

#[test]
fn message_split_across_writes() {
    let server = start();
    let mut client = Client::session(&server);

    client.send("12 ");
    thread::sleep(Duration::from_millis(20));
    client.send("* 12\r");
    thread::sleep(Duration::from_millis(20));
    client.send("\n");
    assert_eq!(client.read_line(), "144");
}

#[test]
fn concurrent_clients_do_not_cross_talk() {
    let server = start();
    let mut a = Client::session(&server);
    let mut b = Client::session(&server);

    a.send("6 * 7\r\n");
    b.send("100 - 1\r\n");
    a.send("1 / 4\r\n");
    b.send("2 * pi\r\n");

    let mut from_a = vec![a.read_line(), a.read_line()];
    let mut from_b = vec![b.read_line(), b.read_line()];
    from_a.sort();
    from_b.sort();
    assert_eq!(from_a, ["0.25", "42"]);
    assert_eq!(from_b, ["99", INVALID_EXPRESSION]);
}

#[test]
fn one_client_leaving_does_not_affect_another() {
    let server = start();
    let mut a = Client::session(&server);
    let mut b = Client::session(&server);

    a.send("exit\r\n");
    a.assert_closed();
    assert_eq!(b.ask("5 + 5"), "10");

    drop(b);
    let mut c = Client::session(&server);
    assert_eq!(c.ask("7 - 8"), "-1");
}

#[test]
fn latin1_framing() {
    let mut config = MathcpConfig::default().with_overrides(Some("127.0.0.1".to_string()), Some(0));
    config.framing.encoding = "latin1".to_string();
    let server = start_with(config);
    let mut client = Client::session(&server);

    client.writer.write_all(b"1 \xe9 1\r\n").unwrap();
    assert_eq!(client.read_line(), INVALID_EXPRESSION);
    assert_eq!(client.ask("1.5 * 2"), "3.0");
}

#[test]
fn invalid_utf8_gets_the_generic_error() {
    let server = start();
    let mut client = Client::session(&server);

    client.writer.write_all(b"1 + \xff\r\n").unwrap();
    assert_eq!(client.read_line(), "Error: Failed to process the message!");
    assert_eq!(client.ask("2 + 2"), "4");
}
