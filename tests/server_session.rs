#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end sessions over TCP against a live accept loop

use pop3_maildrop::config::ServerConfig;
use pop3_maildrop::error::Result;
use pop3_maildrop::transport::serve_with_shutdown;
use pop3_maildrop::utils::MetricsSnapshot;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// FIXTURES
// ============================================================================

/// `alice` holds two messages of 120 and 200 octets; `bob` has no maildrop
fn maildrops() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let alice = dir.path().join("alice");
    std::fs::create_dir(&alice).expect("mkdir");
    std::fs::write(alice.join("0001"), vec![b'a'; 120]).expect("write");
    std::fs::write(alice.join("0002"), vec![b'b'; 200]).expect("write");
    dir
}

struct Server {
    addr: SocketAddr,
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<Result<MetricsSnapshot>>,
}

impl Server {
    async fn start(base: &Path, tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig {
            bind_address: "127.0.0.1".into(),
            port: 0,
            base_directory: base.to_path_buf(),
            shutdown_timeout: Duration::from_secs(2),
            ..ServerConfig::default()
        };
        tweak(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(serve_with_shutdown(listener, config, shutdown_rx));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) -> MetricsSnapshot {
        self.shutdown.send(()).await.expect("shutdown");
        self.handle.await.expect("join").expect("serve")
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connect and consume the greeting
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };
        let greeting = client.line().await;
        assert_eq!(greeting, "+OK POP3 server ready");
        client
    }

    async fn send_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.expect("write");
    }

    async fn raw_line(&mut self) -> Vec<u8> {
        let mut line = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_until(b'\n', &mut line))
            .await
            .expect("reply timed out")
            .expect("read");
        assert!(n > 0, "connection closed while waiting for a reply");
        line
    }

    async fn line(&mut self) -> String {
        let line = self.raw_line().await;
        assert!(line.ends_with(b"\r\n"), "reply not CRLF terminated: {line:?}");
        String::from_utf8(line[..line.len() - 2].to_vec()).expect("utf8")
    }

    async fn command(&mut self, command: &str) -> String {
        self.send_raw(format!("{command}\r\n").as_bytes()).await;
        self.line().await
    }

    /// Body lines of a multi-line reply, terminator excluded, still stuffed
    async fn body(&mut self) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        loop {
            let line = self.raw_line().await;
            if line == b".\r\n" {
                return lines;
            }
            lines.push(line);
        }
    }

    async fn login(&mut self, user: &str) {
        assert!(self.command(&format!("USER {user}")).await.starts_with("+OK"));
        let reply = self.command("PASS secret").await;
        assert!(reply.starts_with("+OK"), "login refused: {reply}");
    }

    async fn assert_closed(&mut self) {
        let mut rest = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_to_end(&mut rest))
            .await
            .expect("close timed out")
            .expect("read");
        assert_eq!(n, 0, "unexpected trailing data {rest:?}");
    }
}

// ============================================================================
// SESSION SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_full_session_with_commit() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    client.login("alice").await;
    assert_eq!(client.command("STAT").await, "+OK 2 320");

    assert_eq!(client.command("LIST").await, "+OK 2 messages (320 octets)");
    assert_eq!(client.body().await, vec![b"1 120\r\n".to_vec(), b"2 200\r\n".to_vec()]);

    assert_eq!(client.command("RETR 1").await, "+OK 120 octets");
    let mut expected = vec![b'a'; 120];
    expected.extend_from_slice(b"\r\n");
    assert_eq!(client.body().await, vec![expected]);

    assert_eq!(client.command("DELE 1").await, "+OK message 1 deleted");
    assert_eq!(client.command("STAT").await, "+OK 1 200");
    assert!(client.command("QUIT").await.starts_with("+OK"));
    client.assert_closed().await;

    let maildrop = dir.path().join("alice");
    assert!(!maildrop.join("0001").exists());
    assert!(maildrop.join("0002").exists());

    let snapshot = server.stop().await;
    assert_eq!(snapshot.connections_total, 1);
    assert_eq!(snapshot.connections_active, 0);
    assert_eq!(snapshot.logins_success, 1);
}

#[tokio::test]
async fn test_unknown_user_refused() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    assert!(client.command("USER bob").await.starts_with("-ERR"));
    assert!(client.command("PASS secret").await.starts_with("-ERR"));
    assert!(client.command("STAT").await.starts_with("-ERR"));
    assert!(client.command("QUIT").await.starts_with("+OK"));
    client.assert_closed().await;

    let snapshot = server.stop().await;
    assert_eq!(snapshot.logins_failed, 1);
    assert_eq!(snapshot.logins_success, 0);
}

#[tokio::test]
async fn test_second_session_refused_until_first_quits() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;

    let mut first = Client::connect(server.addr).await;
    first.login("alice").await;

    let mut second = Client::connect(server.addr).await;
    assert!(second.command("USER alice").await.starts_with("+OK"));
    assert!(second.command("PASS secret").await.starts_with("-ERR"));

    // the first session still works
    assert_eq!(first.command("STAT").await, "+OK 2 320");
    assert!(first.command("QUIT").await.starts_with("+OK"));
    first.assert_closed().await;

    // same USER candidate, retried PASS
    assert!(second.command("PASS secret").await.starts_with("+OK"));
    assert_eq!(second.command("STAT").await, "+OK 2 320");

    drop(second);
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_discards_deletions() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;

    let mut client = Client::connect(server.addr).await;
    client.login("alice").await;
    assert!(client.command("DELE 1").await.starts_with("+OK"));
    assert!(client.command("DELE 2").await.starts_with("+OK"));
    drop(client);

    // the lock is released once the server notices the close
    let mut attempts = 0;
    let mut next = loop {
        let mut next = Client::connect(server.addr).await;
        assert!(next.command("USER alice").await.starts_with("+OK"));
        if next.command("PASS secret").await.starts_with("+OK") {
            break next;
        }
        attempts += 1;
        assert!(attempts < 50, "maildrop never unlocked");
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    assert_eq!(next.command("STAT").await, "+OK 2 320");
    assert!(dir.path().join("alice").join("0001").exists());
    drop(next);
    server.stop().await;
}

#[tokio::test]
async fn test_rset_restores_messages() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    client.login("alice").await;
    assert!(client.command("DELE 2").await.starts_with("+OK"));
    assert_eq!(client.command("RETR 2").await, "-ERR no such message");
    assert_eq!(client.command("DELE 2").await, "-ERR message 2 already deleted");
    assert_eq!(client.command("RSET").await, "+OK 1 message(s) unmarked");
    assert_eq!(client.command("RSET").await, "+OK 0 message(s) unmarked");
    assert!(client.command("QUIT").await.starts_with("+OK"));
    client.assert_closed().await;

    assert!(dir.path().join("alice").join("0002").exists());
    server.stop().await;
}

#[tokio::test]
async fn test_commands_in_wrong_state() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    for command in ["STAT", "LIST", "RETR 1", "DELE 1", "NOOP", "RSET"] {
        assert!(client.command(command).await.starts_with("-ERR"), "{command}");
    }
    client.login("alice").await;
    assert!(client.command("USER alice").await.starts_with("-ERR"));
    assert!(client.command("PASS x").await.starts_with("-ERR"));
    assert_eq!(client.command("NOOP").await, "+OK");

    drop(client);
    server.stop().await;
}

// ============================================================================
// FRAMING
// ============================================================================

#[tokio::test]
async fn test_pipelined_commands_answered_in_order() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    client
        .send_raw(b"USER alice\r\nPASS secret\r\nSTAT\r\nLIST 2\r\n")
        .await;
    assert!(client.line().await.starts_with("+OK"));
    assert!(client.line().await.starts_with("+OK"));
    assert_eq!(client.line().await, "+OK 2 320");
    assert_eq!(client.line().await, "+OK 2 200");

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_command_split_across_writes() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;

    client.send_raw(b"US").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"ER ali").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"ce\r").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send_raw(b"\n").await;
    assert!(client.line().await.starts_with("+OK"));

    // bare LF terminates a line too
    client.send_raw(b"PASS secret\n").await;
    assert!(client.line().await.starts_with("+OK"));

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_overlong_line_rejected_and_session_continues() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |config| config.max_line_length = 64).await;
    let mut client = Client::connect(server.addr).await;

    let mut long = vec![b'X'; 300];
    long.extend_from_slice(b"\r\n");
    client.send_raw(&long).await;
    assert_eq!(client.line().await, "-ERR line too long");

    client.login("alice").await;
    assert_eq!(client.command("STAT").await, "+OK 2 320");
    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_retr_dot_stuffs_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let carol = dir.path().join("carol");
    std::fs::create_dir(&carol).expect("mkdir");
    std::fs::write(carol.join("m"), b"Subject: dots\r\n\r\n.hidden\r\n..two\r\nend").expect("write");

    let server = Server::start(dir.path(), |_| {}).await;
    let mut client = Client::connect(server.addr).await;
    client.login("carol").await;

    assert_eq!(client.command("RETR 1").await, "+OK 36 octets");
    let body = client.body().await;
    assert_eq!(
        body,
        vec![
            b"Subject: dots\r\n".to_vec(),
            b"\r\n".to_vec(),
            b"..hidden\r\n".to_vec(),
            b"...two\r\n".to_vec(),
            b"end\r\n".to_vec(),
        ]
    );

    drop(client);
    server.stop().await;
}

// ============================================================================
// TIMEOUTS AND SHUTDOWN
// ============================================================================

#[tokio::test]
async fn test_idle_session_autologout_keeps_messages() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |config| {
        config.idle_timeout = Duration::from_millis(200);
    })
    .await;

    let mut client = Client::connect(server.addr).await;
    client.login("alice").await;
    assert!(client.command("DELE 1").await.starts_with("+OK"));

    assert_eq!(client.line().await, "-ERR autologout timer expired");
    client.assert_closed().await;
    assert!(dir.path().join("alice").join("0001").exists());

    let snapshot = server.stop().await;
    assert_eq!(snapshot.idle_timeouts, 1);
}

#[tokio::test]
async fn test_shutdown_with_no_sessions() {
    let dir = maildrops();
    let server = Server::start(dir.path(), |_| {}).await;
    let snapshot = server.stop().await;
    assert_eq!(snapshot.connections_total, 0);
    assert_eq!(snapshot.connections_active, 0);
}
