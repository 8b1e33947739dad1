//! TCP accept loop and connection driver.
//!
//! The accept loop and every connection task share one thread when run on a
//! current-thread runtime, which is how the `pop3d` binary runs it. A
//! connection task reads framed lines, feeds them to its session and writes
//! each reply in full before reading the next line. Turns that read or
//! unlink maildrop files (PASS, RETR, QUIT) run on the blocking pool.

use crate::config::ServerConfig;
use crate::core::codec::Pop3Codec;
use crate::core::framer::Inbound;
use crate::error::{constants, Pop3Error, Result};
use crate::protocol::command::{split_keyword, Keyword};
use crate::protocol::reply::Reply;
use crate::protocol::session::Session;
use crate::protocol::state::State;
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

/// Bind the configured address and serve until Ctrl-C
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(config.listen_address()?).await?;
    serve(listener, config).await
}

/// Serve `listener` until Ctrl-C
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(forward_signal(tokio::signal::ctrl_c(), shutdown_tx));

    serve_with_shutdown(listener, config, shutdown_rx).await?;
    Ok(())
}

/// Send on `shutdown_tx` once `signal` fires.
///
/// If the handler cannot be installed the sender is held forever, so the
/// server keeps running instead of reading a closed channel as shutdown.
async fn forward_signal<F>(signal: F, shutdown_tx: mpsc::Sender<()>)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
        Err(e) => {
            error!(error = %e, "Unable to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Counts one connection as active until dropped, including by a panic
struct ActiveConnection(Arc<Metrics>);

impl ActiveConnection {
    fn open(metrics: Arc<Metrics>) -> Self {
        metrics.connection_established();
        Self(metrics)
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.connection_closed();
    }
}

/// Serve `listener` until `shutdown_rx` fires or its sender is dropped.
///
/// Stops accepting on shutdown, then waits up to `shutdown_timeout` for open
/// sessions to end. Returns the final metrics.
#[instrument(skip_all, fields(base_directory = %config.base_directory.display()))]
pub async fn serve_with_shutdown(
    listener: TcpListener,
    config: ServerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<MetricsSnapshot> {
    let config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());

    info!(address = %listener.local_addr()?, "POP3 server listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Stopped accepting connections");
                break;
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        let active = ActiveConnection::open(Arc::clone(&metrics));
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&config),
                            active,
                        ));
                    }
                    Err(e) => {
                        metrics.connection_error();
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }

    drop(listener);
    drain(&metrics, config.shutdown_timeout).await;
    metrics.log_metrics();
    Ok(metrics.snapshot())
}

/// Wait for open connections to finish, at most `grace`
async fn drain(metrics: &Metrics, grace: Duration) {
    if metrics.active_connections() == 0 {
        return;
    }

    info!(
        connections = metrics.active_connections(),
        "Waiting for connections to close"
    );

    let timeout = tokio::time::sleep(grace);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            _ = &mut timeout => {
                warn!(
                    connections = metrics.active_connections(),
                    "Shutdown timeout reached, abandoning open sessions"
                );
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if metrics.active_connections() == 0 {
                    info!("All connections closed, shutting down");
                    break;
                }
            }
        }
    }
}

#[instrument(name = "connection", skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    active: ActiveConnection,
) {
    debug!("Connection accepted");
    let metrics = &active.0;

    let mut session = Session::new(&config.base_directory)
        .with_peer(peer)
        .with_greeting(config.greeting.clone());
    let mut framed = Framed::new(stream, Pop3Codec::new(config.max_line_length));

    if let Err(e) = drive(&mut framed, &mut session, config.idle_timeout, metrics).await {
        metrics.connection_error();
        warn!(error = %e, "Connection failed");
    }

    session.close();
    info!(state = %session.state(), "Connection closed");
}

/// Run one session to completion: greeting, then line/reply turns
async fn drive(
    framed: &mut Framed<TcpStream, Pop3Codec>,
    session: &mut Session,
    idle_timeout: Duration,
    metrics: &Metrics,
) -> Result<()> {
    framed.send(session.greeting()).await?;

    while !session.is_finished() {
        let inbound = match tokio::time::timeout(idle_timeout, framed.next()).await {
            Ok(Some(item)) => item?,
            Ok(None) => {
                debug!(state = %session.state(), "Peer closed the connection");
                return Ok(());
            }
            Err(_) => {
                metrics.idle_timeout();
                info!(state = %session.state(), "Autologout timer expired");
                framed.send(Reply::err(constants::ERR_AUTOLOGOUT)).await?;
                return Ok(());
            }
        };

        let keyword = keyword_of(&inbound);
        let login_attempt =
            session.state() == State::Authorization && matches!(keyword, Some(Keyword::Pass));
        let reply = match keyword {
            Some(Keyword::Pass | Keyword::Retr | Keyword::Quit) => {
                handle_blocking(session, inbound).await?
            }
            _ => session.handle_inbound(inbound),
        };

        metrics.command(reply.is_ok());
        if login_attempt {
            if session.state() == State::Transaction {
                metrics.login_success();
            } else {
                metrics.login_failed();
            }
        }

        framed.send(reply).await?;
    }

    Ok(())
}

/// Run one turn on the blocking pool, putting `session` back afterwards
async fn handle_blocking(session: &mut Session, inbound: Inbound) -> Result<Reply> {
    let placeholder = Session::new(session.base_directory());
    let owned = std::mem::replace(session, placeholder);

    let (owned, reply) = tokio::task::spawn_blocking(move || {
        let mut owned = owned;
        let reply = owned.handle_inbound(inbound);
        (owned, reply)
    })
    .await
    .map_err(|e| Pop3Error::Io(io::Error::other(e)))?;

    *session = owned;
    Ok(reply)
}

fn keyword_of(inbound: &Inbound) -> Option<Keyword> {
    match inbound {
        Inbound::Line(line) => split_keyword(line).ok().map(|(keyword, _)| keyword),
        Inbound::Overlong => None,
    }
}
