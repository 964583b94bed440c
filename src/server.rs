use std::{net::SocketAddr, sync::Arc};

use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::{
    net::{TcpListener, TcpSocket},
    sync::{oneshot, watch, Semaphore},
    task::JoinHandle,
};

use crate::{
    config,
    http::client::Client,
    service::{Dispatch, Handler, Slot},
    sync::drain::Drain,
    Error,
};

/// In-process HTTP/1.1 server. [`Server::start`] binds the listening socket
/// and spawns a Tokio task that accepts connections and serves each one on
/// its own task, handing every request to the installed [`Handler`].
/// Closing the server stops accepting connections and gracefully finishes
/// the ones already open:
///
/// ```text
///                     +--------+
///                     | Server |
///                     +--------+
///                         |
///                         v
///                     +--------+
///                +--- | Select | ---+
///                |    +--------+    |
///                v                  v
///          +----------+       +----------+
///          |  Accept  |       | Shutdown |
///          +----------+       +----------+
///                |                  |
///                v                  v
///          +----------+       +----------+
///          |  Spawn   |       |  Drain   |
///          +----------+       +----------+
///                |                  |
///                v                  v
/// +--------+   +--------+   +--------+   +--------+
/// | Conn 1 |   | Conn 2 |   | Conn 3 |   | Conn 4 |
/// +--------+   +--------+   +--------+   +--------+
/// ```
///
/// Dropping the [`Server`] also triggers the shutdown, but doesn't wait for
/// it to complete. Use [`Server::close`] for that.
pub struct Server {
    /// Socket address used by this server to listen for incoming connections.
    address: SocketAddr,

    /// Top level handler, shared with every connection task.
    slot: Arc<Slot>,

    /// State updates. See [`Server::subscribe`].
    state: watch::Receiver<State>,

    /// Shutdown trigger. Taken on close, and dropping it also works as a
    /// trigger.
    shutdown: Option<oneshot::Sender<()>>,

    /// Task running the accept loop.
    task: Option<JoinHandle<()>>,
}

/// Represents the current state of the server.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Server has started but is not accepting connections yet.
    Starting,

    /// Server is accepting incoming connections.
    Listening,

    /// Maximum number of connections reached.
    MaxConnectionsReached(usize),

    /// Server is gracefully shutting down.
    ShuttingDown(ShutdownState),
}

/// Represents a state in the graceful shutdown process.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShutdownState {
    /// The server won't accept more connections, but it's still waiting for
    /// this many open connections to finish.
    PendingConnections(usize),

    /// Shutdown process complete.
    Done,
}

impl Server {
    /// Binds a socket for `config.listen` and starts accepting connections
    /// in the background. Must be called from within a Tokio runtime. If the
    /// port is 0 the OS picks one, see [`Server::socket_address`].
    pub fn start(config: config::Server) -> Result<Self, Error> {
        let socket = if config.listen.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        #[cfg(not(windows))]
        socket.set_reuseaddr(true)?;

        socket.bind(config.listen)?;

        let listener = socket.listen(config.backlog)?;
        let address = listener.local_addr()?;

        let (state_sender, state) = watch::channel(State::Starting);
        let (shutdown, shutdown_receiver) = oneshot::channel();
        let slot = Arc::new(Slot::default());

        let task = tokio::task::spawn(run(
            Listener {
                listener,
                log_name: config.log_name(address),
                connections: Arc::new(Semaphore::new(config.connections)),
                max_connections: config.connections,
                slot: slot.clone(),
            },
            state_sender,
            shutdown_receiver,
        ));

        Ok(Self {
            address,
            slot,
            state,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    /// Address of the listening socket. This is necessary for obtaining the
    /// actual address in cases port 0 was used.
    pub fn socket_address(&self) -> SocketAddr {
        self.address
    }

    /// Base URL of this server, `http://{address}`.
    pub fn url(&self) -> Uri {
        Uri::builder()
            .scheme("http")
            .authority(self.address.to_string())
            .path_and_query("/")
            .build()
            .unwrap_or_else(|_| unreachable!("socket addresses are valid authorities"))
    }

    /// Client that can perform requests against this server, or any other.
    pub fn client(&self) -> Client {
        Client::new()
    }

    /// Installs `handler` as the top level handler, replacing the previous
    /// one. Requests already being handled are not affected.
    pub fn set_handler(&self, handler: impl Handler) {
        self.install(Arc::new(handler));
    }

    pub(crate) fn install(&self, handler: Arc<dyn Handler>) {
        self.slot.set(handler);
    }

    /// By subscribing to this server the caller obtains a channel where the
    /// current state of the server can be read.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.clone()
    }

    /// Stops accepting connections and waits until all open connections are
    /// done. Calling it again does nothing.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!("{} => Listener task failed: {err}", self.address);
            }
        }
    }
}

/// Accept loop plus graceful shutdown. Runs on its own task until
/// `shutdown` completes, either because a value was sent or because the
/// sender was dropped.
async fn run(
    listener: Listener,
    state: watch::Sender<State>,
    shutdown: oneshot::Receiver<()>,
) {
    let log_name = listener.log_name.clone();
    let drain = Drain::new();

    state.send_replace(State::Listening);
    tracing::info!("{log_name} => Listening for requests");

    tokio::select! {
        result = listener.listen(&drain, &state) => {
            if let Err(err) = result {
                tracing::warn!("{log_name} => Error while accepting connections: {err}");
            }
        }
        _ = shutdown => {
            tracing::info!("{log_name} => Received shutdown signal");
        }
    }

    // Drop the listener to stop accepting new connections. Any new client
    // socket that attempts to connect gets "Connection Refused" from now on,
    // while already connected sockets can still send and receive data.
    drop(listener);

    let pending = drain.start();

    if pending > 0 {
        tracing::info!("{log_name} => Can't shutdown yet, {pending} pending connections");
        state.send_replace(State::ShuttingDown(ShutdownState::PendingConnections(
            pending,
        )));
    }

    drain.finish().await;

    state.send_replace(State::ShuttingDown(ShutdownState::Done));
    tracing::info!("{log_name} => Shutdown complete");
}

/// Listens for incoming connections and spawns tasks to handle them if
/// permits are available.
struct Listener {
    /// Underlying TCP listener. Dropping this struct closes the socket.
    listener: TcpListener,

    /// Listening address plus optional server name.
    log_name: String,

    /// Connection permits.
    connections: Arc<Semaphore>,

    /// Total number of permits, for state updates.
    max_connections: usize,

    /// Handler shared with every connection.
    slot: Arc<Slot>,
}

impl Listener {
    async fn listen(&self, drain: &Drain, state: &watch::Sender<State>) -> Result<(), Error> {
        loop {
            let mut notify_listening_again = false;

            if self.connections.available_permits() == 0 {
                tracing::info!(
                    "{} => Reached max connections: {}",
                    self.log_name,
                    self.max_connections
                );
                state.send_replace(State::MaxConnectionsReached(self.max_connections));
                notify_listening_again = true;
            }

            // The semaphore is never closed, so acquiring only fails if
            // that changes.
            let Ok(permit) = self.connections.clone().acquire_owned().await else {
                return Ok(());
            };

            if notify_listening_again {
                tracing::info!("{} => Accepting connections again", self.log_name);
                state.send_replace(State::Listening);
            }

            let (stream, client_addr) = self.listener.accept().await?;
            let mut draining = drain.watch();
            let service = Dispatch::new(self.slot.clone());
            let log_name = self.log_name.clone();

            tracing::debug!("{log_name} => Accepted connection from {client_addr}");

            tokio::task::spawn(async move {
                let connection = hyper::server::conn::http1::Builder::new()
                    .preserve_header_case(true)
                    .title_case_headers(true)
                    .serve_connection(TokioIo::new(stream), service);

                tokio::pin!(connection);

                tokio::select! {
                    result = connection.as_mut() => {
                        if let Err(err) = result {
                            tracing::debug!("{log_name} => Failed to serve {client_addr}: {err}");
                        }
                    }
                    _ = draining.signaled() => {
                        connection.as_mut().graceful_shutdown();
                        if let Err(err) = connection.as_mut().await {
                            tracing::debug!("{log_name} => Failed to serve {client_addr}: {err}");
                        }
                    }
                }

                // Both are dropped only when the accepted socket is done
                // sending and receiving data.
                drop(draining);
                drop(permit);
            });
        }
    }
}
