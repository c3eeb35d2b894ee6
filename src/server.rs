use crate::{Command, Connection, Db, Shutdown};

use crate::config::{config_local_pool_number, config_max_connection, LOGGER};
use crate::metrics::{
    CURRENT_CONNECTION_COUNTER, REQUEST_CMD_COUNTER, REQUEST_CMD_FINISH_COUNTER,
    REQUEST_CMD_HANDLE_TIME, REQUEST_COUNTER, TOTAL_CONNECTION_PROCESSED,
};
use crate::sweeper::Sweeper;

use std::future::Future;
use std::sync::Arc;

use slog::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration, Instant};
use tokio_util::task::LocalPoolHandle;

/// Server listener state. Created in the `run` call. It includes a
/// `run` method which performs the TCP listening and initialization
/// of per-connection state.
struct Listener {
    /// Shared keyspace handle.
    ///
    /// A clone is passed into each per-connection handler; handlers
    /// borrow it for the duration of a command and retain nothing
    /// across calls.
    db: Db,

    /// TCP listener supplied by the `run` caller.
    listener: TcpListener,

    limit_connections: Arc<Semaphore>,

    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the `run`
    /// caller. When a connection task is spawned, it is passed a
    /// broadcast receiver handle. On graceful shutdown a `()` value
    /// is sent via the broadcast::Sender; each active connection
    /// reaches a safe terminal state and completes its task.
    notify_shutdown: broadcast::Sender<()>,

    /// Used as part of the graceful shutdown process to wait for
    /// client connections to complete processing.
    ///
    /// Tokio channels close once all `Sender` handles go out of
    /// scope. Each connection handler holds a clone of
    /// `shutdown_complete_tx`; when the listener drops its own
    /// sender and every handler finishes, `recv()` on the receiver
    /// completes with `None` and the process can exit.
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

/// Per-connection handler. Reads requests from `connection` and
/// applies the commands to `db`.
struct Handler {
    db: Db,
    connection: Connection,
    shutdown: Shutdown,
    _shutdown_complete: mpsc::Sender<()>,
}

/// Run the cachette server.
///
/// Accepts connections from the supplied listener. For each inbound
/// connection, a task is spawned to handle that connection. The
/// server runs until the `shutdown` future completes, at which point
/// the server shuts down gracefully.
///
/// `tokio::signal::ctrl_c()` can be used as the `shutdown` argument.
/// This will listen for a SIGINT signal.
pub async fn run(listener: TcpListener, shutdown: impl Future) -> crate::Result<()> {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
    let db = Db::new();

    // Initialize the listener state
    let mut server = Listener {
        listener,
        db: db.clone(),
        limit_connections: Arc::new(Semaphore::new(config_max_connection())),
        notify_shutdown,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    let sweeper = Sweeper::new(db);

    let mut result = Ok(());
    tokio::select! {
        res = server.run() => {
            // If an error is received here, accepting connections
            // from the TCP listener failed multiple times and the
            // server is giving up and shutting down.
            //
            // Errors encountered when handling individual
            // connections do not bubble up to this point.
            if let Err(err) = res {
                error!(LOGGER, "failed to accept, cause {}", err.to_string());
                result = Err(err);
            }
        }
        _ = sweeper.run() => {
            error!(LOGGER, "expiration sweeper exit");
        }
        _ = shutdown => {
            // The shutdown signal has been received.
            info!(LOGGER, "shutting down");
        }
    }

    // Extract the `shutdown_complete` receiver and transmitter and
    // explicitly drop `shutdown_transmitter`. This is important, as
    // the `.await` below would otherwise never complete.
    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        ..
    } = server;

    // When `notify_shutdown` is dropped, all tasks which have
    // `subscribe`d will receive the shutdown signal and can exit.
    drop(notify_shutdown);
    // Drop final `Sender` so the `Receiver` below can complete.
    drop(shutdown_complete_tx);

    // Wait for all active connections to finish processing.
    let _ = shutdown_complete_rx.recv().await;

    result
}

impl Listener {
    /// Run the server
    ///
    /// Listen for inbound connections. For each inbound connection,
    /// spawn a task to process that connection.
    ///
    /// # Errors
    ///
    /// Returns `Err` if accepting returns an error repeatedly. This
    /// can happen for a number of reasons that resolve over time.
    /// For example, if the underlying operating system has reached
    /// an internal limit for max number of sockets, accept will
    /// fail; the back off strategy below absorbs transient cases.
    async fn run(&mut self) -> crate::Result<()> {
        info!(LOGGER, "accepting inbound connections");

        let local_pool = LocalPoolHandle::new(config_local_pool_number());

        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .unwrap();

            let socket = self.accept().await?;
            if let Ok(peer) = socket.peer_addr() {
                info!(
                    LOGGER,
                    "client connected, {}, concurrent clients = {}",
                    peer,
                    CURRENT_CONNECTION_COUNTER.get() + 1
                );
            }

            // Create the necessary per-connection handler state.
            let mut handler = Handler {
                db: self.db.clone(),
                connection: Connection::new(socket),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };
            local_pool.spawn_pinned(|| async move {
                // Process the connection. If an error is
                // encountered, log it.
                CURRENT_CONNECTION_COUNTER.inc();
                TOTAL_CONNECTION_PROCESSED.inc();
                if let Err(err) = handler.run().await {
                    error!(LOGGER, "connection error {:?}", err);
                }
                CURRENT_CONNECTION_COUNTER.dec();
                info!(
                    LOGGER,
                    "client disconnected, concurrent clients = {}",
                    CURRENT_CONNECTION_COUNTER.get()
                );
                drop(permit)
            });
        }
    }

    /// Accept an inbound connection.
    ///
    /// Errors are handled by backing off and retrying. An
    /// exponential backoff strategy is used. After the first
    /// failure, the task waits for 1 second. Each subsequent failure
    /// doubles the wait time. If accepting fails on the 6th try
    /// after waiting for 64 seconds, then this function returns with
    /// an error.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;

        // Try to accept a few times
        loop {
            // Perform the accept operation. If a socket is
            // successfully accepted, return it. Otherwise, save the
            // error.
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    error!(LOGGER, "accept error! {:?}", &err);
                    if backoff > 64 {
                        // Accept has failed too many times. Return
                        // the error.
                        return Err(err.into());
                    }
                }
            }

            // Pause execution until the back off period elapses.
            time::sleep(Duration::from_secs(backoff)).await;

            // Double the back off
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Process a single connection.
    ///
    /// Request frames are read from the socket and processed one at
    /// a time; the response for a command is fully written before
    /// the next command is read, so commands on one connection
    /// execute in wire-arrival order.
    ///
    /// When the shutdown signal is received, the connection is
    /// processed until it reaches a safe state, at which point it is
    /// terminated.
    async fn run(&mut self) -> crate::Result<()> {
        // As long as the shutdown signal has not been received, try
        // to read a new request frame.
        while !self.shutdown.is_shutdown() {
            // While reading a request frame, also listen for the
            // shutdown signal.
            let maybe_frame = tokio::select! {
                res = self.connection.read_frame() => res?,
                _ = self.shutdown.recv() => {
                    // If a shutdown signal is received, return from
                    // `run`, which terminates the task.
                    return Ok(());
                }
            };

            // If `None` is returned from `read_frame()` then the
            // peer closed the socket. There is no further work to do
            // and the task can be terminated.
            let frame = match maybe_frame {
                Some(frame) => frame,
                None => return Ok(()),
            };

            // Convert the frame into a command struct. This returns
            // an error only if the request is not an array frame;
            // the connection is then closed.
            let cmd = Command::from_frame(frame)?;
            let cmd_name = cmd.get_name().to_owned();

            let start_at = Instant::now();
            REQUEST_COUNTER.inc();
            REQUEST_CMD_COUNTER.with_label_values(&[&cmd_name]).inc();

            debug!(LOGGER, "req, {:?}", cmd);

            cmd.apply(&self.db, &mut self.connection).await?;

            let duration = Instant::now() - start_at;
            REQUEST_CMD_HANDLE_TIME
                .with_label_values(&[&cmd_name])
                .observe(duration_to_sec(duration));
            REQUEST_CMD_FINISH_COUNTER
                .with_label_values(&[&cmd_name])
                .inc();
        }

        Ok(())
    }
}

#[inline]
pub fn duration_to_sec(d: Duration) -> f64 {
    let nanos = f64::from(d.subsec_nanos());
    d.as_secs() as f64 + (nanos / 1_000_000_000.0)
}
