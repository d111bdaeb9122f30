// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Decrements the active connection counter when the connection task ends
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept a connection, enforcing `performance.max_connections`.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `shutdown` - Flips to `true` when the server starts draining
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);
    let guard = ConnectionGuard(Arc::clone(conn_counter));

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    if let Err(e) = stream.set_nodelay(true) {
        logger::log_warning(&format!("Failed to set TCP_NODELAY for {peer_addr}: {e}"));
    }

    tokio::spawn(serve_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        shutdown,
        guard,
    ));
}

/// Serve one HTTP/1.1 connection until it closes.
///
/// Once `connection_timeout` elapses or shutdown is requested, the request in
/// flight is answered and the connection is then closed.
async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
    _guard: ConnectionGuard,
) {
    let io = TokioIo::new(stream);
    let timeout = std::time::Duration::from_secs(state.config.performance.connection_timeout);

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(timeout)
        .keep_alive(state.config.performance.keep_alive_timeout > 0);

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| handler::handle_request(req, Arc::clone(&service_state), peer_addr)),
    );
    tokio::pin!(conn);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut expired = false;

    let mut draining = *shutdown.borrow();
    if draining {
        conn.as_mut().graceful_shutdown();
    }

    // Neither the deadline nor a shutdown cuts a request short: both only stop
    // the connection from taking the next one
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    logger::log_connection_error(&err);
                }
                break;
            }
            () = &mut deadline, if !expired => {
                expired = true;
                logger::log_warning(&format!(
                    "Connection from {peer_addr} reached {} seconds, closing after the current request",
                    timeout.as_secs()
                ));
                conn.as_mut().graceful_shutdown();
            }
            _ = shutdown.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}
