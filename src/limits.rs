//! Framework configuration limits and timeouts.
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks
//! - Header flooding
//!
//! All configuration is carried by one explicit [`Limits`] value passed at
//! construction time. There is no process-wide mutable default: two apps in
//! the same process can run with different limits, and tests construct
//! their own.
//!
//! # Examples
//!
//! ```
//! use rapid_web::{App, limits::Limits};
//!
//! let app = App::with_limits(Limits {
//!     body_limit: 16 * 1024,     // 16KB payloads
//!     more_requests: 500,        // higher concurrency
//!     ..Limits::default()
//! });
//! ```

use std::time::Duration;

/// Configuration consumed by the dispatch core and the transport adapter.
///
/// # Connection management
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [----------------]
/// [ Add to queue ] <====== | Queue if full? | =====> [ Drop / refuse  ]
/// [--------------]         \----------------/        [----------------]
///        ||
///        \/
/// [--------------------------------------------]
/// [ Worker pool (`more_requests` worker tasks) ]
/// [--------------------------------------------]
/// ```
///
/// The queue buffers accepted connections between the accept loop and
/// processing. Workers continuously poll it using the configured
/// [`wait_strategy`](Limits::wait_strategy).
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum request body size in bytes (default: `2_097_152`, 2 MiB).
    ///
    /// A body whose declared `Content-Length` exceeds this value is
    /// rejected with `413` before dispatch; the same ceiling applies to
    /// bodies handed to the test harness.
    pub body_limit: usize,

    /// Maximum size of the request head in bytes, request line plus all
    /// headers (default: `1_048_576`, 1 MiB).
    ///
    /// A head that grows past this ceiling is rejected with `431`.
    pub max_header_bytes: usize,

    /// Maximum number of registered routes (default: `1000`).
    ///
    /// Registration past this count fails with
    /// [`Error::RouteCapacity`](crate::Error::RouteCapacity).
    pub route_capacity: usize,

    /// Maximum number of concurrently processed requests (default: `290`).
    ///
    /// When serving starts, exactly this many worker tasks are created;
    /// each runs one connection at a time.
    pub more_requests: usize,

    /// Maximum number of TCP connections waiting in the admission queue
    /// (default: `250`).
    ///
    /// Accepted connections first go into this queue; workers pick them
    /// up from there. When the queue is full, new connections are dropped.
    pub max_pending_connections: usize,

    /// Strategy for worker task waiting behavior (default: `Sleep(50us)`).
    ///
    /// Controls how workers wait when the admission queue is empty.
    /// Affects latency, CPU usage, and throughput characteristics.
    pub wait_strategy: WaitStrategy,

    /// Maximum duration to wait for reading data from a socket
    /// (default: `2 seconds`).
    ///
    /// The primary mechanism for cleaning up stalled connections.
    pub socket_read_timeout: Duration,

    /// Maximum duration to wait for writing data to a socket
    /// (default: `3 seconds`).
    pub socket_write_timeout: Duration,

    /// Maximum number of requests allowed per keep-alive connection
    /// (default: `100`).
    ///
    /// The connection closes after processing this many requests.
    pub max_requests_per_connection: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            body_limit: 2 * 1024 * 1024,      // 2 MiB request bodies
            max_header_bytes: 1024 * 1024,    // 1 MiB request head
            route_capacity: 1000,
            more_requests: 290,

            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            max_requests_per_connection: 100,

            _priv: (),
        }
    }
}

/// Strategy for worker task waiting when no connections are available.
///
/// Different strategies optimize for different workload patterns.
/// Choose based on your latency requirements and resource constraints.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`].
    ///
    /// Lowest latency, near-full CPU utilization while idle.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`] with the given period.
    Sleep(Duration),
}

impl WaitStrategy {
    /// Parks the current task for one polling interval.
    pub(crate) async fn pause(&self) {
        match self {
            WaitStrategy::Yield => tokio::task::yield_now().await,
            WaitStrategy::Sleep(period) => tokio::time::sleep(*period).await,
        }
    }
}
