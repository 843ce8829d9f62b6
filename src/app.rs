//! The application: route registration, dispatch and the serving loop.
//!
//! An [`App`] is built in two phases. During **registration** the app is
//! exclusively owned and routes, middleware and static mounts are added;
//! any registration error is fatal to startup. Once [`App::serve`] (or
//! [`App::listen`]) spawns worker tasks the app's state is shared and
//! frozen: further registration fails with
//! [`Error::AlreadyServing`](crate::Error::AlreadyServing), so the hot
//! path reads the route table without any locking.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam::queue::SegQueue;
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::watch,
};

use crate::{
    ctx::Ctx,
    errors::Error,
    http::{request::Request, response::Response, types::Method, types::StatusCode},
    limits::Limits,
    middleware::{Chain, Handler, Middleware},
    router::table::{RouteInfo, RouteTable},
    server::connection,
};

/// The framework entry point.
///
/// # Examples
///
/// ```no_run
/// use rapid_web::App;
///
/// #[tokio::main]
/// async fn main() -> Result<(), rapid_web::Error> {
///     let mut app = App::new();
///     app.get("/", |ctx| ctx.string("Quick in action!"))?;
///     app.get("/users/:id", |ctx| {
///         let id = ctx.param("id").to_owned();
///         ctx.string(&id)
///     })?;
///
///     app.listen("127.0.0.1:8080").await
/// }
/// ```
pub struct App {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    table: RouteTable,
    chain: Chain,
    queue: ConnQueue,
    pub(crate) limits: Limits,
    pub(crate) lifecycle: Lifecycle,
}

impl App {
    /// Creates an app with default [`Limits`].
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates an app with explicit limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: RouteTable::new(limits.route_capacity),
                chain: Chain::new(),
                queue: Arc::new(SegQueue::new()),
                limits,
                lifecycle: Lifecycle::new(),
            }),
        }
    }

    fn registration(&mut self) -> Result<&mut Inner, Error> {
        Arc::get_mut(&mut self.inner).ok_or(Error::AlreadyServing)
    }

    fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.registration()?
            .table
            .register(method, pattern, Arc::new(handler))
    }

    /// Registers a `GET` route.
    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Get, pattern, handler)
    }

    /// Registers a `POST` route.
    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Post, pattern, handler)
    }

    /// Registers a `PUT` route.
    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Put, pattern, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Delete, pattern, handler)
    }

    /// Registers a `PATCH` route.
    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Patch, pattern, handler)
    }

    /// Registers an `OPTIONS` route.
    pub fn options<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Options, pattern, handler)
    }

    /// Registers a `HEAD` route.
    pub fn head<F>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut Ctx) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::Head, pattern, handler)
    }

    /// Appends a middleware to the chain. The first middleware registered
    /// runs outermost.
    pub fn use_<M>(&mut self, middleware: M) -> Result<(), Error>
    where
        M: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        let boxed: Middleware = Box::new(middleware);
        self.registration()?.chain.push(boxed);
        Ok(())
    }

    /// Serves the files under `dir` at `prefix`.
    ///
    /// `GET {prefix}/a/b.css` resolves to `{dir}/a/b.css`. Requests whose
    /// remainder contains a `..` segment are answered with `404` without
    /// touching the filesystem.
    pub fn static_dir(&mut self, prefix: &str, dir: &str) -> Result<(), Error> {
        let pattern = format!("{}/*", prefix.trim_end_matches('/'));
        let root = std::path::PathBuf::from(dir);

        self.route(Method::Get, &pattern, move |ctx| {
            let rest = ctx.param("*").to_owned();
            if rest.is_empty() || rest.split('/').any(|seg| seg == "..") {
                return Err(Error::FileNotFound(root.join(&rest)));
            }
            ctx.file(root.join(rest))
        })
    }

    /// Registration-ordered snapshot of the bound routes.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner.table.routes()
    }

    /// The limits this app was built with.
    pub fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    /// Runs one request through routing, the middleware chain and the
    /// matched handler, producing the response that would go on the wire.
    ///
    /// This is the single funnel shared by the transport adapter and the
    /// test harness.
    pub fn dispatch(&self, request: Request) -> Response {
        self.inner.dispatch(request)
    }

    /// Binds `addr` and serves until [`App::shutdown`] is called.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves connections from `listener` until [`App::shutdown`] is
    /// called, then waits for in-flight requests to drain.
    ///
    /// Accepted connections go through a bounded admission queue drained
    /// by [`more_requests`](Limits::more_requests) worker tasks; when the
    /// queue is full, further connections are answered with `503`.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Error> {
        let queue = self.inner.queue.clone();
        let overflow: ConnQueue = Arc::new(SegQueue::new());
        let mut shutdown = self.inner.lifecycle.shutdown.subscribe();

        for _ in 0..self.inner.limits.more_requests {
            Self::spawn_worker(self.inner.clone());
        }
        Self::spawn_alarmist(self.inner.clone(), overflow.clone());

        // `changed` only reports flips after `subscribe`; a shutdown that
        // was signaled earlier is caught here.
        while !self.inner.lifecycle.is_shutting_down() {
            tokio::select! {
                accepted = listener.accept() => {
                    let Ok((stream, _)) = accepted else {
                        continue;
                    };

                    match queue.len() < self.inner.limits.max_pending_connections {
                        true => queue.push(stream),
                        false => overflow.push(stream),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.inner.drained().await;
        Ok(())
    }

    /// Signals the serving loop and all workers to stop. Returns
    /// immediately; in-flight requests finish on their own. The flag
    /// sticks even when nothing is serving yet.
    pub fn shutdown(&self) {
        self.inner.lifecycle.shutdown.send_replace(true);
    }

    /// Signals shutdown and waits up to `timeout` for queued connections
    /// and in-flight requests to drain.
    pub async fn shutdown_timeout(&self, timeout: Duration) -> Result<(), Error> {
        self.shutdown();
        tokio::time::timeout(timeout, self.inner.drained())
            .await
            .map_err(|_| Error::ShutdownTimeout)
    }

    fn spawn_worker(inner: Arc<Inner>) {
        tokio::spawn(async move {
            // next_conn raised the in-flight count for the popped stream.
            while let Some(mut stream) = next_conn(&inner.queue, &inner).await {
                let _ = connection::serve(&inner, &mut stream).await;
                inner.lifecycle.end();
            }
        });
    }

    // A single task answering queue-overflow connections with 503.
    fn spawn_alarmist(inner: Arc<Inner>, queue: ConnQueue) {
        tokio::spawn(async move {
            while let Some(mut stream) = next_conn(&queue, &inner).await {
                let _ = connection::send_error(
                    &mut stream,
                    StatusCode::ServiceUnavailable,
                    &inner.limits,
                )
                .await;
                inner.lifecycle.end();
            }
        });
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for App {
    /// Clones share all state. Cloning freezes registration on both
    /// handles.
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Inner {
    /// Resolves once nothing is pending: the admission queue is empty and
    /// no popped connection is still being served. `next_conn` raises the
    /// in-flight count before popping, so a connection is at every instant
    /// visible to one of the two checks.
    async fn drained(&self) {
        while !self.queue.is_empty() || self.lifecycle.in_flight.load(Ordering::Acquire) != 0 {
            self.limits.wait_strategy.pause().await;
        }
    }

    pub(crate) fn dispatch(&self, request: Request) -> Response {
        let (handler, params) = match self.table.resolve(request.method(), request.path()) {
            Ok(resolved) => resolved,
            Err(Error::MethodNotAllowed { allow }) => {
                let mut resp = Response::error(StatusCode::MethodNotAllowed);
                resp.set_header("allow", &join_methods(&allow));
                return resp;
            }
            Err(err) => return Response::from_error(&err),
        };

        let handler = self.chain.apply(handler);
        let mut ctx = Ctx::new(request, params);
        let result = handler(&mut ctx);
        let resp = ctx.into_response();

        match result {
            Ok(()) => resp,
            // A committed response is already on its way to the client in
            // spirit; the error is only logged.
            Err(err) if resp.is_committed() => {
                log::error!("handler failed after committing a response: {err}");
                resp
            }
            Err(err) => match resp.staged_status() {
                Some(status) => Response::error_code(status),
                None => Response::from_error(&err),
            },
        }
    }
}

fn join_methods(methods: &[Method]) -> String {
    let mut joined = String::new();
    for (i, method) in methods.iter().enumerate() {
        if i > 0 {
            joined.push_str(", ");
        }
        joined.push_str(method.as_str());
    }
    joined
}

type ConnQueue = Arc<SegQueue<TcpStream>>;

async fn next_conn(queue: &ConnQueue, inner: &Inner) -> Option<TcpStream> {
    loop {
        // Raise the count before popping so the popped stream is never
        // invisible to both the queue and the in-flight counter. The
        // caller drops the count once the connection is done.
        inner.lifecycle.begin();
        if let Some(stream) = queue.pop() {
            return Some(stream);
        }
        inner.lifecycle.end();

        if inner.lifecycle.is_shutting_down() {
            return None;
        }
        inner.limits.wait_strategy.pause().await;
    }
}

/// Serving-phase state: the shutdown flag and the in-flight request count.
pub(crate) struct Lifecycle {
    shutdown: watch::Sender<bool>,
    in_flight: AtomicUsize,
}

impl Lifecycle {
    fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn end(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}


#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn shutdown_flag_sticks_without_a_running_server() {
        let app = App::new();

        // No serve loop is subscribed yet; the flag must stick anyway so
        // a later serve call exits immediately.
        app.shutdown();
        assert!(app.inner.lifecycle.is_shutting_down());
    }

    #[tokio::test]
    async fn serve_exits_when_shutdown_preceded_it() {
        let app = App::with_limits(Limits {
            more_requests: 2,
            ..Limits::default()
        });
        app.shutdown();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        app.serve(listener).await.unwrap();
    }
}

#[cfg(test)]
mod registration_tests {
    use super::*;

    #[test]
    fn duplicate_route_fails() {
        let mut app = App::new();
        app.get("/v1/user", |ctx| ctx.string("a")).unwrap();

        let err = app.get("/v1/user", |ctx| ctx.string("b")).unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute { .. }));
    }

    #[test]
    fn registration_freezes_once_shared() {
        let mut app = App::new();
        app.get("/", |ctx| ctx.string("ok")).unwrap();

        let serving_handle = app.clone();
        assert!(matches!(
            app.get("/late", |ctx| ctx.string("no")),
            Err(Error::AlreadyServing)
        ));

        drop(serving_handle);
        app.get("/late", |ctx| ctx.string("yes")).unwrap();
    }

    #[test]
    fn routes_snapshot() {
        let mut app = App::new();
        app.get("/users/:id", |ctx| ctx.string("u")).unwrap();
        app.post("/users", |ctx| ctx.string("c")).unwrap();

        let routes = app.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].method, Method::Get);
        assert_eq!(routes[0].pattern, "/users/:id");
    }

    #[test]
    fn static_dir_serves_and_confines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("site.css"), "body { margin: 0 }").unwrap();

        let mut app = App::new();
        app.static_dir("/static", dir.path().to_str().unwrap())
            .unwrap();

        let resp = app.dispatch(Request::new(Method::Get, "/static/site.css"));
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), b"body { margin: 0 }");
        assert_eq!(resp.header("content-type"), Some("text/css"));

        let resp = app.dispatch(Request::new(Method::Get, "/static/../secret"));
        assert_eq!(resp.status(), 404);

        let resp = app.dispatch(Request::new(Method::Get, "/static/missing.js"));
        assert_eq!(resp.status(), 404);
    }
}
