//! Handler and middleware composition.
//!
//! Middleware wraps handlers. The chain composes at dispatch time by
//! folding from the innermost out, so the first middleware registered ends
//! up outermost: it sees the request first and the staged response last. A
//! middleware short-circuits by committing a response (or returning an
//! error) without calling the handler it wraps.

use std::sync::Arc;

use crate::{ctx::Ctx, errors::Error};

/// A request handler. Cheap to clone; the chain produces one per route
/// resolution.
pub type Handler = Arc<dyn Fn(&mut Ctx) -> Result<(), Error> + Send + Sync>;

/// A middleware: wraps a [`Handler`] and yields the wrapped one.
pub type Middleware = Box<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Registration-ordered middleware stack.
pub(crate) struct Chain {
    stack: Vec<Middleware>,
}

impl Chain {
    pub(crate) fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub(crate) fn push(&mut self, middleware: Middleware) {
        self.stack.push(middleware);
    }

    /// Wraps `handler` in the whole stack, first-registered outermost.
    pub(crate) fn apply(&self, handler: Handler) -> Handler {
        self.stack.iter().rev().fold(handler, |next, mw| mw(next))
    }

    pub(crate) fn len(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::{request::Request, types::Method},
        router::route::Params,
    };
    use std::sync::Mutex;

    fn ctx() -> Ctx {
        Ctx::new(Request::new(Method::Get, "/"), Params::default())
    }

    // Middleware that logs `label:before` and `label:after` around the
    // handler it wraps.
    fn tracer(log: Arc<Mutex<Vec<String>>>, label: &'static str) -> Middleware {
        Box::new(move |next: Handler| {
            let log = log.clone();
            Arc::new(move |ctx: &mut Ctx| {
                log.lock().unwrap().push(format!("{label}:before"));
                let result = next(ctx);
                log.lock().unwrap().push(format!("{label}:after"));
                result
            })
        })
    }

    #[test]
    fn first_registered_runs_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = Chain::new();
        chain.push(tracer(log.clone(), "first"));
        chain.push(tracer(log.clone(), "second"));

        let inner_log = log.clone();
        let handler: Handler = Arc::new(move |_| {
            inner_log.lock().unwrap().push("handler".into());
            Ok(())
        });

        chain.apply(handler)(&mut ctx()).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:before",
                "second:before",
                "handler",
                "second:after",
                "first:after",
            ]
        );
    }

    #[test]
    fn middleware_can_short_circuit() {
        let mut chain = Chain::new();
        chain.push(Box::new(|_next: Handler| {
            Arc::new(|ctx: &mut Ctx| {
                ctx.status(401);
                ctx.string("Unauthorized")
            })
        }));

        let reached = Arc::new(Mutex::new(false));
        let flag = reached.clone();
        let handler: Handler = Arc::new(move |ctx| {
            *flag.lock().unwrap() = true;
            ctx.string("never")
        });

        let mut ctx = ctx();
        chain.apply(handler)(&mut ctx).unwrap();

        assert!(!*reached.lock().unwrap());
        let resp = ctx.into_response();
        assert_eq!(resp.status(), 401);
        assert_eq!(resp.body(), b"Unauthorized");
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = Chain::new();
        let handler: Handler = Arc::new(|ctx| ctx.string("plain"));

        let mut ctx = ctx();
        chain.apply(handler)(&mut ctx).unwrap();

        assert_eq!(chain.len(), 0);
        assert_eq!(ctx.into_response().body(), b"plain");
    }
}
