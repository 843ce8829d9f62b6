//! The route table: registration and resolution.

use crate::{
    errors::Error,
    http::types::Method,
    middleware::Handler,
    router::route::{Params, Pattern},
};

/// One `(method, pattern)` introspection entry from
/// [`App::routes`](crate::App::routes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Method the route is bound to.
    pub method: Method,
    /// Pattern as registered.
    pub pattern: String,
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Registration-ordered collection of routes.
///
/// Mutated only during the registration phase; read-only while serving
/// (enforced by ownership at the [`App`](crate::App) level).
pub(crate) struct RouteTable {
    routes: Vec<Route>,
    capacity: usize,
}

impl RouteTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            routes: Vec::new(),
            capacity,
        }
    }

    /// Binds `handler` to `(method, pattern)`.
    ///
    /// Fails with [`Error::DuplicateRoute`] when the identical pair is
    /// already registered, and [`Error::RouteCapacity`] when the table is
    /// full. Both are fatal to startup.
    pub(crate) fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Handler,
    ) -> Result<(), Error> {
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern.raw() == pattern)
        {
            return Err(Error::DuplicateRoute {
                method,
                pattern: pattern.to_owned(),
            });
        }
        if self.routes.len() >= self.capacity {
            return Err(Error::RouteCapacity { cap: self.capacity });
        }

        self.routes.push(Route {
            method,
            pattern: Pattern::compile(pattern),
            handler,
        });
        Ok(())
    }

    /// Resolves `(method, path)` to a handler and its bound parameters.
    ///
    /// When several patterns match the path, the one with the longest
    /// static prefix wins; ties go to the earliest registered. A path
    /// matched only under other methods yields
    /// [`Error::MethodNotAllowed`] with those methods; no match at all
    /// yields [`Error::NotFound`].
    pub(crate) fn resolve(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(Handler, Params), Error> {
        let mut best: Option<(usize, &Route, Params)> = None;
        let mut allow: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };

            if !allow.contains(&route.method) {
                allow.push(route.method);
            }
            if route.method != method {
                continue;
            }

            let prefix = route.pattern.static_prefix();
            // Strictly greater keeps the earliest-registered on ties.
            if best.as_ref().map_or(true, |(p, ..)| prefix > *p) {
                best = Some((prefix, route, params));
            }
        }

        match best {
            Some((_, route, params)) => Ok((route.handler.clone(), params)),
            None if !allow.is_empty() => {
                allow.sort();
                Err(Error::MethodNotAllowed { allow })
            }
            None => Err(Error::NotFound),
        }
    }

    /// Registration-ordered snapshot of the bound routes.
    pub(crate) fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|r| RouteInfo {
                method: r.method,
                pattern: r.pattern.raw().to_owned(),
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}
