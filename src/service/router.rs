use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, PoisonError, RwLock},
};

use hyper::{body::Incoming, Request, Response};

use super::{handler_fn, Handler, HandlerFuture};
use crate::http::{body::Body, response::LocalResponse};

/// Routing table that maps URI paths to handlers. Routes can be added at
/// any time through a shared reference, even while the server is running.
///
/// Patterns are matched against the request path like this:
///
/// - A pattern that doesn't end with `/` only matches that exact path.
/// - A pattern that ends with `/` matches every path below it, so `/api/`
///   matches `/api/` and `/api/colors/red`.
/// - Exact matches win. Otherwise the longest matching subtree wins, which
///   makes `/` a catch-all.
/// - If nothing matches the response is `404 Not Found`.
#[derive(Default)]
pub struct Router {
    routes: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl Router {
    /// Creates an empty [`Router`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern`, replacing the previous handler if
    /// the pattern was already registered.
    pub fn route(&self, pattern: impl Into<String>, handler: impl Handler) -> &Self {
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.into(), Arc::new(handler));

        self
    }

    /// Same as [`Router::route`] for async functions or closures.
    pub fn route_fn<F, Fut>(&self, pattern: impl Into<String>, f: F) -> &Self
    where
        F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Body>> + Send + 'static,
    {
        self.route(pattern, handler_fn(f))
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the pattern that `path` should be routed to.
    fn find(&self, path: &str) -> Option<(String, Arc<dyn Handler>)> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(handler) = routes.get(path) {
            return Some((path.to_owned(), handler.clone()));
        }

        routes
            .iter()
            .filter(|(pattern, _)| pattern.ends_with('/') && path.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, handler)| (pattern.clone(), handler.clone()))
    }
}

impl Handler for Router {
    fn handle(&self, request: Request<Incoming>) -> HandlerFuture {
        match self.find(request.uri().path()) {
            Some((pattern, handler)) => {
                tracing::debug!("{} routed to {pattern}", request.uri().path());
                handler.handle(request)
            }
            None => Box::pin(async { LocalResponse::not_found() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(patterns: &[&str]) -> Router {
        let router = Router::new();
        for pattern in patterns {
            router.route_fn(*pattern, |_| async { LocalResponse::ok() });
        }

        router
    }

    fn matched(router: &Router, path: &str) -> Option<String> {
        router.find(path).map(|(pattern, _)| pattern)
    }

    #[test]
    fn exact_match() {
        let router = router(&["/red", "/blue"]);

        assert_eq!(matched(&router, "/red").as_deref(), Some("/red"));
        assert_eq!(matched(&router, "/blue").as_deref(), Some("/blue"));
        assert_eq!(matched(&router, "/red/more"), None);
        assert_eq!(matched(&router, "/green"), None);
    }

    #[test]
    fn longest_subtree_wins() {
        let router = router(&["/", "/api/", "/api/colors/", "/api/colors/red"]);

        let cases = [
            ("/api/colors/red", "/api/colors/red"),
            ("/api/colors/blue", "/api/colors/"),
            ("/api/users", "/api/"),
            ("/api", "/"),
            ("/anything", "/"),
        ];

        for (path, pattern) in cases {
            assert_eq!(matched(&router, path).as_deref(), Some(pattern), "{path}");
        }
    }

    #[test]
    fn route_replaces_pattern() {
        let router = router(&["/red", "/red"]);

        assert_eq!(router.len(), 1);
        assert!(!router.is_empty());
    }
}
