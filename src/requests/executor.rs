//! The executor is whatever actually performs a request. Executors can be
//! wrapped by [`Middleware`] to build chains, which is how the harness
//! observes requests and responses without changing them.

use std::{future::Future, pin::Pin, sync::Arc};

use hyper::{Request, Response};

use crate::{http::body::Body, Error};

/// Future returned by [`Executor::execute`].
pub type ExecutorFuture = Pin<Box<dyn Future<Output = Result<Response<Body>, Error>> + Send>>;

/// Performs a request and resolves to its response. Cancellation is
/// dropping the returned future.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, request: Request<Body>) -> ExecutorFuture;
}

/// Function that wraps an executor into another one. Middleware can look
/// at or modify the request before calling the inner executor and do the
/// same with the response afterwards.
pub type Middleware = Arc<dyn Fn(Arc<dyn Executor>) -> Arc<dyn Executor> + Send + Sync>;

impl Executor for Arc<dyn Executor> {
    fn execute(&self, request: Request<Body>) -> ExecutorFuture {
        self.as_ref().execute(request)
    }
}

/// Executor backed by a function. See [`executor_fn`].
#[derive(Clone, Copy)]
pub struct ExecutorFn<F> {
    f: F,
}

/// Creates an [`Executor`] from an async function or closure.
///
/// ```
/// use clientserver::{body, executor_fn};
/// use hyper::Response;
///
/// let executor = executor_fn(|_request| async {
///     Ok(Response::new(body::empty()))
/// });
/// ```
pub fn executor_fn<F, Fut>(f: F) -> ExecutorFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>, Error>> + Send + 'static,
{
    ExecutorFn { f }
}

impl<F, Fut> Executor for ExecutorFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>, Error>> + Send + 'static,
{
    fn execute(&self, request: Request<Body>) -> ExecutorFuture {
        Box::pin((self.f)(request))
    }
}

/// Applies `middleware` to `executor`. The first element of `middleware`
/// ends up as the outermost layer, so it's the first one to see requests
/// and the last one to see responses.
pub fn wrap(executor: Arc<dyn Executor>, middleware: &[Middleware]) -> Arc<dyn Executor> {
    middleware
        .iter()
        .rev()
        .fold(executor, |next, layer| layer(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::body;

    /// Middleware that appends `name` to a shared log before and after
    /// calling the next executor.
    fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Middleware {
        Arc::new(move |next: Arc<dyn Executor>| {
            let log = log.clone();
            Arc::new(executor_fn(move |request| {
                let log = log.clone();
                let next = next.clone();
                async move {
                    log.lock().unwrap().push(format!("{name} request"));
                    let response = next.execute(request).await;
                    log.lock().unwrap().push(format!("{name} response"));
                    response
                }
            })) as Arc<dyn Executor>
        })
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(executor_fn(|_| async { Ok(Response::new(body::empty())) }));

        let chain = wrap(
            executor,
            &[recorder("outer", log.clone()), recorder("inner", log.clone())],
        );

        chain
            .execute(Request::new(body::empty()))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                "outer request",
                "inner request",
                "inner response",
                "outer response"
            ]
        );
    }
}
