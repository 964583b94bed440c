//! Request builder driven by an ordered list of configuration entries.
//!
//! A [`Requests`] value holds everything needed to build and send a request:
//! method, URL, headers, body, extensions and the executor chain. Entries
//! such as [`get`], [`header`] or [`middleware`] modify it one at a time and
//! can fail, in which case the whole operation fails:
//!
//! ```no_run
//! use clientserver::requests::{self, Requests};
//!
//! # async fn run() -> Result<(), clientserver::Error> {
//! let base = Requests::new().with([requests::url("http://127.0.0.1:8080")])?;
//!
//! let response = base
//!     .send([requests::get("red"), requests::header("x-color", "green")])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Request extensions play the role of a request-scoped context: values
//! added with [`extension`] travel with the request through every executor
//! layer untouched.

pub mod decode;
pub mod executor;

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use http::{
    header::{self, HeaderName, HeaderValue},
    Extensions, HeaderMap, Method, Request, Response, Uri,
};
use serde::{de::DeserializeOwned, Serialize};

pub use decode::Received;
pub use serde::de::IgnoredAny;
pub use executor::{executor_fn, Executor, ExecutorFn, ExecutorFuture, Middleware};

use crate::{
    http::{
        body::{self, Body},
        client::Client,
    },
    Error,
};

/// Reusable request template. Cloning is cheap enough to do once per
/// request, which is what [`Requests::with`] does.
#[derive(Clone)]
pub struct Requests {
    method: Method,
    url: Option<Uri>,
    headers: HeaderMap,
    body: Option<Bytes>,
    extensions: Extensions,
    executor: Option<Arc<dyn Executor>>,
    middleware: Vec<Middleware>,
}

impl Default for Requests {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: None,
            headers: HeaderMap::new(),
            body: None,
            extensions: Extensions::new(),
            executor: None,
            middleware: Vec::new(),
        }
    }
}

/// One configuration entry. Entries are applied in order and consumed.
pub struct Entry(Box<dyn FnOnce(&mut Requests) -> Result<(), Error> + Send>);

impl Entry {
    /// Creates a custom entry.
    pub fn new(apply: impl FnOnce(&mut Requests) -> Result<(), Error> + Send + 'static) -> Self {
        Self(Box::new(apply))
    }

    /// Applies this entry to `requests`.
    pub fn apply(self, requests: &mut Requests) -> Result<(), Error> {
        (self.0)(requests)
    }
}

impl Requests {
    /// Creates a template for `GET` requests with no URL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies additional entries to this instance. Stops at the first
    /// failing entry, leaving the ones before it applied.
    pub fn apply(&mut self, entries: impl IntoIterator<Item = Entry>) -> Result<(), Error> {
        entries
            .into_iter()
            .try_for_each(|entry| entry.apply(self))
    }

    /// Returns a copy of this template with `entries` applied.
    pub fn with(&self, entries: impl IntoIterator<Item = Entry>) -> Result<Self, Error> {
        let mut requests = self.clone();
        requests.apply(entries)?;

        Ok(requests)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> Option<&Uri> {
        self.url.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Builds a request from this template plus `entries`.
    pub fn request(&self, entries: impl IntoIterator<Item = Entry>) -> Result<Request<Body>, Error> {
        self.with(entries)?.build()
    }

    /// Executor chain: the configured executor, or a fresh [`Client`], wrapped
    /// by all the middleware.
    pub fn executor(&self) -> Arc<dyn Executor> {
        let executor = self
            .executor
            .clone()
            .unwrap_or_else(|| Arc::new(Client::new()));

        executor::wrap(executor, &self.middleware)
    }

    /// Builds a request from this template plus `entries` and sends it
    /// through the executor chain. The response body is not consumed.
    pub async fn send(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Response<Body>, Error> {
        let requests = self.with(entries)?;
        let request = requests.build()?;

        requests.executor().execute(request).await
    }

    /// Sends a request and decodes the response body into `T` regardless of
    /// the status code. See [`decode`].
    pub async fn receive<T>(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Received<T>, Error>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.send(entries).await?;
        let (parts, body) = decode::collect(response).await?;
        let model = decode::decode(&parts, &body)?;

        Ok(Received { parts, body, model })
    }

    /// Sends a request and decodes successful (2xx) responses into `T` and
    /// every other response into `E`.
    ///
    /// Use [`IgnoredAny`] for a side that doesn't need decoding. It accepts
    /// any JSON document, unlike `()` which only accepts `null`:
    ///
    /// ```no_run
    /// use clientserver::requests::{self, IgnoredAny, Requests};
    ///
    /// # async fn run(colors: Requests) -> Result<(), clientserver::Error> {
    /// let received = colors
    ///     .receive_full::<Vec<String>, IgnoredAny>([requests::get("colors")])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn receive_full<T, E>(
        &self,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Received<Result<T, E>>, Error>
    where
        T: DeserializeOwned + Default,
        E: DeserializeOwned + Default,
    {
        let response = self.send(entries).await?;
        let (parts, body) = decode::collect(response).await?;

        let model = if parts.status.is_success() {
            Ok(decode::decode(&parts, &body)?)
        } else {
            Err(decode::decode(&parts, &body)?)
        };

        Ok(Received { parts, body, model })
    }

    fn build(&self) -> Result<Request<Body>, Error> {
        let Some(uri) = self.url.clone() else {
            return Err(Error::MissingUrl);
        };

        let body = self.body.clone().map_or_else(body::empty, body::full);

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .body(body)?;

        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = self.extensions.clone();

        if !request.headers().contains_key(header::HOST) {
            if let Some(authority) = request.uri().authority() {
                let host = HeaderValue::from_str(authority.as_str()).map_err(http::Error::from)?;
                request.headers_mut().insert(header::HOST, host);
            }
        }

        Ok(request)
    }

    fn resolve(&mut self, reference: &str) -> Result<(), Error> {
        self.url = Some(resolve(self.url.as_ref(), reference)?);
        Ok(())
    }
}

/// Resolves `reference` against `base` following the merge rules of RFC
/// 3986 section 5.2, minus dot segment removal.
fn resolve(base: Option<&Uri>, reference: &str) -> Result<Uri, Error> {
    if has_scheme(reference) {
        return Ok(reference.parse()?);
    }

    let Some(base) = base else {
        return Err(Error::MissingBaseUrl(reference.to_owned()));
    };

    let (path, query) = match reference.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (reference, None),
    };

    let merged = if path.is_empty() {
        base.path().to_owned()
    } else if path.starts_with('/') {
        path.to_owned()
    } else {
        let base_path = base.path();
        let directory = base_path.rfind('/').map_or("/", |i| &base_path[..=i]);
        format!("{directory}{path}")
    };

    let query = match query {
        Some(query) => Some(query),
        None if path.is_empty() => base.query(),
        None => None,
    };

    let path_and_query = match query {
        Some(query) => format!("{merged}?{query}"),
        None => merged,
    };

    let mut parts = base.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse()?);

    Ok(Uri::from_parts(parts).map_err(http::Error::from)?)
}

/// Whether `reference` starts with a scheme, as in `http:`. Anything after
/// the first `/`, `?` or `#` is not looked at, so URLs in query strings
/// don't count.
fn has_scheme(reference: &str) -> bool {
    let Some(end) = reference.find([':', '/', '?', '#']) else {
        return false;
    };

    let (scheme, rest) = reference.split_at(end);
    let mut chars = scheme.chars();

    rest.starts_with(':')
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Sets the base URL. Relative paths given later are resolved against it.
pub fn url(url: impl AsRef<str>) -> Entry {
    let url = url.as_ref().to_owned();
    Entry::new(move |requests| {
        requests.url = Some(url.parse()?);
        Ok(())
    })
}

/// Resolves `path` against the current URL.
pub fn path(path: impl Into<String>) -> Entry {
    let path = path.into();
    Entry::new(move |requests| requests.resolve(&path))
}

/// Sets the request method.
pub fn method(method: Method) -> Entry {
    Entry::new(move |requests| {
        requests.method = method;
        Ok(())
    })
}

/// Sets the method to `method` and resolves `path` against the current URL.
/// An empty path keeps the URL as is.
fn method_and_path(method: Method, path: String) -> Entry {
    Entry::new(move |requests| {
        requests.method = method;
        if path.is_empty() {
            Ok(())
        } else {
            requests.resolve(&path)
        }
    })
}

pub fn get(path: impl Into<String>) -> Entry {
    method_and_path(Method::GET, path.into())
}

pub fn post(path: impl Into<String>) -> Entry {
    method_and_path(Method::POST, path.into())
}

pub fn put(path: impl Into<String>) -> Entry {
    method_and_path(Method::PUT, path.into())
}

pub fn patch(path: impl Into<String>) -> Entry {
    method_and_path(Method::PATCH, path.into())
}

pub fn delete(path: impl Into<String>) -> Entry {
    method_and_path(Method::DELETE, path.into())
}

/// Sets a header, replacing any previous value. Invalid names or values
/// make the entry fail.
pub fn header(name: impl AsRef<str>, value: impl AsRef<str>) -> Entry {
    let name = name.as_ref().to_owned();
    let value = value.as_ref().to_owned();
    Entry::new(move |requests| {
        let name = HeaderName::try_from(name).map_err(http::Error::from)?;
        let value = HeaderValue::try_from(value).map_err(http::Error::from)?;
        requests.headers.insert(name, value);
        Ok(())
    })
}

/// Sets the request body.
pub fn body(body: impl Into<Bytes>) -> Entry {
    let body = body.into();
    Entry::new(move |requests| {
        requests.body = Some(body);
        Ok(())
    })
}

/// Serializes `value` as the JSON body and sets the content type.
pub fn json<T: Serialize>(value: &T) -> Entry {
    let body = serde_json::to_vec(value);
    Entry::new(move |requests| {
        requests.body = Some(body?.into());
        requests.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(decode::CONTENT_TYPE_JSON),
        );
        Ok(())
    })
}

/// Attaches a request-scoped value. Every executor layer and the receiving
/// side of an in-process exchange can read it back from the request
/// extensions.
pub fn extension<T: Clone + Send + Sync + 'static>(value: T) -> Entry {
    Entry::new(move |requests| {
        requests.extensions.insert(value);
        Ok(())
    })
}

/// Replaces the executor at the bottom of the chain.
pub fn executor(executor: impl Executor) -> Entry {
    Entry::new(move |requests| {
        requests.executor = Some(Arc::new(executor));
        Ok(())
    })
}

/// Adds a middleware inside of all the middleware added before it.
pub fn middleware(
    layer: impl Fn(Arc<dyn Executor>) -> Arc<dyn Executor> + Send + Sync + 'static,
) -> Entry {
    Entry::new(move |requests| {
        requests.middleware.push(Arc::new(layer));
        Ok(())
    })
}

/// Fails with [`Error::Timeout`] if the rest of the chain doesn't produce a
/// response within `duration`.
pub fn timeout(duration: Duration) -> Entry {
    middleware(move |next| {
        Arc::new(executor_fn(move |request| {
            let response = next.execute(request);
            async move {
                tokio::time::timeout(duration, response)
                    .await
                    .map_err(|_| Error::Timeout(duration))?
            }
        })) as Arc<dyn Executor>
    })
}
