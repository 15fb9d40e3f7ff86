//! Tower middleware attaching a [`Session`] to every request.

use crate::context::RequestContext;
use crate::session::Session;
use crate::traits::SessionStore;
use futures::future::BoxFuture;
use http::{Request, Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer producing [`SessionService`].
///
/// # Examples
///
/// ```ignore
/// use sessionkit_core::{SessionLayer, CacheStore};
/// use tower::ServiceBuilder;
///
/// let store = Arc::new(CacheStore::connect(config).await?);
/// let service = ServiceBuilder::new()
///     .layer(SessionLayer::new("sid", store))
///     .service_fn(handler);
/// ```
#[derive(Clone)]
pub struct SessionLayer {
    name: String,
    store: Arc<dyn SessionStore>,
}

impl SessionLayer {
    pub fn new(name: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            name: self.name.clone(),
            store: self.store.clone(),
        }
    }
}

/// Attaches a [`Session`] to the request extensions, writes queued cookies
/// to the response and clears the request's session registry afterwards.
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    name: String,
    store: Arc<dyn SessionStore>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let ctx = RequestContext::from_headers(req.headers());
        let session = Session::new(self.name.clone(), self.store.clone(), ctx.clone());
        req.extensions_mut().insert(session);

        // Take the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).await;
            let result = result.map(|mut response| {
                ctx.apply(response.headers_mut());
                response
            });
            ctx.clear();
            result
        })
    }
}

/// The session attached by [`SessionLayer`].
///
/// # Panics
///
/// Panics if the request did not pass through a [`SessionLayer`].
pub fn session<B>(req: &Request<B>) -> Session {
    try_session(req).unwrap_or_else(|| panic!("request has no session: is SessionLayer installed?"))
}

/// The session attached by [`SessionLayer`], if any.
pub fn try_session<B>(req: &Request<B>) -> Option<Session> {
    req.extensions().get::<Session>().cloned()
}
