//! Handler and middleware shapes shared by the router, the middleware chain
//! and plugins.
//!
//! A [`Handler`] is an infallible request-to-response function. A
//! [`Middleware`] wraps one handler in another. Plugin route handlers are
//! fallible ([`RouteHandler`]); the composition engine converts their errors
//! to a generic 500 before they reach the chain.

use ambit_core::Result;
use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tracing::error;

pub type Handler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

pub type RouteHandler =
    Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Result<Response>> + Send + Sync>;

pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

pub fn route_fn<F, Fut>(f: F) -> RouteHandler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The body served whenever a handler fails. Never leaks the cause.
pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Adapts a [`Handler`] to a `tower::Service`, so tower layers and axum
/// routers can sit on either side of it.
#[derive(Clone)]
pub struct HandlerService(pub Handler);

impl Service<Request<Body>> for HandlerService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let fut = (self.0)(req);
        Box::pin(async move { Ok(fut.await) })
    }
}

/// Wrap any infallible service (an `axum::Router`, for instance) as a
/// [`Handler`].
pub fn service_handler<S>(service: S) -> Handler
where
    S: Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    handler_fn(move |req| {
        let service = service.clone();
        async move {
            match service.oneshot(req).await {
                Ok(resp) => resp,
                Err(never) => match never {},
            }
        }
    })
}

/// Turn a tower layer (CORS, compression, ...) into a [`Middleware`].
pub fn from_layer<L, B>(layer: L) -> Middleware
where
    L: Layer<HandlerService> + Send + Sync + 'static,
    L::Service: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request<Body>>>::Future: Send + 'static,
    <L::Service as Service<Request<Body>>>::Error: std::fmt::Display,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let layer = Arc::new(layer);
    middleware_fn(move |next| {
        let service = layer.layer(HandlerService(next));
        handler_fn(move |req| {
            let service = service.clone();
            async move {
                match service.oneshot(req).await {
                    Ok(resp) => resp.map(Body::new),
                    Err(e) => {
                        error!(error = %e, "middleware layer failed");
                        internal_error()
                    }
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn handler_service_forwards() {
        let handler = handler_fn(|req: Request<Body>| async move {
            format!("path={}", req.uri().path()).into_response()
        });
        let resp = HandlerService(handler)
            .oneshot(Request::get("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_text(resp).await, "path=/x");
    }

    #[tokio::test]
    async fn router_as_handler() {
        let router = axum::Router::new().route("/hi", axum::routing::get(|| async { "hi" }));
        let handler = service_handler(router);
        let ok = handler(Request::get("/hi").body(Body::empty()).unwrap()).await;
        assert_eq!(ok.status(), StatusCode::OK);
        let missing = handler(Request::get("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layer_adapter_wraps_handler() {
        let inner = handler_fn(|_req| async { "plain".into_response() });
        let mw = from_layer(tower_http::cors::CorsLayer::permissive());
        let wrapped = mw(inner);
        let req = Request::get("/")
            .header("origin", "https://example.com")
            .body(Body::empty())
            .unwrap();
        let resp = wrapped(req).await;
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
        assert_eq!(body_text(resp).await, "plain");
    }
}
