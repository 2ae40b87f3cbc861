//! Response cache: successful GET responses are replayed for a fixed window, keyed by request URL.
//!
//! Entries expire by age only. There is no size bound and no explicit
//! invalidation; the set of valid URLs is small and every entry dies with its TTL.

use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, Request},
    http::{HeaderMap, Method, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};

#[derive(Clone, Debug)]
struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    expires_at: Instant,
}

impl CachedResponse {
    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Shared store behind every [`CacheLayer`]. Created once at startup.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CachedResponse>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .cloned()
    }

    fn insert(&self, key: String, entry: CachedResponse) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.retain(|_, e| now < e.expires_at);
        entries.insert(key, entry);
    }

    /// Live (unexpired) entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.values().filter(|e| now < e.expires_at).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes the cache key of a request; `None` bypasses the cache.
pub type KeyFn = fn(&Request) -> Option<String>;

/// Full request URL (path and query) of GET requests, as the client sent it.
pub fn url_key(req: &Request) -> Option<String> {
    if req.method() != Method::GET {
        return None;
    }
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|o| &o.0)
        .unwrap_or_else(|| req.uri());
    Some(
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
    )
}

fn request_path(req: &Request) -> &str {
    req.extensions()
        .get::<OriginalUri>()
        .map(|o| o.0.path())
        .unwrap_or_else(|| req.uri().path())
}

#[derive(Clone)]
pub struct CacheLayer {
    cache: ResponseCache,
    ttl: Duration,
    /// Per-path overrides of `ttl`; the longest matching prefix wins.
    route_ttls: Arc<Vec<(String, Duration)>>,
    key: KeyFn,
}

impl CacheLayer {
    pub fn new(cache: ResponseCache, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            route_ttls: Arc::new(Vec::new()),
            key: url_key,
        }
    }

    /// Use `ttl` for `path` and everything below it.
    pub fn with_route_ttl(mut self, path: &str, ttl: Duration) -> Self {
        let mut routes = self.route_ttls.as_ref().clone();
        routes.push((path.trim_end_matches('/').to_string(), ttl));
        self.route_ttls = Arc::new(routes);
        self
    }

    pub fn with_key(mut self, key: KeyFn) -> Self {
        self.key = key;
        self
    }

    pub fn ttl_for(&self, path: &str) -> Duration {
        self.route_ttls
            .iter()
            .filter(|(prefix, _)| {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.ttl)
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            layer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CacheService<S> {
    inner: S,
    layer: CacheLayer,
}

impl<S> Service<Request> for CacheService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Some(key) = (self.layer.key)(&req) else {
            return Box::pin(self.inner.call(req));
        };

        if let Some(hit) = self.layer.cache.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            let response = hit.to_response();
            return Box::pin(async move { Ok(response) });
        }

        let ttl = self.layer.ttl_for(request_path(&req));
        let cache = self.layer.cache.clone();
        // The clone was made ready by poll_ready on `self.inner`, so swap it in.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(req).await?;
            if response.status() != StatusCode::OK {
                return Ok(response);
            }
            let (parts, body) = response.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    tracing::error!(error = %err, key = %key, "failed to buffer response for cache");
                    return Ok(Response::from_parts(parts, Body::empty()));
                }
            };
            tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache store");
            cache.insert(
                key,
                CachedResponse {
                    status: parts.status,
                    headers: parts.headers.clone(),
                    body: bytes.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
            Ok(Response::from_parts(parts, Body::from(bytes)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Echoes the URI with a call number so replays are distinguishable from fresh responses.
    #[derive(Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
        status: StatusCode,
    }

    impl Service<Request> for Counting {
        type Response = Response;
        type Error = Infallible;
        type Future = std::future::Ready<Result<Response, Infallible>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request) -> Self::Future {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut response = Response::new(Body::from(format!("{} #{}", req.uri(), n)));
            *response.status_mut() = self.status;
            std::future::ready(Ok(response))
        }
    }

    fn counting_service(calls: Arc<AtomicUsize>, status: StatusCode) -> Counting {
        Counting { calls, status }
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn repeated_get_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::new();
        let svc = CacheLayer::new(cache.clone(), Duration::from_secs(300))
            .layer(counting_service(calls.clone(), StatusCode::OK));

        let first = body_text(svc.clone().oneshot(get("/reports?city=jbd")).await.unwrap()).await;
        let second = body_text(svc.clone().oneshot(get("/reports?city=jbd")).await.unwrap()).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn query_string_is_part_of_the_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = CacheLayer::new(ResponseCache::new(), Duration::from_secs(300))
            .layer(counting_service(calls.clone(), StatusCode::OK));

        svc.clone().oneshot(get("/reports?city=jbd")).await.unwrap();
        svc.clone().oneshot(get("/reports?city=sby")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn only_ok_responses_are_stored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResponseCache::new();
        let svc = CacheLayer::new(cache.clone(), Duration::from_secs(300))
            .layer(counting_service(calls.clone(), StatusCode::BAD_REQUEST));

        svc.clone().oneshot(get("/reports?city=xxx")).await.unwrap();
        svc.clone().oneshot(get("/reports?city=xxx")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn non_get_requests_bypass_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = CacheLayer::new(ResponseCache::new(), Duration::from_secs(300))
            .layer(counting_service(calls.clone(), StatusCode::OK));

        for _ in 0..2 {
            let req = Request::builder()
                .method(Method::POST)
                .uri("/reports")
                .body(Body::empty())
                .unwrap();
            svc.clone().oneshot(req).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = CacheLayer::new(ResponseCache::new(), Duration::from_secs(300))
            .with_route_ttl("/floods/timeseries", Duration::from_secs(60))
            .layer(counting_service(calls.clone(), StatusCode::OK));

        svc.clone().oneshot(get("/floods/timeseries?start=a")).await.unwrap();
        svc.clone().oneshot(get("/floods")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        svc.clone().oneshot(get("/floods/timeseries?start=a")).await.unwrap();
        svc.clone().oneshot(get("/floods")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3, "timeseries expired, floods still fresh");

        tokio::time::advance(Duration::from_secs(240)).await;
        svc.clone().oneshot(get("/floods")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn route_ttl_matches_whole_segments() {
        let layer = CacheLayer::new(ResponseCache::new(), Duration::from_secs(300))
            .with_route_ttl("/floods/timeseries", Duration::from_secs(60));
        assert_eq!(layer.ttl_for("/floods/timeseries"), Duration::from_secs(60));
        assert_eq!(layer.ttl_for("/floods/timeseries/"), Duration::from_secs(60));
        assert_eq!(layer.ttl_for("/floods/timeseriesx"), Duration::from_secs(300));
        assert_eq!(layer.ttl_for("/floods"), Duration::from_secs(300));
    }

    #[test]
    fn custom_key_function_can_disable_caching() {
        fn never(_: &Request) -> Option<String> {
            None
        }
        let layer = CacheLayer::new(ResponseCache::new(), Duration::from_secs(1)).with_key(never);
        assert!((layer.key)(&get("/")).is_none());
        assert_eq!(url_key(&get("/reports?city=jbd")).as_deref(), Some("/reports?city=jbd"));
    }
}
