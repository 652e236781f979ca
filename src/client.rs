//! Resource client
//!
//! Public entry point. Reads go cache-first; a miss is fetched through the
//! [`RetryingTransport`], parsed, stored, and returned. Reads never fail: once a fetch is
//! unrecoverable the error goes to the configured [`ErrorHandler`] (which may supply a fallback)
//! and otherwise the caller receives an empty result. Saves are the exception and surface their
//! [`FetchError`].
//!
//! Per fetch: `cache check -> hit -> done` or
//! `cache check -> miss -> fetching (-> retrying -> fetching)* -> cached -> done` or
//! `... -> exhausted -> degraded -> done`.

use crate::cache::CacheStore;
use crate::classify::{classify, Failure};
use crate::clock::{Clock, MonotonicClock};
use crate::config::ClientConfig;
use crate::error::{BuildError, FetchError};
use crate::resource::{normalize_base_url, parse_name_list, PathTemplate, Resource, ResourceId, UrlBuilder};
use crate::retry::RetryPolicy;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::strategy::{ErrorHandler, JsonParser, ResponseParser};
use crate::telemetry::{emit_best_effort, shared, CacheEvent, FetchEvent, NullSink, SharedSink};
use crate::timeout::TimeoutPolicy;
use crate::transport::{HttpRequest, ReqwestTransport, RetryingTransport, Transport};
use crate::Backoff;
use futures::future::{BoxFuture, FutureExt, WeakShared};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Weak handle: a coalesced fetch lives only while some caller awaits it.
type PendingFetch = WeakShared<BoxFuture<'static, Resource>>;

/// Fetch-with-cache client for translation resources. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ResourceClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    base_url: String,
    cache: CacheStore,
    transport: RetryingTransport,
    url_builder: Arc<dyn UrlBuilder>,
    parser: Arc<dyn ResponseParser>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    sink: SharedSink,
    pending: Mutex<HashMap<ResourceId, PendingFetch>>,
    /// Bumped by every successful save.
    writes: AtomicU64,
}

impl std::fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClient")
            .field("base_url", &self.inner.base_url)
            .field("cache_entries", &self.inner.cache.len())
            .field("transport", &self.inner.transport)
            .field("error_handler", &self.inner.error_handler.is_some())
            .finish()
    }
}

impl ResourceClient {
    /// Client with the default reqwest transport and strategies.
    pub fn new(config: ClientConfig) -> Result<Self, BuildError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ResourceClientBuilder {
        ResourceClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// Upstream URL of a resource, including configured query parameters.
    pub fn resource_url(&self, language: &str, namespace: &str) -> String {
        self.url_for(&ResourceId::new(language, namespace))
    }

    /// Payload for `(language, namespace)`. Never fails; see the module docs.
    pub async fn get_resource(&self, language: &str, namespace: &str) -> Resource {
        let id = ResourceId::new(language, namespace);

        if self.inner.config.cache_enabled {
            if let Some(hit) = self.inner.cache.get(&id) {
                tracing::trace!(resource = %id, "cache hit");
                self.emit(FetchEvent::Cache(CacheEvent::hit(&id))).await;
                return hit;
            }
            self.emit(FetchEvent::Cache(CacheEvent::miss(&id))).await;
        }

        if self.inner.config.dedupe_requests {
            self.fetch_shared(id).await
        } else {
            self.fetch(&id).await
        }
    }

    /// Several namespaces of one language, fetched concurrently. Each degrades on its own.
    pub async fn get_resources(&self, language: &str, namespaces: &[&str]) -> BTreeMap<String, Resource> {
        let fetches = namespaces.iter().map(|ns| async move {
            (ns.to_string(), self.get_resource(language, ns).await)
        });
        futures::future::join_all(fetches).await.into_iter().collect()
    }

    /// Write `payload` upstream and, on success, into the cache.
    ///
    /// Fails immediately with a `config` error when saving is disabled. A read of the same
    /// resource that was already in flight when the save completed still returns the payload it
    /// fetched, but does not replace the saved cache entry.
    pub async fn save_resource(
        &self,
        language: &str,
        namespace: &str,
        payload: &Resource,
    ) -> Result<(), FetchError> {
        let id = ResourceId::new(language, namespace);
        let url = self.url_for(&id);

        if !self.inner.config.allow_saving {
            return Err(FetchError::config("saving resources is disabled (allowSaving=false)", url));
        }

        let body = serde_json::to_vec(payload).map_err(|e| classify(Failure::from(e), &url))?;
        let request = self
            .request(HttpRequest::put(url.as_str()))
            .with_header("Content-Type", "application/json")
            .with_body(body);

        if let Err(err) = self.inner.transport.execute(&request).await {
            tracing::error!(resource = %id, kind = %err.kind(), error = %err, "failed to save resource");
            return Err(err);
        }

        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.config.cache_enabled {
            self.inner.cache.set(id.clone(), payload.clone(), self.inner.config.cache_ttl);
        }
        tracing::debug!(resource = %id, "resource saved");
        self.emit(FetchEvent::Saved {
            language: id.language().to_string(),
            namespace: id.namespace().to_string(),
        })
        .await;
        Ok(())
    }

    /// Languages offered upstream, or an empty list on failure.
    pub async fn get_languages(&self) -> Vec<String> {
        let path = self.inner.config.languages_path.clone();
        self.list(&path, "languages").await
    }

    /// Namespaces offered upstream, or an empty list on failure.
    pub async fn get_namespaces(&self) -> Vec<String> {
        let path = self.inner.config.namespaces_path.clone();
        self.list(&path, "namespaces").await
    }

    pub fn invalidate(&self, language: &str, namespace: &str) -> bool {
        self.inner.cache.invalidate(&ResourceId::new(language, namespace))
    }

    pub fn invalidate_language(&self, language: &str) -> usize {
        self.inner.cache.invalidate_group(language)
    }

    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    async fn fetch(&self, id: &ResourceId) -> Resource {
        let url = self.url_for(id);
        let writes = self.inner.writes.load(Ordering::SeqCst);
        match self.load(&url).await {
            Ok(resource) => {
                if !self.inner.config.cache_enabled {
                    return resource;
                }
                let saved_meanwhile = self.inner.writes.load(Ordering::SeqCst) != writes
                    && self.inner.cache.contains(id);
                if saved_meanwhile {
                    tracing::debug!(resource = %id, "keeping entry saved during fetch");
                } else {
                    self.inner.cache.set(id.clone(), resource.clone(), self.inner.config.cache_ttl);
                    self.emit(FetchEvent::Cache(CacheEvent::stored(id))).await;
                }
                resource
            }
            Err(err) => self.degrade(err, Some(id)).await.unwrap_or_default(),
        }
    }

    /// Join an in-flight fetch of `id`, or start one that later callers can join.
    async fn fetch_shared(&self, id: ResourceId) -> Resource {
        let fetch = {
            let mut pending = self.pending();
            match pending.get(&id).and_then(WeakShared::upgrade) {
                Some(existing) => {
                    tracing::trace!(resource = %id, "joining in-flight fetch");
                    existing
                }
                None => {
                    let client = self.clone();
                    let key = id.clone();
                    let fetch = async move {
                        let resource = client.fetch(&key).await;
                        client.pending().remove(&key);
                        resource
                    }
                    .boxed()
                    .shared();
                    pending.retain(|_, weak| weak.upgrade().is_some());
                    if let Some(weak) = fetch.downgrade() {
                        pending.insert(id, weak);
                    }
                    fetch
                }
            }
        };
        fetch.await
    }

    async fn load(&self, url: &str) -> Result<Resource, FetchError> {
        let response = self.inner.transport.execute(&self.request(HttpRequest::get(url))).await?;
        self.inner.parser.parse(&response.body).map_err(|failure| classify(failure, url))
    }

    async fn list(&self, path: &str, field: &str) -> Vec<String> {
        let url = self.with_query(format!("{}{}", self.inner.base_url, path.trim_start_matches('/')));
        let request = self.request(HttpRequest::get(url.as_str()));
        let result = match self.inner.transport.execute(&request).await {
            Ok(response) => parse_name_list(&response.body, field).map_err(|f| classify(f, &url)),
            Err(err) => Err(err),
        };
        match result {
            Ok(names) => names,
            Err(err) => {
                let _ = self.degrade(err, None).await;
                Vec::new()
            }
        }
    }

    /// Terminal boundary for read failures.
    async fn degrade(&self, err: FetchError, id: Option<&ResourceId>) -> Option<Resource> {
        if let Some(handler) = &self.inner.error_handler {
            if let Some(fallback) = handler.handle(&err, id) {
                if id.is_some() {
                    tracing::debug!(url = err.url(), kind = %err.kind(), "serving fallback payload");
                    return Some(fallback);
                }
            }
        }
        tracing::warn!(
            url = err.url(),
            kind = %err.kind(),
            status = err.status(),
            attempts = err.attempts(),
            error = %err,
            "request failed; serving empty result"
        );
        self.emit(FetchEvent::Degraded { url: err.url().to_string(), kind: err.kind() }).await;
        None
    }

    fn url_for(&self, id: &ResourceId) -> String {
        self.with_query(self.inner.url_builder.resource_url(&self.inner.base_url, id))
    }

    fn with_query(&self, url: String) -> String {
        let params = &self.inner.config.query_params;
        if params.is_empty() {
            return url;
        }
        match url::Url::parse(&url) {
            Ok(mut parsed) => {
                parsed.query_pairs_mut().extend_pairs(params.iter());
                parsed.into()
            }
            Err(_) => url,
        }
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_header("Accept", "application/json")
            .with_headers(&self.inner.config.headers)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<ResourceId, PendingFetch>> {
        self.inner.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn emit(&self, event: FetchEvent) {
        emit_best_effort(self.inner.sink.clone(), event).await;
    }
}

/// Builder for [`ResourceClient`]. Everything except the config is optional.
pub struct ResourceClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    url_builder: Option<Arc<dyn UrlBuilder>>,
    parser: Arc<dyn ResponseParser>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    sink: SharedSink,
}

impl ResourceClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            url_builder: None,
            parser: Arc::new(JsonParser),
            error_handler: None,
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(MonotonicClock::default()),
            sink: shared(NullSink),
        }
    }

    /// Replace the reqwest transport.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the path-template URL construction.
    pub fn url_builder<U>(mut self, builder: U) -> Self
    where
        U: UrlBuilder + 'static,
    {
        self.url_builder = Some(Arc::new(builder));
        self
    }

    pub fn parser<P>(mut self, parser: P) -> Self
    where
        P: ResponseParser + 'static,
    {
        self.parser = Arc::new(parser);
        self
    }

    pub fn error_handler<H>(mut self, handler: H) -> Self
    where
        H: ErrorHandler + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Clock used for cache expiry.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Result<ResourceClient, BuildError> {
        let config = self.config;
        config.validate()?;

        let mut backoff = Backoff::from_flag(config.retry_delay, config.use_exponential_backoff);
        if let (Some(max), true) = (config.max_retry_delay, backoff.is_exponential()) {
            backoff = backoff.with_max(max)?;
        }
        let retry = RetryPolicy::builder()
            .max_retries(config.max_retries)
            .backoff(backoff)
            .with_jitter(config.jitter)
            .with_shared_sleeper(self.sleeper)
            .with_sink(self.sink.clone())
            .build();
        let timeout = TimeoutPolicy::new(config.timeout)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let transport = RetryingTransport::new(transport, timeout, retry)
            .auto_handle_status(config.auto_handle_status);
        let url_builder = self
            .url_builder
            .unwrap_or_else(|| Arc::new(PathTemplate::new(config.resource_path_template.clone())));

        Ok(ResourceClient {
            inner: Arc::new(Inner {
                base_url: normalize_base_url(&config.base_url),
                config,
                cache: CacheStore::with_clock(self.clock),
                transport,
                url_builder,
                parser: self.parser,
                error_handler: self.error_handler,
                sink: self.sink,
                pending: Mutex::new(HashMap::new()),
                writes: AtomicU64::new(0),
            }),
        })
    }
}
