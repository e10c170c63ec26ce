//! Stale-while-revalidate cache around an expensive async producer.
//!
//! A [`CachedGenerator`] serves the last good value immediately and refreshes
//! it in the background. The very first fill is shared: every caller that
//! arrives while the cache is empty attaches to the same in-flight generation
//! instead of starting its own.
//!
//! Generation always runs in a spawned task, so dropping a waiter (or all of
//! them) never cancels the underlying work.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument, Span};

/// Errors surfaced to callers waiting on a first-time generation.
///
/// Background refresh failures never show up here; they are logged and the
/// previous value keeps being served.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("initial generation for '{name}' failed: {message}")]
    InitialGeneration { name: String, message: String },

    #[error("generation task for '{name}' did not complete: {message}")]
    Aborted { name: String, message: String },
}

type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, Result<Arc<T>, CacheError>>>;

enum CacheState<T> {
    Empty,
    Generating(InFlight<T>),
    Ready(Arc<T>),
    Refreshing(Arc<T>),
}

impl<T> CacheState<T> {
    fn label(&self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Generating(_) => "generating",
            CacheState::Ready(_) => "ready",
            CacheState::Refreshing(_) => "refreshing",
        }
    }

    fn value(&self) -> Option<Arc<T>> {
        match self {
            CacheState::Ready(value) | CacheState::Refreshing(value) => Some(Arc::clone(value)),
            CacheState::Empty | CacheState::Generating(_) => None,
        }
    }
}

struct Inner<T> {
    name: String,
    producer: Producer<T>,
    state: Mutex<CacheState<T>>,
    // Flips to true once and stays there.
    ready: watch::Sender<bool>,
    // True while a generation or refresh task is running.
    busy: watch::Sender<bool>,
    span: Span,
}

/// Background-refreshing cache for a zero-argument async producer.
///
/// Cloning is cheap and clones share the same state.
pub struct CachedGenerator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CachedGenerator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for CachedGenerator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedGenerator")
            .field("name", &self.inner.name)
            .field("state", &self.inner.lock_state().label())
            .finish()
    }
}

impl<T> CachedGenerator<T>
where
    T: Send + Sync + 'static,
{
    /// Create an empty cache. Log records are emitted inside a
    /// `cached_generator` span carrying `name`.
    pub fn new<F, Fut>(name: impl Into<String>, producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let name = name.into();
        let span = tracing::info_span!("cached_generator", name = %name);
        Self::with_span(name, span, producer)
    }

    /// Create an empty cache that logs inside the supplied span.
    pub fn with_span<F, Fut>(name: impl Into<String>, span: Span, producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let producer: Producer<T> = Arc::new(move || producer().boxed());
        let (ready, _) = watch::channel(false);
        let (busy, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                producer,
                state: Mutex::new(CacheState::Empty),
                ready,
                busy,
                span,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Return the cached value, generating it first if the cache is empty.
    ///
    /// With a value present this never waits: it hands out the current value
    /// and, unless one is already running, schedules a background refresh.
    pub async fn get(&self) -> Result<Arc<T>, CacheError> {
        let in_flight = {
            let mut state = self.inner.lock_state();
            match std::mem::replace(&mut *state, CacheState::Empty) {
                CacheState::Ready(value) => {
                    *state = CacheState::Refreshing(Arc::clone(&value));
                    self.inner.busy.send_replace(true);
                    drop(state);
                    debug!(parent: &self.inner.span, "cache hit, scheduling background refresh");
                    Inner::spawn_refresh(&self.inner, Arc::clone(&value));
                    return Ok(value);
                }
                CacheState::Refreshing(value) => {
                    *state = CacheState::Refreshing(Arc::clone(&value));
                    debug!(parent: &self.inner.span, "cache hit, refresh already in progress");
                    return Ok(value);
                }
                CacheState::Generating(in_flight) => {
                    *state = CacheState::Generating(in_flight.clone());
                    debug!(parent: &self.inner.span, "attaching to in-flight generation");
                    in_flight
                }
                CacheState::Empty => {
                    let in_flight = Inner::spawn_initial(&self.inner);
                    *state = CacheState::Generating(in_flight.clone());
                    self.inner.busy.send_replace(true);
                    info!(parent: &self.inner.span, "cache miss, waiting for initial generation");
                    in_flight
                }
            }
        };
        in_flight.await
    }

    /// Start the initial generation without waiting for it. Does nothing if
    /// the cache already holds a value or a generation is running.
    pub fn prewarm(&self) {
        let mut state = self.inner.lock_state();
        if matches!(*state, CacheState::Empty) {
            *state = CacheState::Generating(Inner::spawn_initial(&self.inner));
            self.inner.busy.send_replace(true);
            info!(parent: &self.inner.span, "prewarming cache");
        }
    }

    /// Wait until the first successful generation has completed.
    pub async fn wait_until_ready(&self) {
        let mut ready = self.inner.ready.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Wait until no generation or refresh is in flight.
    pub async fn settled(&self) {
        let mut busy = self.inner.busy.subscribe();
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Current value, if any, without waiting or triggering work.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.inner.lock_state().value()
    }
}

impl<T> Inner<T> {
    fn lock_state(&self) -> MutexGuard<'_, CacheState<T>> {
        // State transitions are single assignments, so a poisoned guard still
        // holds a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Inner<T>
where
    T: Send + Sync + 'static,
{
    fn spawn_initial(inner: &Arc<Self>) -> InFlight<T> {
        let task = tokio::spawn(Arc::clone(inner).run_initial().instrument(inner.span.clone()));
        let name = inner.name.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(CacheError::Aborted {
                    name,
                    message: join_err.to_string(),
                }),
            }
        }
        .boxed()
        .shared()
    }

    fn spawn_refresh(inner: &Arc<Self>, previous: Arc<T>) {
        tokio::spawn(
            Arc::clone(inner)
                .run_refresh(previous)
                .instrument(inner.span.clone()),
        );
    }

    async fn run_initial(self: Arc<Self>) -> Result<Arc<T>, CacheError> {
        let mut guard = InFlightGuard::new(&self);
        info!("performing initial generation");
        match (self.producer)().await {
            Ok(value) => {
                let value = Arc::new(value);
                guard.finish(CacheState::Ready(Arc::clone(&value)));
                info!("initial generation complete, cache populated");
                Ok(value)
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(error = %message, "initial generation failed");
                guard.finish(CacheState::Empty);
                Err(CacheError::InitialGeneration {
                    name: self.name.clone(),
                    message,
                })
            }
        }
    }

    async fn run_refresh(self: Arc<Self>, previous: Arc<T>) {
        let mut guard = InFlightGuard::new(&self);
        info!("starting background refresh");
        match (self.producer)().await {
            Ok(value) => {
                guard.finish(CacheState::Ready(Arc::new(value)));
                info!("cache refreshed in background");
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "background refresh failed, keeping previous value");
                guard.finish(CacheState::Ready(previous));
            }
        }
    }
}

/// Clears the in-flight marker however the generation task ends, including
/// panics and task aborts.
struct InFlightGuard<'a, T> {
    inner: &'a Inner<T>,
    finished: bool,
}

impl<'a, T> InFlightGuard<'a, T> {
    fn new(inner: &'a Inner<T>) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    /// Install the next state. A value marks the cache ready in the same
    /// critical section, before `busy` clears.
    fn finish(&mut self, next: CacheState<T>) {
        let mut state = self.inner.lock_state();
        let populated = next.value().is_some();
        *state = next;
        if populated {
            self.inner.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
        }
        drop(state);
        self.finished = true;
        self.inner.busy.send_replace(false);
    }
}

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.inner.lock_state();
        *state = match std::mem::replace(&mut *state, CacheState::Empty) {
            CacheState::Ready(value) | CacheState::Refreshing(value) => CacheState::Ready(value),
            CacheState::Empty | CacheState::Generating(_) => CacheState::Empty,
        };
        drop(state);
        self.inner.busy.send_replace(false);
        warn!(name = %self.inner.name, "generation task ended before completing");
    }
}
