//! Engine facade
//!
//! [`Engine`] owns everything a verification run needs:
//!
//! - the topic ring buffers and the background poller feeding them
//! - the push-stream [`SubscriptionCorrelator`]
//! - the comparator registry and the [`CrossStreamCorrelator`]
//!
//! Build one with [`EngineBuilder`], call [`Engine::start`] to begin
//! buffering the log stream, and [`Engine::stop`] when done.
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::builder()
//!     .config(DuetConfig::from_file(Path::new("duet.toml"))?)
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .log_source(Box::new(source))
//!     .build()?;
//! engine.start()?;
//!
//! let placed = engine
//!     .find_push_result::<BetEvent, _>(&subject, |bet, _| bet.bet_id == id, timeout)
//!     .await?;
//! if let Some(placed) = placed {
//!     assert!(engine.are_equivalent(&placed));
//! }
//! engine.stop().await?;
//! ```

use crate::correlate::CrossStreamCorrelator;
use crate::error::{EngineError, Result};
use crate::lookup::{BufferedLookup, LogRecordLookup};
use duet_buffer::{BackgroundPoller, Finder, LogSource, PollerStats, TopicBuffers};
use duet_compare::ComparatorRegistry;
use duet_core::{CorrelationResult, DuetConfig, SearchCriteria};
use duet_subscriber::{
    CorrelationError, CorrelatorSettings, PushTransport, SubscriptionCorrelator, TransportError,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Engine`]
///
/// A push transport is required. The log source is optional: without one the
/// buffers are only fed through [`Engine::buffers`].
#[derive(Default)]
pub struct EngineBuilder {
    config: DuetConfig,
    transport: Option<Arc<dyn PushTransport>>,
    source: Option<Box<dyn LogSource>>,
    registry: Option<ComparatorRegistry>,
    lookup: Option<Arc<dyn LogRecordLookup>>,
}

impl EngineBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`
    pub fn config(mut self, config: DuetConfig) -> Self {
        self.config = config;
        self
    }

    /// Push-stream transport
    pub fn transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Log-stream source, consumed by the poller on [`Engine::start`]
    pub fn log_source(mut self, source: Box<dyn LogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Comparator registry; defaults to the bet, wallet and payment strategies
    pub fn registry(mut self, registry: ComparatorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Log record lookup; defaults to [`BufferedLookup`] over the engine's buffers
    pub fn lookup(mut self, lookup: Arc<dyn LogRecordLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Connect a JetStream transport using the `[nats]` configuration
    #[cfg(feature = "nats")]
    pub async fn with_nats(self) -> Result<Self> {
        let transport = duet_subscriber::NatsTransport::connect(&self.config.nats).await?;
        Ok(self.transport(Arc::new(transport)))
    }

    /// Create a Kafka log source using the `[kafka]` configuration
    #[cfg(feature = "kafka")]
    pub fn with_kafka(self) -> Result<Self> {
        let source = duet_buffer::KafkaLogSource::new(&self.config.kafka)?;
        Ok(self.log_source(Box::new(source)))
    }

    /// Validate the configuration and assemble the engine
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let transport = self.transport.ok_or(EngineError::Missing("push transport"))?;

        let buffers = Arc::new(TopicBuffers::from_config(&self.config.buffer));
        let finder = Finder::new(Arc::clone(&buffers));
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(ComparatorRegistry::with_default_strategies),
        );
        let lookup = match self.lookup {
            Some(lookup) => lookup,
            None => Arc::new(BufferedLookup::from_config(finder.clone(), &self.config)),
        };

        let correlator = SubscriptionCorrelator::new(
            transport,
            CorrelatorSettings::from(&self.config.subscription),
        );
        let cross = CrossStreamCorrelator::new(Arc::clone(&registry), lookup);

        info!(
            topics = ?buffers.topics(),
            strategies = registry.len(),
            stream = %self.config.subscription.stream,
            "engine built"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                config: self.config,
                buffers,
                finder,
                correlator,
                cross,
                source: Mutex::new(self.source),
                poller: Mutex::new(None),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

struct EngineInner {
    config: DuetConfig,
    buffers: Arc<TopicBuffers>,
    finder: Finder,
    correlator: SubscriptionCorrelator,
    cross: CrossStreamCorrelator,
    source: Mutex<Option<Box<dyn LogSource>>>,
    poller: Mutex<Option<BackgroundPoller>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

/// Cross-broker correlation engine
///
/// Cheap to clone; clones share buffers, poller and transport.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start the background log poller
    ///
    /// Without a log source this only marks the engine as started. A stopped
    /// engine cannot be started again; build a new one instead.
    pub fn start(&self) -> Result<()> {
        if self.inner.stopped.load(Ordering::Acquire) {
            return Err(EngineError::Stopped);
        }
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyStarted);
        }

        let Some(source) = self.inner.source.lock().take() else {
            info!("engine started without a log source");
            return Ok(());
        };

        match BackgroundPoller::spawn(
            source,
            Arc::clone(&self.inner.buffers),
            self.inner.config.kafka.poll_timeout(),
        ) {
            Ok(poller) => {
                *self.inner.poller.lock() = Some(poller);
                info!("engine started");
                Ok(())
            }
            Err(e) => {
                // The source went down with the failed spawn.
                self.inner.stopped.store(true, Ordering::Release);
                self.inner.started.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Stop the poller and close the push transport
    ///
    /// Safe to call more than once; an already closed transport is not an error.
    pub async fn stop(&self) -> Result<()> {
        let poller = self.inner.poller.lock().take();
        if let Some(poller) = poller {
            // Joining the poller thread blocks for up to one poll timeout.
            let stopped = tokio::task::spawn_blocking(move || {
                poller.shutdown();
                poller.stats()
            })
            .await;
            match stopped {
                Ok(stats) => info!(
                    received = stats.received,
                    buffered = stats.buffered,
                    dropped = stats.dropped,
                    errors = stats.errors,
                    "log-stream poller stopped"
                ),
                Err(e) => warn!(error = %e, "poller shutdown task failed"),
            }
        }

        match self.inner.correlator.transport().close().await {
            Ok(()) | Err(TransportError::Closed) => {}
            Err(e) => return Err(e.into()),
        }
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.started.store(false, Ordering::Release);
        info!("engine stopped");
        Ok(())
    }

    /// Whether [`start`](Self::start) has run and [`stop`](Self::stop) has not
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Empty every topic buffer
    pub fn clear_buffers(&self) {
        self.inner.buffers.clear_all();
    }

    /// Empty one topic buffer, by topic key or topic name
    pub fn clear_buffer(&self, topic_key: &str) -> bool {
        match self.resolve_topic(topic_key) {
            Some(topic) => self.inner.buffers.clear(&topic),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Push stream
    // ------------------------------------------------------------------------

    /// Wait for the first push message on `subject` accepted by `filter`
    ///
    /// `Ok(None)` when nothing matched within `timeout`. Exhausted
    /// subscription retries and early subscription loss are errors.
    pub async fn find_push_message<T, F>(
        &self,
        subject: &str,
        filter: F,
        timeout: Duration,
    ) -> std::result::Result<Option<T>, CorrelationError>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&T, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let found = self.find_push_result(subject, filter, timeout).await?;
        Ok(found.map(CorrelationResult::into_payload))
    }

    /// Like [`find_push_message`](Self::find_push_message), keeping sequence and tag
    pub async fn find_push_result<T, F>(
        &self,
        subject: &str,
        filter: F,
        timeout: Duration,
    ) -> std::result::Result<Option<CorrelationResult<T>>, CorrelationError>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&T, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let pending = self
            .inner
            .correlator
            .find_async_with_timeout(subject, filter, timeout);
        match pending.await {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ------------------------------------------------------------------------
    // Log stream
    // ------------------------------------------------------------------------

    /// Wait for the newest buffered log message matching `criteria`
    ///
    /// Blocks the calling thread for at most `timeout`.
    pub fn find_log_message<T: DeserializeOwned>(
        &self,
        topic_key: &str,
        criteria: &SearchCriteria,
        timeout: Duration,
    ) -> Option<T> {
        self.find_log_result(topic_key, criteria, timeout)
            .map(CorrelationResult::into_payload)
    }

    /// Like [`find_log_message`](Self::find_log_message), keeping sequence and tag
    pub fn find_log_result<T: DeserializeOwned>(
        &self,
        topic_key: &str,
        criteria: &SearchCriteria,
        timeout: Duration,
    ) -> Option<CorrelationResult<T>> {
        let topic = self.resolve_topic(topic_key)?;
        self.inner.finder.find(
            &topic,
            criteria,
            timeout,
            self.inner.config.search.poll_interval(),
        )
    }

    /// Count buffered log messages matching `criteria`
    pub fn count_log_messages(&self, topic_key: &str, criteria: &SearchCriteria) -> usize {
        match self.resolve_topic(topic_key) {
            Some(topic) => self.inner.finder.count(&topic, criteria),
            None => 0,
        }
    }

    // ------------------------------------------------------------------------
    // Cross-stream
    // ------------------------------------------------------------------------

    /// Whether the log stream carries an equivalent record for `push`
    ///
    /// Blocks while waiting for the log record, for at most the search timeout.
    pub fn are_equivalent<T: Any>(&self, push: &CorrelationResult<T>) -> bool {
        self.inner.cross.correlate(push)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Active configuration
    pub fn config(&self) -> &DuetConfig {
        &self.inner.config
    }

    /// Topic ring buffers, keyed by broker topic name
    pub fn buffers(&self) -> &Arc<TopicBuffers> {
        &self.inner.buffers
    }

    /// Comparator registry
    pub fn registry(&self) -> &Arc<ComparatorRegistry> {
        self.inner.cross.registry()
    }

    /// Poller metrics, while the poller runs
    pub fn poller_stats(&self) -> Option<PollerStats> {
        self.inner.poller.lock().as_ref().map(BackgroundPoller::stats)
    }

    /// Broker topic name for a topic key; topic names resolve to themselves
    fn resolve_topic(&self, topic_key: &str) -> Option<String> {
        if let Some(name) = self.inner.config.buffer.topic_name(topic_key) {
            return Some(name.to_string());
        }
        if self.inner.buffers.contains(topic_key) {
            return Some(topic_key.to_string());
        }
        warn!(topic_key, "unknown log topic");
        None
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("topics", &self.inner.buffers.topics())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            debug!("engine dropped while running, stopping poller");
            poller.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_buffer::MemoryLogSource;
    use duet_core::{RawMessage, TopicConfig};
    use duet_subscriber::MemoryTransport;

    fn config() -> DuetConfig {
        let mut config = DuetConfig::default();
        config.buffer.topics.insert(
            "bets".to_string(),
            TopicConfig {
                name: "bet-events".to_string(),
                capacity: Some(4),
                type_tags: vec!["BET_PLACED".to_string()],
            },
        );
        config
    }

    #[test]
    fn test_build_requires_transport() {
        let err = Engine::builder().config(config()).build().unwrap_err();
        assert!(matches!(err, EngineError::Missing("push transport")));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = config();
        config.subscription.create_attempts = 0;
        let err = Engine::builder()
            .config(config)
            .transport(Arc::new(MemoryTransport::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_start_twice_without_source() {
        let engine = Engine::builder()
            .config(config())
            .transport(Arc::new(MemoryTransport::new()))
            .build()
            .unwrap();
        engine.start().unwrap();
        assert!(engine.is_started());
        assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
        assert!(engine.poller_stats().is_none());
    }

    #[tokio::test]
    async fn test_stopped_engine_cannot_restart() {
        let (feed, source) = MemoryLogSource::channel();
        let engine = Engine::builder()
            .config(config())
            .transport(Arc::new(MemoryTransport::new()))
            .log_source(Box::new(source))
            .build()
            .unwrap();
        engine.start().unwrap();
        assert!(engine.poller_stats().is_some());

        engine.stop().await.unwrap();
        assert!(!engine.is_started());
        assert!(matches!(engine.start(), Err(EngineError::Stopped)));
        assert!(!engine.is_started());
        assert!(engine.poller_stats().is_none());
        assert!(!feed.send(RawMessage::new("bet-events", 1, "BET_PLACED", b"{}".to_vec())));

        // Stopping again stays harmless.
        engine.stop().await.unwrap();
    }

    #[test]
    fn test_topic_keys_and_names_resolve() {
        let engine = Engine::builder()
            .config(config())
            .transport(Arc::new(MemoryTransport::new()))
            .build()
            .unwrap();
        assert_eq!(engine.resolve_topic("bets").as_deref(), Some("bet-events"));
        assert_eq!(engine.resolve_topic("bet-events").as_deref(), Some("bet-events"));
        assert!(engine.resolve_topic("nope").is_none());
        assert_eq!(engine.count_log_messages("nope", &SearchCriteria::new()), 0);
        assert!(!engine.clear_buffer("nope"));
        assert!(engine.clear_buffer("bets"));
    }
}
