//! Type-tag keyed comparator registry
//!
//! A [`Comparator`] compares two decoded payloads of one concrete type. The
//! registry stores them type-erased as [`Strategy`] trait objects, keyed by
//! every type tag they declare. Comparing decodes the raw log payload into
//! the comparator's payload type and downcasts the already-decoded push
//! payload to the same type; either failing is a non-match.

use crate::strategies::{BetStrategy, PaymentStrategy, WalletStrategy};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Traits
// ============================================================================

/// Field-level comparison of one payload type
pub trait Comparator: Send + Sync + 'static {
    /// Decoded payload type shared by both streams
    type Payload: DeserializeOwned + Send + Sync + 'static;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Type tags this comparator handles
    fn type_tags(&self) -> &'static [&'static str];

    /// Whether the two payloads describe the same event
    fn equivalent(
        &self,
        log: &Self::Payload,
        push: &Self::Payload,
        sequence: u64,
        type_tag: &str,
    ) -> bool;
}

/// Type-erased comparator, as stored in the registry
pub trait Strategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Type tags this strategy handles
    fn type_tags(&self) -> Vec<String>;

    /// Name of the payload type push payloads must have
    fn payload_type(&self) -> &'static str;

    /// Decode `raw_log`, downcast `push`, compare
    fn compare(&self, raw_log: &[u8], push: &dyn Any, sequence: u64, type_tag: &str) -> bool;
}

impl<C: Comparator> Strategy for C {
    fn name(&self) -> &str {
        Comparator::name(self)
    }

    fn type_tags(&self) -> Vec<String> {
        Comparator::type_tags(self)
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn payload_type(&self) -> &'static str {
        type_name::<C::Payload>()
    }

    fn compare(&self, raw_log: &[u8], push: &dyn Any, sequence: u64, type_tag: &str) -> bool {
        let Some(push) = push.downcast_ref::<C::Payload>() else {
            warn!(
                strategy = Comparator::name(self),
                sequence,
                type_tag,
                expected = type_name::<C::Payload>(),
                "push payload has the wrong type"
            );
            return false;
        };

        let log: C::Payload = match serde_json::from_slice(raw_log) {
            Ok(log) => log,
            Err(e) => {
                warn!(
                    strategy = Comparator::name(self),
                    sequence,
                    type_tag,
                    error = %e,
                    "log payload did not decode"
                );
                return false;
            }
        };

        self.equivalent(&log, push, sequence, type_tag)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Strategies by type tag
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    strategies: FxHashMap<String, Arc<dyn Strategy>>,
}

impl ComparatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bet, wallet and payment strategies
    pub fn with_default_strategies() -> Self {
        let mut registry = Self::new();
        registry
            .register(BetStrategy)
            .register(WalletStrategy)
            .register(PaymentStrategy);
        registry
    }

    /// Register `strategy` for every tag it declares
    ///
    /// A later registration for the same tag replaces the earlier one.
    pub fn register<S: Strategy + 'static>(&mut self, strategy: S) -> &mut Self {
        self.register_arc(Arc::new(strategy))
    }

    /// Register an already shared strategy
    pub fn register_arc(&mut self, strategy: Arc<dyn Strategy>) -> &mut Self {
        for tag in strategy.type_tags() {
            if let Some(previous) = self.strategies.insert(tag.clone(), Arc::clone(&strategy)) {
                warn!(
                    type_tag = %tag,
                    previous = previous.name(),
                    replacement = strategy.name(),
                    "replacing comparator strategy"
                );
            } else {
                debug!(type_tag = %tag, strategy = strategy.name(), "registered comparator strategy");
            }
        }
        self
    }

    /// Strategy for `type_tag`
    pub fn resolve(&self, type_tag: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(type_tag).cloned()
    }

    /// Compare through `strategy`
    pub fn compare(
        &self,
        strategy: &dyn Strategy,
        raw_log: &[u8],
        push: &dyn Any,
        sequence: u64,
        type_tag: &str,
    ) -> bool {
        let equivalent = strategy.compare(raw_log, push, sequence, type_tag);
        debug!(
            strategy = strategy.name(),
            sequence,
            type_tag,
            equivalent,
            "compared payloads"
        );
        equivalent
    }

    /// Resolve by tag, then compare; an unknown tag is a non-match
    pub fn compare_tagged(
        &self,
        raw_log: &[u8],
        push: &dyn Any,
        sequence: u64,
        type_tag: &str,
    ) -> bool {
        match self.resolve(type_tag) {
            Some(strategy) => self.compare(strategy.as_ref(), raw_log, push, sequence, type_tag),
            None => {
                warn!(type_tag, sequence, "no comparator strategy for type tag");
                false
            }
        }
    }

    /// Registered tags, sorted
    pub fn type_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no tag is registered
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for tag in self.type_tags() {
            if let Some(strategy) = self.strategies.get(tag) {
                map.entry(&tag, &strategy.name());
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exact(&'static str);

    impl Comparator for Exact {
        type Payload = serde_json::Value;

        fn name(&self) -> &'static str {
            self.0
        }

        fn type_tags(&self) -> &'static [&'static str] {
            &["THING"]
        }

        fn equivalent(&self, log: &Self::Payload, push: &Self::Payload, _: u64, _: &str) -> bool {
            log == push
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ComparatorRegistry::new();
        registry.register(Exact("first")).register(Exact("second"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("THING").unwrap().name(), "second");
        assert!(registry.resolve("OTHER").is_none());
    }

    #[test]
    fn test_compare_rejects_wrong_push_type() {
        let mut registry = ComparatorRegistry::new();
        registry.register(Exact("exact"));
        let strategy = registry.resolve("THING").unwrap();

        let push = serde_json::json!({"a": 1});
        assert!(registry.compare(strategy.as_ref(), br#"{"a":1}"#, &push, 1, "THING"));
        assert!(!registry.compare(strategy.as_ref(), br#"{"a":2}"#, &push, 1, "THING"));
        assert!(!registry.compare(strategy.as_ref(), br#"{"a":1}"#, &"text", 1, "THING"));
        assert!(!registry.compare(strategy.as_ref(), b"{oops", &push, 1, "THING"));
    }

    #[test]
    fn test_compare_tagged_unknown_tag() {
        let registry = ComparatorRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.compare_tagged(b"{}", &serde_json::json!({}), 1, "MISSING"));
    }

    #[test]
    fn test_default_strategies_cover_domain_tags() {
        let registry = ComparatorRegistry::with_default_strategies();
        assert_eq!(
            registry.type_tags(),
            vec![
                "BET_CANCELLED",
                "BET_PLACED",
                "BET_SETTLED",
                "PAYMENT_DEPOSITED",
                "PAYMENT_WITHDRAWN",
                "WALLET_CREDITED",
                "WALLET_DEBITED",
            ]
        );
        assert!(format!("{registry:?}").contains("BET_PLACED"));
    }
}
