//! Cross-stream correlation
//!
//! Ties a push-stream [`CorrelationResult`] to the log record with the same
//! sequence and type tag, checks that both carry the same correlation keys,
//! and hands the payloads to the comparator registered for the tag. Every
//! negative outcome is a plain `false` with a log line saying why.

use crate::lookup::LogRecordLookup;
use duet_compare::ComparatorRegistry;
use duet_core::{CorrelationKeys, CorrelationResult, LogRecord};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Verifies that a push event and its log record describe the same fact
#[derive(Clone)]
pub struct CrossStreamCorrelator {
    registry: Arc<ComparatorRegistry>,
    lookup: Arc<dyn LogRecordLookup>,
}

impl CrossStreamCorrelator {
    /// Create a correlator
    pub fn new(registry: Arc<ComparatorRegistry>, lookup: Arc<dyn LogRecordLookup>) -> Self {
        Self { registry, lookup }
    }

    /// Comparator registry in use
    pub fn registry(&self) -> &Arc<ComparatorRegistry> {
        &self.registry
    }

    /// Find the log record for `push` and compare the two
    ///
    /// Blocks while the lookup waits for the record to arrive.
    pub fn correlate<T: Any>(&self, push: &CorrelationResult<T>) -> bool {
        let sequence = push.sequence;
        let type_tag = push.type_tag.as_str();

        if self.registry.resolve(type_tag).is_none() {
            warn!(sequence, type_tag, "no comparator strategy for type tag");
            return false;
        }

        let Some(record) = self.lookup.lookup(sequence, type_tag) else {
            info!(sequence, type_tag, subject = %push.subject, "no log record for push event");
            return false;
        };
        self.are_equivalent(&record, push)
    }

    /// Compare an already fetched log record with a push result
    pub fn are_equivalent<T: Any>(&self, record: &LogRecord, push: &CorrelationResult<T>) -> bool {
        let sequence = push.sequence;
        let type_tag = push.type_tag.as_str();

        if record.sequence != sequence || record.type_tag != type_tag {
            info!(
                push_sequence = sequence,
                log_sequence = record.sequence,
                push_type_tag = type_tag,
                log_type_tag = %record.type_tag,
                "sequence or type tag differs"
            );
            return false;
        }

        let Some(push_keys) = CorrelationKeys::from_subject(&push.subject) else {
            warn!(sequence, subject = %push.subject, "push subject carries no correlation keys");
            return false;
        };
        match record.keys {
            Some(log_keys) if log_keys == push_keys => {}
            Some(log_keys) => {
                info!(
                    sequence,
                    type_tag,
                    push_keys = %push_keys,
                    log_keys = %log_keys,
                    "correlation keys differ"
                );
                return false;
            }
            None => {
                warn!(sequence, type_tag, "log record carries no correlation keys");
                return false;
            }
        }

        let Some(strategy) = self.registry.resolve(type_tag) else {
            warn!(sequence, type_tag, "no comparator strategy for type tag");
            return false;
        };
        let equivalent = self.registry.compare(
            strategy.as_ref(),
            &record.payload,
            &push.payload,
            sequence,
            type_tag,
        );
        debug!(sequence, type_tag, equivalent, "cross-stream comparison done");
        equivalent
    }
}

impl std::fmt::Debug for CrossStreamCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossStreamCorrelator")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
