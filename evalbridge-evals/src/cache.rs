//! In-memory cache of measured metric data.

use crate::error::EvalResult;
use crate::report::MetricData;
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Identifies one metric configuration applied to one test case.
#[derive(Debug, Serialize)]
struct CacheKeyParts<'a, C: Serialize> {
    case: &'a C,
    metric: &'a str,
    threshold: f64,
    strict_mode: bool,
    evaluation_model: Option<&'a str>,
    config: &'a serde_json::Value,
}

/// Metric data keyed by a hash of the test case and metric configuration.
///
/// Unbounded, so callers scope one cache to a batch of related runs rather
/// than keeping it for the life of a process.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    entries: RwLock<HashMap<String, MetricData>>,
}

impl EvaluationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the cache key for a case and metric configuration.
    ///
    /// `config` carries every other setting that changes the result, as
    /// reported by [`Metric::cache_fingerprint`](crate::Metric::cache_fingerprint).
    pub fn key<C: Serialize>(
        case: &C,
        metric: &str,
        threshold: f64,
        strict_mode: bool,
        evaluation_model: Option<&str>,
        config: &serde_json::Value,
    ) -> EvalResult<String> {
        let parts = CacheKeyParts {
            case,
            metric,
            threshold,
            strict_mode,
            evaluation_model,
            config,
        };
        let bytes = serde_json::to_vec(&parts)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<MetricData> {
        self.entries.read().get(key).cloned()
    }

    /// Store an entry.
    pub fn insert(&self, key: String, data: MetricData) {
        self.entries.write().insert(key, data);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
