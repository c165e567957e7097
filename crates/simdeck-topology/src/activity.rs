//! Volatile per-link traffic intensity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::LinkId;

/// Recent-traffic measure per link, recomputed on every telemetry refresh.
///
/// Values are never negative; a link without an entry reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeActivitySignal(HashMap<LinkId, f64>);

impl EdgeActivitySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity for a link. Negative or non-finite values become 0.
    pub fn insert(&mut self, link: LinkId, value: f64) {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        self.0.insert(link, value);
    }

    /// Activity for a link, zero when absent.
    pub fn get(&self, link: &LinkId) -> f64 {
        self.0.get(link).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkId, f64)> {
        self.0.iter().map(|(id, v)| (id, *v))
    }

    /// Keep only the links for which `keep` returns true.
    pub fn retain_links(&mut self, mut keep: impl FnMut(&LinkId) -> bool) {
        self.0.retain(|id, _| keep(id));
    }
}

impl FromIterator<(LinkId, f64)> for EdgeActivitySignal {
    fn from_iter<I: IntoIterator<Item = (LinkId, f64)>>(iter: I) -> Self {
        let mut signal = Self::new();
        for (link, value) in iter {
            signal.insert(link, value);
        }
        signal
    }
}
