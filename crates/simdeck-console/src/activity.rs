//! Per-link traffic estimate from node history.

use simdeck_topology::{EdgeActivitySignal, TopologyModel};

use crate::history::HistoryAccumulator;

/// Estimate each link's recent traffic in packets per second.
///
/// A link carries an equal share of the growth in its source node's
/// `packets_processed` between the two most recent ticks. Sources that were
/// missing from the latest tick contribute nothing.
pub fn derive_activity(history: &HistoryAccumulator, model: &TopologyModel) -> EdgeActivitySignal {
    let Some(latest) = history.latest_metrics().map(|m| m.timestamp) else {
        return EdgeActivitySignal::new();
    };

    model
        .links()
        .iter()
        .filter_map(|link| {
            let samples = history.node_history(link.source.as_str())?;
            if samples.len() < 2 {
                return None;
            }
            let (prev, last) = (&samples[samples.len() - 2], &samples[samples.len() - 1]);
            if last.timestamp != latest || last.timestamp <= prev.timestamp {
                return None;
            }

            let elapsed = (last.timestamp - prev.timestamp) as f64 / 1000.0;
            let delta = last.packets_processed.saturating_sub(prev.packets_processed) as f64;
            let share = model.out_degree(&link.source).max(1) as f64;
            Some((link.id(), delta / share / elapsed))
        })
        .collect()
}
