//! Weak-topic selection from aggregated scores

use std::collections::BTreeMap;

use crate::types::TopicScore;

/// Passing score; topics averaging strictly below it are weak
pub const WEAK_THRESHOLD: f64 = 50.0;

/// Group scores by topic and return the topics whose mean score is
/// strictly below `threshold`, sorted by name.
///
/// One low score does not make a topic weak on its own: `[30, 90]`
/// averages 60 and passes.
pub fn select_weak_topics(scores: &[TopicScore], threshold: f64) -> Vec<String> {
    let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for s in scores {
        let entry = totals.entry(s.topic.as_str()).or_insert((0.0, 0));
        entry.0 += s.score;
        entry.1 += 1;
    }

    totals
        .into_iter()
        .filter(|(_, (sum, n))| sum / (*n as f64) < threshold)
        .map(|(topic, _)| topic.to_string())
        .collect()
}
