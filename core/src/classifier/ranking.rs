//! Reduction of a model's score vector to a short, ranked result list.

use super::config::PipelineConfig;
use super::labels::LabelSet;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt::{Display, Formatter};

/// One classification result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Class index as a decimal string
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Model confidence (0.0-1.0)
    pub confidence: f32,
}

impl Display for Recognition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.label, self.confidence)
    }
}

/// Score candidate ordered by confidence, then by lower index first.
///
/// Only scores that passed the threshold become candidates, so NaN never
/// reaches the comparison and `0.0 == -0.0` counts as a tie.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    index: usize,
    confidence: f32,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.confidence
            .partial_cmp(&other.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Select at most `max_results` scores strictly above `threshold`,
/// highest first.
///
/// Index `i` is labelled `labels[i]`, or `"unknown"` past the end of the
/// label set. Equal confidences keep scan order (lower index first). NaN
/// scores never pass the threshold.
pub fn rank(
    scores: &[f32],
    labels: &LabelSet,
    threshold: f32,
    max_results: usize,
) -> Vec<Recognition> {
    if max_results == 0 {
        return Vec::new();
    }

    // Min-heap of the best candidates seen so far; the weakest sits on top.
    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(max_results + 1);
    for (index, &confidence) in scores.iter().enumerate() {
        if confidence > threshold {
            heap.push(Reverse(Candidate { index, confidence }));
            if heap.len() > max_results {
                heap.pop();
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(candidate)| Recognition {
            id: candidate.index.to_string(),
            label: labels.label_or_unknown(candidate.index).to_string(),
            confidence: candidate.confidence,
        })
        .collect()
}

/// [`rank`] with the threshold and result bound taken from `config`.
pub fn rank_with_config(scores: &[f32], labels: &LabelSet, config: &PipelineConfig) -> Vec<Recognition> {
    rank(scores, labels, config.confidence_threshold, config.max_results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> LabelSet {
        names.iter().copied().collect()
    }

    fn summary(results: &[Recognition]) -> Vec<(&str, &str, f32)> {
        results
            .iter()
            .map(|r| (r.id.as_str(), r.label.as_str(), r.confidence))
            .collect()
    }

    #[test]
    fn drops_low_scores_and_orders_by_confidence() {
        let results = rank(&[0.05, 0.82, 0.30], &labels(&["cat", "dog", "bird"]), 0.1, 3);
        assert_eq!(summary(&results), vec![("1", "dog", 0.82), ("2", "bird", 0.30)]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let results = rank(&[0.1, 0.1000001], &labels(&["a", "b"]), 0.1, 3);
        assert_eq!(summary(&results), vec![("1", "b", 0.1000001)]);
    }

    #[test]
    fn keeps_only_the_top_k() {
        let scores = [0.2, 0.9, 0.4, 0.7, 0.3];
        let results = rank(&scores, &labels(&["a", "b", "c", "d", "e"]), 0.1, 2);
        assert_eq!(summary(&results), vec![("1", "b", 0.9), ("3", "d", 0.7)]);
    }

    #[test]
    fn ties_prefer_lower_index() {
        let scores = [0.5, 0.7, 0.5, 0.7, 0.5];
        let results = rank(&scores, &labels(&["a", "b", "c", "d", "e"]), 0.1, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "0"]);
    }

    #[test]
    fn signed_zeros_tie_on_index() {
        let results = rank(&[0.0, -0.0, 0.0, -0.0], &labels(&["a", "b", "c", "d"]), -1.0, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2"]);

        let results = rank(&[-0.0, 0.0], &labels(&["a", "b"]), -0.5, 1);
        assert_eq!(results[0].id, "0");
    }

    #[test]
    fn indices_past_labels_are_unknown() {
        let results = rank(&[0.2, 0.3, 0.9], &labels(&["only"]), 0.1, 3);
        assert_eq!(
            summary(&results),
            vec![("2", "unknown", 0.9), ("1", "unknown", 0.3), ("0", "only", 0.2)]
        );
    }

    #[test]
    fn nothing_above_threshold_is_empty() {
        assert!(rank(&[0.01, 0.1, f32::NAN], &labels(&["a", "b", "c"]), 0.1, 3).is_empty());
        assert!(rank(&[], &LabelSet::default(), 0.1, 3).is_empty());
    }

    #[test]
    fn zero_max_results_is_empty() {
        assert!(rank(&[0.9], &labels(&["a"]), 0.1, 0).is_empty());
    }

    #[test]
    fn config_supplies_threshold_and_limit() {
        let config = PipelineConfig::new(224)
            .with_confidence_threshold(0.5)
            .with_max_results(1);
        let results = rank_with_config(&[0.6, 0.8, 0.4], &labels(&["a", "b", "c"]), &config);
        assert_eq!(summary(&results), vec![("1", "b", 0.8)]);
    }

    #[test]
    fn display_matches_label_colon_confidence() {
        let recognition = Recognition {
            id: "1".to_string(),
            label: "dog".to_string(),
            confidence: 0.5,
        };
        assert_eq!(recognition.to_string(), "dog : 0.5");
    }
}
