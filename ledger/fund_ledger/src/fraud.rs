//! # Fraud
//!
//! Payment anomaly detection.
//!
//! [`IsolationForest`] is an unsupervised outlier model over one-dimensional
//! observations (the payment amounts of a single project). Each tree isolates
//! points by random splits; points that isolate in few splits score close to
//! `1.0`, ordinary points close to `0.5` or below.
//!
//! A payment is flagged when the most recent observation scores strictly
//! above the `(1 - contamination)` percentile of all scores in the window,
//! the window including the payment itself. With fewer than
//! `min_history` payments nothing is ever flagged.
//!
//! Only the last `window` payments are scored, which bounds the cost of a fit
//! no matter how long a project's history grows. Fits are seeded, so the
//! same window always gives the same answer.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::FraudConfig;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Decides whether the latest payment of a history is anomalous.
pub trait AnomalyDetector: Send + Sync {
    fn is_anomalous(&self, history: &[Decimal]) -> bool;
}

/// Seeded isolation forest with a contamination-based cut-off.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    config: FraudConfig,
}

impl IsolationForest {
    pub fn new(config: FraudConfig) -> Self {
        Self { config }
    }

    /// Anomaly score of every observation, in input order.
    pub fn score_samples(&self, values: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let sample_size = self.config.sample_size.min(values.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees: Vec<Node> = (0..self.config.trees)
            .map(|_| {
                let sample: Vec<f64> = values
                    .choose_multiple(&mut rng, sample_size)
                    .copied()
                    .collect();
                Node::grow(sample, 0, height_limit, &mut rng)
            })
            .collect();

        let normaliser = average_path_length(sample_size);
        values
            .iter()
            .map(|&x| {
                if normaliser <= 0.0 {
                    return 0.5;
                }
                let mean_depth =
                    trees.iter().map(|t| t.path_length(x, 0)).sum::<f64>() / trees.len() as f64;
                2f64.powf(-mean_depth / normaliser)
            })
            .collect()
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(FraudConfig::default())
    }
}

impl AnomalyDetector for IsolationForest {
    fn is_anomalous(&self, history: &[Decimal]) -> bool {
        if history.len() < self.config.min_history {
            return false;
        }

        let start = history.len().saturating_sub(self.config.window);
        let values: Vec<f64> = history[start..]
            .iter()
            .filter_map(ToPrimitive::to_f64)
            .collect();
        if values.len() < self.config.min_history {
            return false;
        }

        let scores = self.score_samples(&values);
        let Some(&latest) = scores.last() else {
            return false;
        };
        let threshold = percentile(&scores, 1.0 - self.config.contamination);
        debug!(
            window = values.len(),
            latest_score = latest,
            threshold,
            "scored payment history"
        );
        latest > threshold
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn grow(values: Vec<f64>, depth: usize, height_limit: usize, rng: &mut StdRng) -> Node {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if values.len() <= 1 || depth >= height_limit || min >= max {
            return Node::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|&v| v < threshold);
        Node::Split {
            threshold,
            left: Box::new(Node::grow(left, depth + 1, height_limit, rng)),
            right: Box::new(Node::grow(right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, x: f64, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                threshold,
                left,
                right,
            } => {
                if x < *threshold {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary tree of `n` nodes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linearly interpolated quantile, `q` in `[0, 1]`.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
