//! Bagged CART regression trees (random forest).
//!
//! Each tree is grown on a bootstrap sample by exhaustive variance-reduction
//! splits over every feature, down to `max_depth`. The forest predicts the
//! mean of its trees. Bootstrap draws come from a seeded [`StdRng`], so a
//! given seed always grows the same forest.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelError, ensure_finite};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, features: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, idx: Vec<usize>, depth: usize) -> usize {
        let n = idx.len() as f64;
        let sum: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let sum_sq: f64 = idx.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mean = sum / n;
        let parent_sse = sum_sq - sum * sum / n;

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });
        if depth >= self.params.max_depth
            || idx.len() < self.params.min_samples_split.max(2)
            || parent_sse <= 1e-12
        {
            return id;
        }

        let Some(best) = self.best_split(&idx) else {
            return id;
        };
        if best.sse >= parent_sse - 1e-12 {
            return id;
        }

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&self, idx: &[usize]) -> Option<BestSplit> {
        let n_features = self.x[idx[0]].len();
        let total: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = idx.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mut best: Option<BestSplit> = None;
        let mut sorted = idx.to_vec();

        for f in 0..n_features {
            sorted.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
            let (mut ls, mut lsq) = (0.0, 0.0);
            for s in 1..sorted.len() {
                let prev = sorted[s - 1];
                ls += self.y[prev];
                lsq += self.y[prev] * self.y[prev];
                let (lo, hi) = (self.x[prev][f], self.x[sorted[s]][f]);
                if lo == hi {
                    continue;
                }
                let nl = s as f64;
                let nr = (sorted.len() - s) as f64;
                let rs = total - ls;
                let rsq = total_sq - lsq;
                let sse = (lsq - ls * ls / nl) + (rsq - rs * rs / nr);
                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature: f,
                        threshold: lo + (hi - lo) / 2.0,
                        sse,
                    });
                }
            }
        }
        best
    }
}

/// Serialized as the `forest_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> Result<Self, ModelError> {
        if params.n_estimators == 0 || params.max_depth == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_estimators/max_depth",
                reason: "must be positive".into(),
            });
        }
        if x.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: x.len(),
                actual: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(ModelError::InsufficientData {
                required: 2,
                actual: x.len(),
            });
        }
        let n_features = x[0].len();
        if let Some(row) = x.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::ShapeMismatch {
                expected: n_features,
                actual: row.len(),
            });
        }
        ensure_finite(y, "forest target")?;
        for row in x {
            ensure_finite(row, "forest features")?;
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let trees = (0..params.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    params,
                    nodes: Vec::new(),
                };
                builder.grow(sample, 0);
                RegressionTree {
                    nodes: builder.nodes,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            trees = trees.len(),
            rows = n,
            nodes = trees.iter().map(|t| t.nodes.len()).sum::<usize>(),
            "grew random forest"
        );
        Ok(Self { n_features, trees })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::ShapeMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        ensure_finite(features, "forest features")?;
        let total: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}
