//! Gradient-boosted regression trees on binary log-loss.
//!
//! Each stage fits a depth-limited tree to the negative gradient
//! `y - sigmoid(F)` and stores Newton leaf values; predictions are
//! `sigmoid(init + learning_rate * sum(trees))`.

use crate::core::Classifier;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

#[derive(Clone, Debug)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for every stage.
    pub subsample: f64,
    /// Upper bound on split thresholds tried per feature.
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_leaf: 1,
            subsample: 1.0,
            max_bins: 32,
            seed: 0,
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, xs: &[f32]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if xs[*feature] <= *threshold {
                    left.predict(xs)
                } else {
                    right.predict(xs)
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct GradientBoosting {
    params: BoostingParams,
    init: f64,
    trees: Vec<Node>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw additive score (log-odds of the positive class).
    pub fn decision_function(&self, xs: &[f32]) -> f64 {
        self.init
            + self.params.learning_rate * self.trees.iter().map(|t| t.predict(xs)).sum::<f64>()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Midpoints between consecutive distinct values of every feature, thinned
/// to at most `max_bins` evenly spaced candidates.
fn candidate_thresholds(features: &[&[f32]], max_bins: usize) -> Vec<Vec<f32>> {
    let n_features = features[0].len();
    (0..n_features)
        .into_par_iter()
        .map(|f| {
            let mut values: Vec<f32> = features.iter().map(|row| row[f]).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();
            let mids: Vec<f32> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
            if mids.len() <= max_bins {
                mids
            } else {
                (0..max_bins)
                    .map(|k| mids[k * mids.len() / max_bins])
                    .collect()
            }
        })
        .collect()
}

struct SplitChoice {
    feature: usize,
    threshold: f32,
    gain: f64,
}

struct TreeGrower<'a> {
    features: &'a [&'a [f32]],
    residuals: &'a [f64],
    hessians: &'a [f64],
    thresholds: &'a [Vec<f32>],
    max_depth: usize,
    min_samples_leaf: usize,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: Vec<usize>, depth: usize) -> Node {
        if depth >= self.max_depth || rows.len() < 2 * self.min_samples_leaf {
            return self.leaf(&rows);
        }
        let best = (0..self.thresholds.len())
            .into_par_iter()
            .filter_map(|f| self.best_split(f, &rows))
            .max_by(|a, b| a.gain.total_cmp(&b.gain));
        match best {
            Some(split) if split.gain > 1e-12 => {
                let (left, right): (Vec<usize>, Vec<usize>) = rows
                    .into_iter()
                    .partition(|&i| self.features[i][split.feature] <= split.threshold);
                Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(self.grow(left, depth + 1)),
                    right: Box::new(self.grow(right, depth + 1)),
                }
            }
            _ => self.leaf(&rows),
        }
    }

    fn leaf(&self, rows: &[usize]) -> Node {
        let (g, h) = rows.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.residuals[i], h + self.hessians[i])
        });
        Node::Leaf(if h < 1e-12 { 0.0 } else { g / h })
    }

    fn best_split(&self, feature: usize, rows: &[usize]) -> Option<SplitChoice> {
        let thresholds = &self.thresholds[feature];
        if thresholds.is_empty() {
            return None;
        }
        // bin b holds values in (t[b-1], t[b]]
        let mut counts = vec![0usize; thresholds.len() + 1];
        let mut sums = vec![0f64; thresholds.len() + 1];
        for &i in rows {
            let v = self.features[i][feature];
            let bin = thresholds.partition_point(|&t| t < v);
            counts[bin] += 1;
            sums[bin] += self.residuals[i];
        }

        let n = rows.len();
        let total: f64 = sums.iter().sum();
        let parent = total * total / n as f64;
        let (mut n_left, mut s_left) = (0usize, 0f64);
        let mut best: Option<SplitChoice> = None;
        for (b, &threshold) in thresholds.iter().enumerate() {
            n_left += counts[b];
            s_left += sums[b];
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf.max(1) || n_right < self.min_samples_leaf.max(1) {
                continue;
            }
            let s_right = total - s_left;
            let gain = s_left * s_left / n_left as f64 + s_right * s_right / n_right as f64 - parent;
            if best.as_ref().map_or(true, |s| gain > s.gain) {
                best = Some(SplitChoice {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, features: &[&[f32]], labels: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(!features.is_empty(), "cannot fit on an empty training set");
        anyhow::ensure!(
            features.len() == labels.len(),
            "features: {} labels: {}",
            features.len(),
            labels.len()
        );
        let params = &self.params;
        let n = features.len();
        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let prior = (targets.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        self.init = (prior / (1.0 - prior)).ln();
        self.trees.clear();

        let thresholds = candidate_thresholds(features, params.max_bins);
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let n_sample = ((n as f64 * params.subsample).ceil() as usize).clamp(1, n);
        let mut scores = vec![self.init; n];
        let mut rows: Vec<usize> = (0..n).collect();

        for _ in 0..params.n_estimators {
            let probs: Vec<f64> = scores.iter().map(|&s| sigmoid(s)).collect();
            let residuals: Vec<f64> = targets.iter().zip(&probs).map(|(y, p)| y - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();
            if n_sample < n {
                rows.shuffle(&mut rng);
            }
            let grower = TreeGrower {
                features,
                residuals: &residuals,
                hessians: &hessians,
                thresholds: &thresholds,
                max_depth: params.max_depth,
                min_samples_leaf: params.min_samples_leaf,
            };
            let tree = grower.grow(rows[..n_sample].to_vec(), 0);
            for (score, row) in scores.iter_mut().zip(features) {
                *score += params.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        log::trace!("boosting fit: {n} rows, {} trees", self.trees.len());
        Ok(())
    }

    fn predict_proba(&self, features: &[f32]) -> f64 {
        sigmoid(self.decision_function(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_problem() -> (Vec<Vec<f32>>, Vec<u8>) {
        // label follows feature 1, feature 0 and 2 are noise
        let xs: Vec<Vec<f32>> = (0..64)
            .map(|i| vec![(i % 3) as f32, ((i / 2) % 2) as f32, ((i * 7) % 5) as f32])
            .collect();
        let ys = xs.iter().map(|x| x[1] as u8).collect();
        (xs, ys)
    }

    #[test]
    fn learns_a_separable_feature() {
        let (xs, ys) = toy_problem();
        let rows: Vec<&[f32]> = xs.iter().map(Vec::as_slice).collect();
        let mut gb = GradientBoosting::new(BoostingParams {
            n_estimators: 20,
            ..Default::default()
        });
        gb.fit(&rows, &ys).unwrap();
        assert_eq!(gb.n_trees(), 20);
        for (x, &y) in xs.iter().zip(&ys) {
            let p = gb.predict_proba(x);
            assert!(p > 0.0 && p < 1.0);
            assert_eq!((p > 0.5) as u8, y);
        }
    }

    #[test]
    fn single_class_stays_on_that_class() {
        let xs = vec![vec![0.0f32, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let rows: Vec<&[f32]> = xs.iter().map(Vec::as_slice).collect();
        let mut gb = GradientBoosting::new(BoostingParams::default());
        gb.fit(&rows, &[1, 1, 1]).unwrap();
        assert!(xs.iter().all(|x| gb.predict_proba(x) > 0.99));
    }

    #[test]
    fn subsampled_fit_is_repeatable() {
        let (xs, ys) = toy_problem();
        let rows: Vec<&[f32]> = xs.iter().map(Vec::as_slice).collect();
        let params = BoostingParams {
            n_estimators: 10,
            subsample: 0.5,
            seed: 9,
            ..Default::default()
        };
        let mut a = GradientBoosting::new(params.clone());
        let mut b = GradientBoosting::new(params);
        a.fit(&rows, &ys).unwrap();
        b.fit(&rows, &ys).unwrap();
        assert_eq!(a.decision_function(&xs[5]), b.decision_function(&xs[5]));
    }

    #[test]
    fn empty_fit_is_an_error() {
        let mut gb = GradientBoosting::new(BoostingParams::default());
        assert!(gb.fit(&[], &[]).is_err());
    }
}
