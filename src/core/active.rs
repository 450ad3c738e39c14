use crate::core::parser::LearnArgs;
use crate::core::recoder::write_rounds;
use crate::core::{charts, metrics, Classifier, SelectionPolicy};
use crate::datasets::{self, TEST_FRACTION};
use crate::models::GradientBoosting;
use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// uniform random scores, the baseline
    Random,
    /// `1 - |2p - 1|`, peaks at p = 0.5
    Uncertainty,
    /// `|2p - 1|`, pair with `--polarity lowest`
    Margin,
    /// binary entropy of p
    Entropy,
}

impl Strategy {
    pub fn policy(self, seed: u64) -> Box<dyn SelectionPolicy> {
        match self {
            Strategy::Random => Box::new(RandomScore {
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
            Strategy::Uncertainty => Box::new(UncertaintyScore),
            Strategy::Margin => Box::new(MarginScore),
            Strategy::Entropy => Box::new(EntropyScore),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Polarity {
    Highest,
    Lowest,
}

pub struct RandomScore {
    rng: ChaCha8Rng,
}

impl SelectionPolicy for RandomScore {
    fn score(&mut self, _candidate: &[f32], _model: &dyn Classifier) -> f64 {
        self.rng.gen()
    }
}

pub struct UncertaintyScore;

impl SelectionPolicy for UncertaintyScore {
    fn score(&mut self, candidate: &[f32], model: &dyn Classifier) -> f64 {
        1.0 - (2.0 * model.predict_proba(candidate) - 1.0).abs()
    }
}

pub struct MarginScore;

impl SelectionPolicy for MarginScore {
    fn score(&mut self, candidate: &[f32], model: &dyn Classifier) -> f64 {
        (2.0 * model.predict_proba(candidate) - 1.0).abs()
    }
}

pub struct EntropyScore;

impl SelectionPolicy for EntropyScore {
    fn score(&mut self, candidate: &[f32], model: &dyn Classifier) -> f64 {
        let p = model.predict_proba(candidate).clamp(1e-12, 1.0 - 1e-12);
        -(p * p.ln() + (1.0 - p) * (1.0 - p).ln())
    }
}

/// Positions of the `k` best scores, ties keep pool order.
pub fn select(scores: &[f64], k: usize, polarity: Polarity) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    match polarity {
        Polarity::Highest => order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a])),
        Polarity::Lowest => order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b])),
    }
    order.truncate(k);
    order
}

/// Labeled and unlabeled record ids over one training partition.
///
/// The two sets stay disjoint and together cover the partition; ids only
/// ever move from unlabeled to labeled.
#[derive(Clone, Debug)]
pub struct Pools {
    labeled: Vec<usize>,
    unlabeled: Vec<usize>,
}

impl Pools {
    pub fn new(labeled: Vec<usize>, unlabeled: Vec<usize>) -> Self {
        Self { labeled, unlabeled }
    }

    /// Random seed pool of `seed_size` out of `n` records.
    pub fn seeded(n: usize, seed_size: usize, seed: u64) -> Self {
        let mut ids: Vec<usize> = (0..n).collect();
        ids.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
        let unlabeled = ids.split_off(seed_size.min(n));
        Self::new(ids, unlabeled)
    }

    pub fn labeled(&self) -> &[usize] {
        &self.labeled
    }

    pub fn unlabeled(&self) -> &[usize] {
        &self.unlabeled
    }

    pub fn len(&self) -> usize {
        self.labeled.len() + self.unlabeled.len()
    }

    /// Moves the unlabeled entries at `positions` to the labeled pool.
    fn promote(&mut self, positions: &[usize]) {
        let mut chosen = vec![false; self.unlabeled.len()];
        for &p in positions {
            if !chosen[p] {
                chosen[p] = true;
                self.labeled.push(self.unlabeled[p]);
            }
        }
        let mut p = 0;
        self.unlabeled.retain(|_| {
            let keep = !chosen[p];
            p += 1;
            keep
        });
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundRecord {
    pub round: usize,
    /// labeled pool size the model of this round was fitted on
    pub trained_on: usize,
    pub labeled_after: usize,
    pub accuracy: f64,
    pub auc: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct ActiveConfig {
    pub query_size: usize,
    pub max_rounds: Option<usize>,
    pub polarity: Polarity,
}

#[derive(Debug)]
pub struct ActiveReport {
    pub rounds: Vec<RoundRecord>,
    /// fit on the final labeled pool, after the last move
    pub last: RoundRecord,
}

impl ActiveReport {
    /// Accuracy curve over labeled-pool size, closed by the final fit.
    pub fn curve(&self) -> Vec<RoundRecord> {
        let mut curve = self.rounds.clone();
        curve.push(self.last);
        curve
    }
}

pub struct ActiveLearner<'a, C: Classifier> {
    train_x: &'a [Vec<f32>],
    train_y: &'a [u8],
    test_x: &'a [Vec<f32>],
    test_y: &'a [u8],
    model: C,
    policy: Box<dyn SelectionPolicy>,
    pools: Pools,
    config: ActiveConfig,
}

impl<'a, C: Classifier> ActiveLearner<'a, C> {
    pub fn new(
        (train_x, train_y): (&'a [Vec<f32>], &'a [u8]),
        (test_x, test_y): (&'a [Vec<f32>], &'a [u8]),
        model: C,
        policy: Box<dyn SelectionPolicy>,
        pools: Pools,
        config: ActiveConfig,
    ) -> Self {
        Self {
            train_x,
            train_y,
            test_x,
            test_y,
            model,
            policy,
            pools,
            config,
        }
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    fn fit_and_evaluate(&mut self) -> anyhow::Result<(f64, f64)> {
        let xs: Vec<&[f32]> = self
            .pools
            .labeled
            .iter()
            .map(|&i| self.train_x[i].as_slice())
            .collect();
        let ys: Vec<u8> = self.pools.labeled.iter().map(|&i| self.train_y[i]).collect();
        self.model.fit(&xs, &ys)?;

        let probs: Vec<f64> = self
            .test_x
            .iter()
            .map(|x| self.model.predict_proba(x))
            .collect();
        let predicted: Vec<u8> = probs.iter().map(|&p| u8::from(p > 0.5)).collect();
        Ok((
            metrics::accuracy(&predicted, self.test_y),
            metrics::auc_roc(&probs, self.test_y),
        ))
    }

    /// fit, evaluate, score every candidate, move the selected ones.
    pub fn step(&mut self, round: usize) -> anyhow::Result<RoundRecord> {
        let trained_on = self.pools.labeled.len();
        let (accuracy, auc) = self.fit_and_evaluate()?;

        let scores: Vec<f64> = self
            .pools
            .unlabeled
            .iter()
            .map(|&i| self.policy.score(&self.train_x[i], &self.model))
            .collect();
        let selected = select(&scores, self.config.query_size, self.config.polarity);
        self.pools.promote(&selected);

        Ok(RoundRecord {
            round,
            trained_on,
            labeled_after: self.pools.labeled.len(),
            accuracy,
            auc,
        })
    }

    pub fn run(mut self, mut on_round: impl FnMut(&RoundRecord)) -> anyhow::Result<ActiveReport> {
        anyhow::ensure!(self.config.query_size > 0, "query size must be positive");
        anyhow::ensure!(!self.pools.labeled.is_empty(), "the labeled seed pool is empty");
        let max_rounds = self.config.max_rounds.unwrap_or(usize::MAX);
        let mut rounds = Vec::new();
        while !self.pools.unlabeled.is_empty() && rounds.len() < max_rounds {
            let record = self.step(rounds.len() + 1)?;
            on_round(&record);
            rounds.push(record);
        }

        let labeled = self.pools.labeled.len();
        let (accuracy, auc) = self.fit_and_evaluate()?;
        let last = RoundRecord {
            round: rounds.len() + 1,
            trained_on: labeled,
            labeled_after: labeled,
            accuracy,
            auc,
        };
        Ok(ActiveReport { rounds, last })
    }
}

pub fn run(args: &LearnArgs) -> anyhow::Result<()> {
    let run_dir = args.run.run_dir();
    std::fs::create_dir_all(&run_dir)?;
    let active = &args.active;
    anyhow::ensure!(
        active.seed_fraction > 0.0 && active.seed_fraction <= 1.0,
        "seed fraction must be in (0, 1], got {}",
        active.seed_fraction
    );

    let config = active.cell_line.config(&args.run.data_dir);
    let dataset = datasets::get_dataset(&config, args.run.encoding)?;
    let (train, test) = datasets::train_test_split(&dataset, TEST_FRACTION, args.run.seed);
    let (train_x, train_y) = (train.features(), train.classes());
    let (test_x, test_y) = (test.features(), test.classes());
    anyhow::ensure!(!train.is_empty(), "{}: empty training partition", config.name);

    let seed_size = ((train.len() as f64 * active.seed_fraction).round() as usize).clamp(1, train.len());
    let pools = Pools::seeded(train.len(), seed_size, args.run.seed);
    log::info!(
        "[{}] {} on {}: train {}, test {}, seed pool {}, {} per round",
        args.tag,
        args.strategy.to_possible_value().map_or("?".into(), |v| v.get_name().to_string()),
        config.name,
        pools.len(),
        test.len(),
        seed_size,
        active.query_size
    );

    let learner = ActiveLearner::new(
        (&train_x, &train_y),
        (&test_x, &test_y),
        GradientBoosting::new(active.boosting_params(args.run.seed)),
        args.strategy.policy(args.run.seed),
        pools,
        ActiveConfig {
            query_size: active.query_size as usize,
            max_rounds: active.max_rounds,
            polarity: active.polarity,
        },
    );

    let started = Instant::now();
    let report = learner.run(|r| {
        log::info!(
            "[{}] Round {:4} -> labeled {:5} -> {:5}, accuracy: {:5.2}%, auc: {:.4}, elapsed: {:5.2?}",
            args.tag,
            r.round,
            r.trained_on,
            r.labeled_after,
            r.accuracy * 100.0,
            r.auc,
            started.elapsed()
        )
    })?;
    log::info!(
        "[{}] Final -> labeled {}, accuracy: {:5.2}%, auc: {:.4}",
        args.tag,
        report.last.trained_on,
        report.last.accuracy * 100.0,
        report.last.auc
    );

    let curve = report.curve();
    let csv_path = run_dir.join(format!("{}_rounds.csv", args.tag));
    write_rounds(&csv_path, &curve)?;
    charts::write_line_chart(
        &run_dir.join(format!("{}.svg", args.tag)),
        &config.name,
        "labeled sequences",
        "accuracy",
        &[accuracy_series(&args.tag, &args.color, &curve)],
        (0.0, 1.0),
    )?;
    log::info!("[{}] Saved rounds to {:?}", args.tag, csv_path.display());
    Ok(())
}

pub fn accuracy_series(name: &str, color: &str, curve: &[RoundRecord]) -> charts::DataSeries {
    charts::DataSeries::new(
        name,
        color,
        curve
            .iter()
            .map(|r| (r.trained_on as f64, r.accuracy))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts the first feature as the positive-class probability.
    struct FirstFeature;

    impl Classifier for FirstFeature {
        fn fit(&mut self, features: &[&[f32]], _labels: &[u8]) -> anyhow::Result<()> {
            anyhow::ensure!(!features.is_empty());
            Ok(())
        }

        fn predict_proba(&self, features: &[f32]) -> f64 {
            f64::from(features[0])
        }
    }

    fn toy_data(n: usize) -> (Vec<Vec<f32>>, Vec<u8>) {
        let xs: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32 / n as f32]).collect();
        let ys = xs.iter().map(|x| u8::from(x[0] > 0.5)).collect();
        (xs, ys)
    }

    fn config(query_size: usize, max_rounds: Option<usize>, polarity: Polarity) -> ActiveConfig {
        ActiveConfig {
            query_size,
            max_rounds,
            polarity,
        }
    }

    #[test]
    fn seed_ten_k_five_exhausts_twenty_in_four_rounds() {
        let (xs, ys) = toy_data(30);
        let pools = Pools::new((0..10).collect(), (10..30).collect());
        let learner = ActiveLearner::new(
            (&xs, &ys),
            (&xs, &ys),
            FirstFeature,
            Strategy::Random.policy(0),
            pools,
            config(5, None, Polarity::Highest),
        );
        let report = learner.run(|_| {}).unwrap();
        let sizes: Vec<(usize, usize)> = report
            .rounds
            .iter()
            .map(|r| (r.trained_on, r.labeled_after))
            .collect();
        assert_eq!(sizes, vec![(10, 15), (15, 20), (20, 25), (25, 30)]);
        assert_eq!(report.last.trained_on, 30);
        assert_eq!(report.curve().len(), 5);
    }

    #[test]
    fn pools_stay_disjoint_and_exhaustive() {
        let (xs, ys) = toy_data(40);
        let mut learner = ActiveLearner::new(
            (&xs, &ys),
            (&xs, &ys),
            FirstFeature,
            Strategy::Uncertainty.policy(0),
            Pools::seeded(40, 7, 3),
            config(6, None, Polarity::Highest),
        );
        let mut round = 1;
        while !learner.pools().unlabeled().is_empty() {
            let before = learner.pools().labeled().to_vec();
            learner.step(round).unwrap();
            let pools = learner.pools();
            assert_eq!(pools.len(), 40);
            assert!(pools.labeled().starts_with(&before));
            let mut all: Vec<usize> = pools.labeled().iter().chain(pools.unlabeled()).copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..40).collect::<Vec<_>>());
            round += 1;
        }
        // 33 candidates at 6 per round
        assert_eq!(round - 1, 6);
    }

    #[test]
    fn max_rounds_stops_early() {
        let (xs, ys) = toy_data(30);
        let learner = ActiveLearner::new(
            (&xs, &ys),
            (&xs, &ys),
            FirstFeature,
            Strategy::Margin.policy(0),
            Pools::new((0..10).collect(), (10..30).collect()),
            config(5, Some(2), Polarity::Lowest),
        );
        let report = learner.run(|_| {}).unwrap();
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.last.trained_on, 20);
    }

    #[test]
    fn uncertainty_picks_candidates_near_the_boundary() {
        let (xs, ys) = toy_data(20);
        let mut learner = ActiveLearner::new(
            (&xs, &ys),
            (&xs, &ys),
            FirstFeature,
            Strategy::Uncertainty.policy(0),
            Pools::new(vec![0, 19], (1..19).collect()),
            config(2, None, Polarity::Highest),
        );
        learner.step(1).unwrap();
        // p = 0.45 and 0.5 score 0.9 and 1.0
        assert_eq!(&learner.pools().labeled()[2..], &[10, 9]);
    }

    #[test]
    fn select_honors_polarity_and_ties() {
        let scores = [0.3, 0.9, 0.3, 0.1];
        assert_eq!(select(&scores, 2, Polarity::Highest), vec![1, 0]);
        assert_eq!(select(&scores, 2, Polarity::Lowest), vec![3, 0]);
        assert_eq!(select(&scores, 10, Polarity::Lowest).len(), 4);
    }

    #[test]
    fn policy_scores() {
        let model = FirstFeature;
        assert_eq!(UncertaintyScore.score(&[0.5], &model), 1.0);
        assert_eq!(MarginScore.score(&[1.0], &model), 1.0);
        let h = EntropyScore.score(&[0.5], &model);
        assert!((h - std::f64::consts::LN_2).abs() < 1e-12);
        assert!(EntropyScore.score(&[0.0], &model) < 1e-6);
        let mut random = Strategy::Random.policy(1);
        let s = random.score(&[0.0], &model);
        assert!((0.0..1.0).contains(&s));
    }

    #[test]
    fn seeded_pools_are_repeatable() {
        let a = Pools::seeded(50, 12, 5);
        let b = Pools::seeded(50, 12, 5);
        assert_eq!(a.labeled(), b.labeled());
        assert_eq!(a.labeled().len(), 12);
        assert_eq!(a.unlabeled().len(), 38);
    }

    #[test]
    fn empty_seed_pool_is_rejected() {
        let (xs, ys) = toy_data(5);
        let learner = ActiveLearner::new(
            (&xs, &ys),
            (&xs, &ys),
            FirstFeature,
            Strategy::Random.policy(0),
            Pools::new(vec![], (0..5).collect()),
            config(1, None, Polarity::Highest),
        );
        assert!(learner.run(|_| {}).is_err());
    }
}
