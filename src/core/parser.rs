use crate::core::active::{Polarity, Strategy};
use crate::datasets::{CellLine, EncodingMode};
use crate::models::{BoostingParams, WhichModel};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ontar")]
#[command(version = "0.1")]
#[command(about = "CRISPR on-target efficiency classification using candle", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the on-target CNN on one or more cell lines
    Train(TrainArgs),
    /// Run one active-learning experiment with gradient-boosted trees
    Learn(LearnArgs),
    /// Run a random baseline and an active learner side by side
    Compare(CompareArgs),
}

impl Command {
    pub fn run_args(&self) -> &RunArgs {
        match self {
            Command::Train(args) => &args.run,
            Command::Learn(args) => &args.run,
            Command::Compare(args) => &args.run,
        }
    }

    /// Suffix of this process' log file.
    pub fn log_tag(&self) -> &str {
        match self {
            Command::Train(_) => "train",
            Command::Learn(args) => &args.tag,
            Command::Compare(_) => "compare",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Name of this run
    #[arg(short, long)]
    pub name: String,

    /// recoder home path
    #[arg(short, long, default_value_t = String::from("tmp"))]
    pub recoder_home: String,

    /// directory holding the .episgt files
    #[arg(long, default_value = "dataset")]
    pub data_dir: PathBuf,

    /// seed
    #[arg(short, long, default_value_t = 42)]
    pub seed: u64,

    /// handling of nucleotides outside ACGT
    #[arg(long, value_enum, default_value_t = EncodingMode::Strict)]
    pub encoding: EncodingMode,
}

impl RunArgs {
    pub fn run_dir(&self) -> PathBuf {
        PathBuf::from(&self.recoder_home).join(&self.name)
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// cell lines to train on, one model each
    #[arg(short, long = "cell-line", value_enum, default_values_t = CellLine::ALL)]
    pub cell_lines: Vec<CellLine>,

    /// specity WhichModel
    #[arg(short, long, value_enum, default_value_t = WhichModel::Ontar9)]
    pub model: WhichModel,

    /// initial learning rate
    #[arg(short, long, default_value_t = 5e-5)]
    pub learning_rate: f64,

    /// batch size
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 32)]
    pub batch_size: u32,

    /// epochs
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 100)]
    pub epochs: u32,

    /// epoch after which the learning rate decays linearly to zero
    #[arg(long, default_value_t = 10)]
    pub decay_after: u32,

    /// load checkpoint
    #[arg(long, default_value_t = false)]
    pub load: bool,

    /// save checkpoint, `--save false` to skip
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub save: bool,
}

/// Knobs shared by `learn` and `compare`.
#[derive(Args, Debug, Clone)]
pub struct ActiveArgs {
    #[arg(short, long, value_enum, default_value_t = CellLine::Hela)]
    pub cell_line: CellLine,

    /// take the highest or the lowest scored candidates
    #[arg(long, value_enum, default_value_t = Polarity::Highest)]
    pub polarity: Polarity,

    /// share of the training partition labeled before the first round
    #[arg(long, default_value_t = 0.25)]
    pub seed_fraction: f64,

    /// candidates moved to the labeled pool per round
    #[arg(short = 'k', long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 16)]
    pub query_size: u32,

    /// stop after this many rounds even if candidates remain
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// boosting stages
    #[arg(long, default_value_t = 100)]
    pub n_estimators: usize,

    /// depth of every boosted tree
    #[arg(long, default_value_t = 3)]
    pub max_depth: usize,

    /// boosting shrinkage
    #[arg(long, default_value_t = 0.1)]
    pub gb_learning_rate: f64,

    /// row fraction per boosting stage
    #[arg(long, default_value_t = 1.0)]
    pub subsample: f64,
}

impl ActiveArgs {
    pub fn boosting_params(&self, seed: u64) -> BoostingParams {
        BoostingParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.gb_learning_rate,
            subsample: self.subsample,
            seed,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct LearnArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub active: ActiveArgs,

    /// candidate scoring policy
    #[arg(long, value_enum, default_value_t = Strategy::Uncertainty)]
    pub strategy: Strategy,

    /// prefix of this learner's output files
    #[arg(long, default_value = "1")]
    pub tag: String,

    /// chart color of this learner
    #[arg(long, default_value = "#d62728")]
    pub color: String,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub active: ActiveArgs,

    /// scoring policy of the active side, the other side is always random
    #[arg(long, value_enum, default_value_t = Strategy::Uncertainty)]
    pub strategy: Strategy,
}
