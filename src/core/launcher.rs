use crate::core::active::{accuracy_series, Strategy};
use crate::core::parser::{ActiveArgs, CompareArgs, RunArgs};
use crate::core::{charts, recoder};
use anyhow::Context;
use clap::ValueEnum;
use std::ffi::OsString;
use std::process::{Child, Command};

const RANDOM_COLOR: &str = "#17becf";
const ACTIVE_COLOR: &str = "#d62728";

fn value_name<T: ValueEnum>(value: T) -> OsString {
    value
        .to_possible_value()
        .map(|v| OsString::from(v.get_name()))
        .unwrap_or_default()
}

/// Command line of one `learn` child process.
fn learn_args(run: &RunArgs, active: &ActiveArgs, strategy: Strategy, tag: &str, color: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "learn".into(),
        "--name".into(),
        run.name.clone().into(),
        "--recoder-home".into(),
        run.recoder_home.clone().into(),
        "--data-dir".into(),
        run.data_dir.clone().into(),
        "--seed".into(),
        run.seed.to_string().into(),
        "--encoding".into(),
        value_name(run.encoding),
        "--cell-line".into(),
        value_name(active.cell_line),
        "--polarity".into(),
        value_name(active.polarity),
        "--seed-fraction".into(),
        active.seed_fraction.to_string().into(),
        "--query-size".into(),
        active.query_size.to_string().into(),
        "--n-estimators".into(),
        active.n_estimators.to_string().into(),
        "--max-depth".into(),
        active.max_depth.to_string().into(),
        "--gb-learning-rate".into(),
        active.gb_learning_rate.to_string().into(),
        "--subsample".into(),
        active.subsample.to_string().into(),
        "--strategy".into(),
        value_name(strategy),
        "--tag".into(),
        tag.into(),
        "--color".into(),
        color.into(),
    ];
    if let Some(max_rounds) = active.max_rounds {
        args.push("--max-rounds".into());
        args.push(max_rounds.to_string().into());
    }
    args
}

/// Waits for every child, in order, and returns the tags of those that failed.
fn join_all(children: &mut [(&'static str, Child)]) -> anyhow::Result<Vec<&'static str>> {
    let mut failed = Vec::new();
    for (tag, child) in children.iter_mut() {
        let tag = *tag;
        let status = child.wait()?;
        if status.success() {
            log::info!("[{tag}] learner finished");
        } else {
            log::error!("[{tag}] learner exited with {status}");
            failed.push(tag);
        }
    }
    Ok(failed)
}

/// Runs the random baseline and the active learner as two OS processes.
pub fn run(args: &CompareArgs) -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    let learners = [
        ("random", Strategy::Random, RANDOM_COLOR),
        ("active", args.strategy, ACTIVE_COLOR),
    ];

    let mut children = Vec::with_capacity(learners.len());
    for (tag, strategy, color) in learners {
        let spawned = Command::new(&exe)
            .args(learn_args(&args.run, &args.active, strategy, tag, color))
            .spawn()
            .with_context(|| format!("failed to start the {tag} learner"));
        match spawned {
            Ok(child) => {
                log::info!("[{tag}] learner started, pid {}", child.id());
                children.push((tag, child));
            }
            Err(err) => {
                join_all(&mut children)?;
                return Err(err);
            }
        }
    }

    let failed = join_all(&mut children)?;
    anyhow::ensure!(failed.is_empty(), "learner(s) failed: {}", failed.join(", "));

    let run_dir = args.run.run_dir();
    let mut series = Vec::with_capacity(learners.len());
    for (tag, _, color) in learners {
        let rounds = recoder::read_rounds(&run_dir.join(format!("{tag}_rounds.csv")))?;
        series.push(accuracy_series(tag, color, &rounds));
    }
    let chart_path = run_dir.join("comparison.svg");
    charts::write_line_chart(
        &chart_path,
        args.active.cell_line.name(),
        "labeled sequences",
        "accuracy",
        &series,
        (0.0, 1.0),
    )?;
    log::info!("Saved comparison to {:?}", chart_path.display());
    Ok(())
}
