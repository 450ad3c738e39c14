use crate::core::active::RoundRecord;
use crate::core::parser::Command;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// `<dir>/<timestamp>-<tag>.log`, creating `dir` if needed. The tag keeps the
/// two learners of one comparison, started within the same second, apart.
fn timestamped_log_path(dir: &Path, tag: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m-%d--%H:%M:%S");
    Ok(dir.join(format!("{stamp}-{tag}.log")))
}

/// Every record goes to the run's log file, `Info` and up also to stderr.
pub fn build_log_config(command: &Command) -> anyhow::Result<log4rs::Config> {
    let level = log::LevelFilter::Info;
    let log_path = timestamped_log_path(&command.run_args().run_dir(), command.log_tag())?;

    let stderr = ConsoleAppender::builder().target(Target::Stderr).build();

    let logfile = FileAppender::builder()
        // Pattern: https://docs.rs/log4rs/*/log4rs/encode/pattern/index.html
        .encoder(Box::new(PatternEncoder::new(
            "{d(%+)(utc)} [{f}:{L}] {h({l})} -> {m}{n}",
        )))
        .build(log_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        )
        .build(
            Root::builder()
                .appender("logfile")
                .appender("stderr")
                .build(log::LevelFilter::Trace),
        )?;

    Ok(config)
}

/// Append-only `epoch,accuracy` rows, no header.
pub struct TrainLog {
    writer: csv::Writer<File>,
}

impl TrainLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
        })
    }

    pub fn append(&mut self, epoch: usize, accuracy_percent: f64) -> anyhow::Result<()> {
        self.writer
            .write_record([epoch.to_string(), format!("{accuracy_percent:.4}")])?;
        self.writer.flush()?;
        Ok(())
    }
}

const ROUND_HEADER: [&str; 5] = ["round", "trained_on", "labeled_after", "accuracy", "auc"];

pub fn write_rounds(path: &Path, rounds: &[RoundRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(ROUND_HEADER)?;
    for r in rounds {
        writer.write_record([
            r.round.to_string(),
            r.trained_on.to_string(),
            r.labeled_after.to_string(),
            format!("{:.6}", r.accuracy),
            format!("{:.6}", r.auc),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_rounds(path: &Path) -> anyhow::Result<Vec<RoundRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rounds = Vec::new();
    for result in reader.records() {
        let record = result?;
        anyhow::ensure!(
            record.len() == ROUND_HEADER.len(),
            "{}: expected {} columns, found {}",
            path.display(),
            ROUND_HEADER.len(),
            record.len()
        );
        rounds.push(RoundRecord {
            round: record[0].parse()?,
            trained_on: record[1].parse()?,
            labeled_after: record[2].parse()?,
            accuracy: record[3].parse()?,
            auc: record[4].parse()?,
        });
    }
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_log_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_log");
        TrainLog::open(&path).unwrap().append(0, 61.5).unwrap();
        let mut log = TrainLog::open(&path).unwrap();
        log.append(1, 70.25).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "0,61.5000\n1,70.2500\n");
    }

    #[test]
    fn log_files_are_tagged_per_process() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("cmp");
        let random = timestamped_log_path(&run_dir, "random").unwrap();
        let active = timestamped_log_path(&run_dir, "active").unwrap();
        assert!(run_dir.is_dir());
        assert_eq!(random.parent(), Some(run_dir.as_path()));
        assert!(random.to_str().unwrap().ends_with("-random.log"));
        assert_ne!(random, active);
    }

    #[test]
    fn rounds_survive_a_csv_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("random_rounds.csv");
        let rounds = vec![
            RoundRecord {
                round: 1,
                trained_on: 10,
                labeled_after: 15,
                accuracy: 0.5,
                auc: 0.625,
            },
            RoundRecord {
                round: 2,
                trained_on: 15,
                labeled_after: 15,
                accuracy: 0.75,
                auc: 0.8,
            },
        ];
        write_rounds(&path, &rounds).unwrap();
        assert_eq!(read_rounds(&path).unwrap(), rounds);
    }
}
