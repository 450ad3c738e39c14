use crate::core::parser::TrainArgs;
use crate::core::recoder::TrainLog;
use crate::core::schedule::LinearDecay;
use crate::core::{charts, metrics};
use crate::datasets::encoding::{class_of, ALPHABET_LEN, SEQ_LEN};
use crate::datasets::{self, BatchCursor, CellLine, Label, OneHot, SequenceSet, TEST_FRACTION};
use crate::models::{get_model, OnTargetCnn};
use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::{AdamW, ModuleT, Optimizer, ParamsAdamW};
use std::time::Instant;

/// Test sequences evaluated per forward pass.
const EVAL_BATCH: usize = 512;

#[derive(Clone, Copy, Debug)]
pub struct Evaluation {
    pub accuracy: f64,
    pub loss: f64,
    pub auc: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct EpochRecord {
    pub epoch: usize,
    pub learning_rate: f64,
    pub train_loss: f32,
    pub eval: Evaluation,
}

/// `(N, 1, SEQ_LEN, ALPHABET_LEN)` batch of one-hot images.
fn images_tensor(images: &[OneHot], device: &Device) -> Result<Tensor> {
    let data: Vec<f32> = images
        .iter()
        .flat_map(|image| image.iter().flatten().copied())
        .collect();
    Tensor::from_vec(data, (images.len(), 1, SEQ_LEN, ALPHABET_LEN), device)
}

/// Class indices of one-hot labels, as `cross_entropy` expects them.
fn targets_tensor(labels: &[Label], device: &Device) -> Result<Tensor> {
    let classes: Vec<u32> = labels.iter().map(|l| u32::from(class_of(l))).collect();
    Tensor::from_vec(classes, labels.len(), device)
}

/// Held-out partition, moved to the device once.
struct TestSet {
    images: Tensor,
    targets: Tensor,
    classes: Vec<u8>,
}

impl TestSet {
    fn new(set: &SequenceSet, device: &Device) -> Result<Self> {
        Ok(Self {
            images: images_tensor(set.images(), device)?,
            targets: targets_tensor(set.labels(), device)?,
            classes: set.classes(),
        })
    }
}

pub fn run(args: &TrainArgs) -> anyhow::Result<()> {
    let device = Device::cuda_if_available(0)?;
    for &cell_line in &args.cell_lines {
        let history = train_cell_line(args, cell_line, &device)?;
        if let Some(last) = history.last() {
            log::info!(
                "{} -> {} epochs, last train loss: {:?}",
                cell_line.name(),
                history.len(),
                last.train_loss
            );
        }
        log::info!("-------------------------------------");
    }
    Ok(())
}

fn train_cell_line(args: &TrainArgs, cell_line: CellLine, device: &Device) -> anyhow::Result<Vec<EpochRecord>> {
    let run_dir = args.run.run_dir().join(cell_line.name());
    std::fs::create_dir_all(&run_dir)?;
    let batch_size = args.batch_size as usize;
    let epochs = args.epochs as usize;

    let dataset = datasets::get_dataset(&cell_line.config(&args.run.data_dir), args.run.encoding)?;
    let (train_set, test_set) = datasets::train_test_split(&dataset, TEST_FRACTION, args.run.seed);
    let (n_train, n_test) = (train_set.len(), test_set.len());
    let test = TestSet::new(&test_set, device)?;

    // a fresh parameter set for every cell line
    let mut varmap = candle_nn::VarMap::new();
    let vb = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, device);
    let model = get_model(vb, args.model)?;
    let schedule = LinearDecay::new(args.learning_rate, args.decay_after as usize, epochs)?;
    let adam_params = ParamsAdamW {
        lr: schedule.rate(0),
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut opt = AdamW::new(varmap.all_vars(), adam_params)?;

    let save_path = run_dir.join("latest_epoch.safetensors");
    if args.load {
        log::info!("loading weights from {:?}", save_path.display());
        varmap.load(&save_path)?
    }

    let mut cursor = BatchCursor::new(train_set, args.run.seed);
    let iters_per_epoch = cursor.num_examples() / batch_size;
    anyhow::ensure!(
        iters_per_epoch > 0,
        "batch size {batch_size} exceeds the {} training sequences",
        cursor.num_examples()
    );
    let mut train_log = TrainLog::open(&run_dir.join("train_log"))?;
    let mut history = Vec::with_capacity(epochs);

    for epoch in 0..epochs {
        let learning_rate = schedule.rate(epoch);
        opt.set_learning_rate(learning_rate);

        let mut loop_time = Instant::now();
        let avg_loss = train(&model, &mut opt, &mut cursor, batch_size, iters_per_epoch, device, epoch)?;
        log::info!(
            "Epoch {epoch:3} -> train average loss: {avg_loss:?}, lr: {learning_rate:.3e}, train time: {:5.2?}",
            loop_time.elapsed()
        );

        loop_time = Instant::now();
        let eval = evaluate(&model, &test)?;
        train_log.append(epoch, eval.accuracy * 100.0)?;
        log::info!(
            "Epoch {epoch:3} -> test accuracy: {:5.2}%, loss: {:.4}, auc: {:.4}, valid time: {:5.2?}",
            eval.accuracy * 100.0,
            eval.loss,
            eval.auc,
            loop_time.elapsed()
        );
        history.push(EpochRecord {
            epoch,
            learning_rate,
            train_loss: avg_loss,
            eval,
        });
    }

    if args.save {
        varmap.save(&save_path)?;
        log::info!("Saved weights to {:?}", save_path.display());
    }

    charts::write_line_chart(
        &run_dir.join("metrics.svg"),
        cell_line.name(),
        "epoch",
        "AUC",
        &history_series(&history),
        (0.0, 2.0),
    )?;

    let final_eval = evaluate(&model, &test)?;
    log::info!(
        "{}: train ({n_train}, 1, {SEQ_LEN}, {ALPHABET_LEN}) test ({n_test}, 1, {SEQ_LEN}, {ALPHABET_LEN}) -> accuracy: {:5.2}%, auc: {:.4}",
        cell_line.name(),
        final_eval.accuracy * 100.0,
        final_eval.auc
    );
    Ok(history)
}

fn train(
    model: &OnTargetCnn,
    opt: &mut AdamW,
    cursor: &mut BatchCursor,
    batch_size: usize,
    iters: usize,
    device: &Device,
    epoch: usize,
) -> anyhow::Result<f32> {
    let mut sum_loss = 0f32;
    for i in 0..iters {
        let (images, labels) = cursor.next_batch(batch_size)?;
        let images = images_tensor(images, device)?;
        let labels = targets_tensor(labels, device)?;
        let logits = model.forward_t(&images, true)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;
        opt.backward_step(&loss)?;
        let loss_scalar = loss.to_vec0::<f32>()?;
        log::debug!("[Epoch: {epoch:?};{i:?}], batch loss: {:?}", loss_scalar);
        sum_loss += loss_scalar;
    }
    Ok(sum_loss / iters as f32)
}

/// Accuracy, mean cross-entropy and AUC of the positive-class probability,
/// with batch norm in inference mode.
fn evaluate(model: &OnTargetCnn, test: &TestSet) -> Result<Evaluation> {
    let n = test.classes.len();
    let mut probs = Vec::with_capacity(n);
    let mut loss_sum = 0f64;
    for start in (0..n).step_by(EVAL_BATCH) {
        let len = EVAL_BATCH.min(n - start);
        let images = test.images.narrow(0, start, len)?;
        let targets = test.targets.narrow(0, start, len)?;
        let logits = model.forward_t(&images, false)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &targets)?.to_vec0::<f32>()?;
        loss_sum += f64::from(loss) * len as f64;
        let positive = candle_nn::ops::softmax(&logits, D::Minus1)?
            .narrow(1, 1, 1)?
            .squeeze(1)?
            .to_vec1::<f32>()?;
        probs.extend(positive.into_iter().map(f64::from));
    }
    let predicted: Vec<u8> = probs.iter().map(|&p| u8::from(p > 0.5)).collect();
    Ok(Evaluation {
        accuracy: metrics::accuracy(&predicted, &test.classes),
        loss: if n == 0 { 0.0 } else { loss_sum / n as f64 },
        auc: metrics::auc_roc(&probs, &test.classes),
    })
}

/// AUC, accuracy, loss and learning rate x100 against epoch.
fn history_series(history: &[EpochRecord]) -> Vec<charts::DataSeries> {
    let columns: [(&str, &str, fn(&EpochRecord) -> f64); 4] = [
        ("AUC", "red", |r| r.eval.auc),
        ("ACC", "magenta", |r| r.eval.accuracy),
        ("LOS", "blue", |r| r.eval.loss),
        ("LRT", "cyan", |r| r.learning_rate * 100.0),
    ];
    columns
        .iter()
        .map(|&(name, color, value)| {
            charts::DataSeries::new(
                name,
                color,
                history.iter().map(|r| (r.epoch as f64, value(r))).collect(),
            )
        })
        .collect()
}
