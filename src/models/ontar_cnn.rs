use super::ConvBn;
use crate::datasets::encoding::{ALPHABET_LEN, NUM_CLASSES};
use candle_core::{Result, Tensor, D};
use candle_nn::{ModuleT, VarBuilder};

/// `(kernel, stride, padding)` of every stage. Padding 1 on a width-3 kernel
/// keeps the length ("same"), stage 8 is unpadded and collapses the
/// remaining 3 positions to 1: 23 -> 23 -> 12 -> 12 -> 6 -> 6 -> 3 -> 3 -> 1 -> 1.
const STAGES: [(usize, usize, usize); 9] = [
    (3, 1, 1),
    (3, 2, 1),
    (3, 1, 1),
    (3, 2, 1),
    (3, 1, 1),
    (3, 2, 1),
    (3, 1, 1),
    (3, 1, 0),
    (1, 1, 0),
];

pub type Channels = [usize; STAGES.len() + 1];

/// Nine conv + batch-norm stages over one-hot target sequences.
#[derive(Debug)]
pub struct OnTargetCnn {
    stages: Vec<ConvBn>,
}

impl OnTargetCnn {
    pub fn new(vb: VarBuilder, channels: &Channels) -> Result<Self> {
        if channels[0] != ALPHABET_LEN || channels[STAGES.len()] != NUM_CLASSES {
            candle_core::bail!(
                "channels must start at {ALPHABET_LEN} and end at {NUM_CLASSES}, got {channels:?}"
            )
        }
        let vb_stages = vb.pp("stages");
        let stages = STAGES
            .iter()
            .enumerate()
            .map(|(i, &(kernel, stride, padding))| {
                ConvBn::new(
                    vb_stages.pp(&(i + 1).to_string()),
                    channels[i],
                    channels[i + 1],
                    kernel,
                    stride,
                    padding,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { stages })
    }
}

impl ModuleT for OnTargetCnn {
    /// `xs`: `(N, 1, SEQ_LEN, ALPHABET_LEN)` one-hot batch, returns `(N, 2)` logits.
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        // nucleotides become channels, positions the convolved axis
        let mut xs = xs.squeeze(1)?.transpose(1, 2)?.contiguous()?;
        let last = self.stages.len() - 1;
        for (i, stage) in self.stages.iter().enumerate() {
            xs = stage.forward_t(&xs, train)?;
            if i < last {
                xs = xs.relu()?;
            }
        }
        xs.squeeze(D::Minus1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::encoding::SEQ_LEN;
    use crate::models::{get_model, WhichModel};
    use candle_core::{DType, Device};
    use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};

    fn one_hot_batch(n: usize, device: &Device) -> Tensor {
        let mut data = vec![0f32; n * SEQ_LEN * ALPHABET_LEN];
        for (i, row) in data.chunks_mut(ALPHABET_LEN).enumerate() {
            row[i % ALPHABET_LEN] = 1.0;
        }
        Tensor::from_vec(data, (n, 1, SEQ_LEN, ALPHABET_LEN), device).unwrap()
    }

    #[test]
    fn logits_have_one_row_per_sequence() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = get_model(vb, WhichModel::Ontar9).unwrap();
        let xs = one_hot_batch(3, &device);
        assert_eq!(model.forward_t(&xs, false).unwrap().dims(), &[3, 2]);
        assert_eq!(model.forward_t(&xs, true).unwrap().dims(), &[3, 2]);
    }

    #[test]
    fn one_adam_step_runs() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = get_model(vb, WhichModel::Ontar9).unwrap();
        let mut opt = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: 1e-3,
                weight_decay: 0.0,
                ..Default::default()
            },
        )
        .unwrap();
        let xs = one_hot_batch(4, &device);
        let ys = Tensor::new(&[0u32, 1, 0, 1], &device).unwrap();
        let logits = model.forward_t(&xs, true).unwrap();
        let loss = candle_nn::loss::cross_entropy(&logits, &ys).unwrap();
        opt.backward_step(&loss).unwrap();
        assert!(loss.to_vec0::<f32>().unwrap().is_finite());
    }

    #[test]
    fn batch_norm_statistics_are_checkpointed() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        get_model(vb, WhichModel::Ontar9).unwrap();
        let running = varmap
            .data()
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.contains("running_"))
            .count();
        assert_eq!(running, 2 * STAGES.len());
    }

    #[test]
    fn rejects_mismatched_channels() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        assert!(OnTargetCnn::new(vb, &[3, 8, 8, 8, 8, 8, 8, 8, 8, 2]).is_err());
    }
}
