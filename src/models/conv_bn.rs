use candle_core::{Result, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, Conv1d, Conv1dConfig, ModuleT, VarBuilder};

/// Convolution along the sequence axis followed by batch normalisation.
#[derive(Debug)]
pub struct ConvBn {
    conv: Conv1d,
    bn: BatchNorm,
}

impl ConvBn {
    pub fn new(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        // bias is carried by the batch-norm offset
        let conv = candle_nn::conv1d_no_bias(
            in_channels,
            out_channels,
            kernel_size,
            Conv1dConfig {
                stride,
                padding,
                ..Default::default()
            },
            vb.pp("conv1d"),
        )?;
        let bn = candle_nn::batch_norm(
            out_channels,
            BatchNormConfig {
                eps: 1e-3,
                ..Default::default()
            },
            vb.pp("bn"),
        )?;
        Ok(Self { conv, bn })
    }
}

impl ModuleT for ConvBn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        xs.apply(&self.conv)?.apply_t(&self.bn, train)
    }
}
