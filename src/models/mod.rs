mod boosting;
mod conv_bn;
mod ontar_cnn;
pub use boosting::{BoostingParams, GradientBoosting};
pub use conv_bn::ConvBn;
pub use ontar_cnn::OnTargetCnn;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum WhichModel {
    /// 4-32-32-64-256-256-512-512-1024-2
    Ontar9,
    /// 4-256-256-512-1024-1024-512-512-256-2
    Ontar9Wide,
}

pub fn get_model(vb: candle_nn::VarBuilder, model: WhichModel) -> candle_core::Result<OnTargetCnn> {
    match model {
        WhichModel::Ontar9 => OnTargetCnn::new(vb, &[4, 32, 32, 64, 256, 256, 512, 512, 1024, 2]),
        WhichModel::Ontar9Wide => {
            OnTargetCnn::new(vb, &[4, 256, 256, 512, 1024, 1024, 512, 512, 256, 2])
        }
    }
}
