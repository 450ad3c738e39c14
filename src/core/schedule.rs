/// Constant learning rate for `decay_after` epochs, then a linear ramp that
/// hits zero at `num_epochs`. A run no longer than `decay_after` epochs
/// never decays.
#[derive(Clone, Copy, Debug)]
pub struct LinearDecay {
    eta: f64,
    decay_after: usize,
    num_epochs: usize,
}

impl LinearDecay {
    pub fn new(eta: f64, decay_after: usize, num_epochs: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(eta >= 0.0, "learning rate must be non-negative, got {eta}");
        Ok(Self {
            eta,
            decay_after,
            num_epochs,
        })
    }

    /// Learning rate used while training epoch `epoch` (0-based).
    pub fn rate(&self, epoch: usize) -> f64 {
        if epoch >= self.num_epochs {
            0.0
        } else if epoch < self.decay_after {
            self.eta
        } else {
            let remaining = (self.num_epochs - epoch) as f64;
            let span = (self.num_epochs - self.decay_after) as f64;
            self.eta * (remaining / span).max(0.0)
        }
    }
}
