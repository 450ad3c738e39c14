/// Fraction of predictions matching the true class.
pub fn accuracy(predicted: &[u8], actual: &[u8]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    hits as f64 / actual.len() as f64
}

/// Area under the ROC curve of positive-class scores against binary labels.
///
/// Tied scores are consumed as one step so they count half, as with the
/// trapezoidal rule. Returns 0.5 when either class is absent.
pub fn auc_roc(scores: &[f64], labels: &[u8]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l == 1).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5;
    }

    let mut pairs: Vec<(f64, u8)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (mut tp, mut fp, mut area) = (0f64, 0f64, 0f64);
    let mut i = 0;
    while i < pairs.len() {
        let (prev_tp, prev_fp) = (tp, fp);
        let score = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == score {
            if pairs[i].1 == 1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        area += (fp - prev_fp) * (tp + prev_tp) / 2.0;
    }
    area / (n_pos * n_neg)
}
