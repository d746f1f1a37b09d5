/// Arithmetic mean of attempt scores, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// `part` as a percentage of `total`, 0 when there is nothing to divide by
pub fn percentage(part: usize, total: usize) -> f64 {
    match total {
        0 => 0.0,
        _ => part as f64 / total as f64 * 100.0,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
