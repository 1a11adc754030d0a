//! Percentage checkpoints for long loops.

/// Percentage to report after processing `current` of `total` items, if
/// `current` lands on a checkpoint.
///
/// Checkpoints fall every `ceil(total / (100 / step))` items and always at
/// the last item. A `step` of 0 disables reporting.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn calc_progress(current: u64, total: u64, step: u32) -> Option<u32> {
    if step == 0 || total == 0 || current == 0 {
        return None;
    }
    if current == total {
        return Some(100);
    }
    let chunks = 100.0 / f64::from(step);
    let every = ((total as f64) / chunks).ceil().max(1.0) as u64;
    if current % every == 0 {
        Some(((current as f64) * 100.0 / (total as f64)).round() as u32)
    } else {
        None
    }
}

/// Logs a checkpoint line whenever [`calc_progress`] yields one.
#[derive(Debug, Clone)]
pub struct Progress {
    label: String,
    total: u64,
    step: u32,
}

impl Progress {
    pub fn new(label: impl Into<String>, total: u64, step: u32) -> Self {
        Self {
            label: label.into(),
            total,
            step,
        }
    }

    /// Record that `current` items (1-based) are done.
    pub fn tick(&self, current: u64) -> Option<u32> {
        let percent = calc_progress(current, self.total, self.step)?;
        log::info!(
            "{}: {}% ({}/{})",
            self.label,
            percent,
            current,
            self.total
        );
        Some(percent)
    }
}
