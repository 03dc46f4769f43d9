//! Frame-based dialogue detector.
//!
//! Scores how likely the frame shows a dialogue box or the naming keyboard
//! from three cheap signals:
//!
//! - **variance**: low color variance in the bottom strip (a flat text box).
//! - **edge**: high luma gradient in the top/central strip (keyboard grid).
//! - **top edge**: a sharp horizontal border in the first rows of the bottom strip.
//!
//! All scores are clamped to `[0, 1]`; malformed frames score zero.

use super::observation::Frame;

/// Frames wider than this are downsampled before scoring.
pub const MAX_SCORING_WIDTH: usize = 240;

const VARIANCE_NORMALIZER: f64 = 400.0;
const GRADIENT_NORMALIZER: f64 = 40.0;
const SIGNAL_THRESHOLD: f64 = 0.45;
const SINGLE_SIGNAL_WEIGHT: f64 = 0.45;
const NAME_UNSET_EDGE_GAIN: f64 = 1.2;
const TOP_EDGE_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DialogueScores {
    pub variance: f64,
    pub edge: f64,
    pub top_edge: f64,
    pub combined: f64,
}

/// Scores `frame`; `player_name` is the externally supplied name hint.
pub fn score_frame(frame: &Frame, player_name: Option<&str>) -> DialogueScores {
    if !frame.is_well_formed() {
        return DialogueScores::default();
    }
    let stride = frame.width.div_ceil(MAX_SCORING_WIDTH);
    let scaled;
    let frame = if stride > 1 {
        scaled = frame.downsample(stride);
        &scaled
    } else {
        frame
    };

    let strip_height = bottom_strip_height(frame.height);
    let strip_top = frame.height - strip_height;

    let variance = clamp(variance_score(frame, strip_top));
    let edge = clamp(edge_score(frame));
    let top_edge = clamp(top_edge_score(frame, strip_top));
    let combined = clamp(combine(variance, edge, top_edge, name_unset(player_name)));

    DialogueScores {
        variance,
        edge,
        top_edge,
        combined,
    }
}

/// Combined confidence only.
pub fn dialogue_confidence(frame: &Frame, player_name: Option<&str>) -> f64 {
    score_frame(frame, player_name).combined
}

fn bottom_strip_height(height: usize) -> usize {
    (height / 4).clamp(24, 60).min(height)
}

fn name_unset(player_name: Option<&str>) -> bool {
    match player_name.map(str::trim) {
        None => true,
        Some(name) => name.is_empty() || name.starts_with('?'),
    }
}

fn combine(variance: f64, edge: f64, top_edge: f64, name_unset: bool) -> f64 {
    if name_unset {
        return variance.min(edge * NAME_UNSET_EDGE_GAIN);
    }
    let signals = [variance, edge, top_edge];
    let strongest = signals.iter().copied().fold(0.0, f64::max);
    let firing = signals.iter().filter(|s| **s > SIGNAL_THRESHOLD).count();
    if firing >= 2 {
        strongest
    } else {
        strongest * SINGLE_SIGNAL_WEIGHT
    }
}

/// Mean per-channel population variance of the bottom strip, inverted.
fn variance_score(frame: &Frame, strip_top: usize) -> f64 {
    let count = ((frame.height - strip_top) * frame.width) as f64;
    if count == 0.0 {
        return 0.0;
    }
    let mut sum = [0.0f64; 3];
    let mut sum_sq = [0.0f64; 3];
    for y in strip_top..frame.height {
        for x in 0..frame.width {
            let rgb = frame.rgb(x, y);
            for (channel, value) in rgb.iter().enumerate() {
                let v = f64::from(*value);
                sum[channel] += v;
                sum_sq[channel] += v * v;
            }
        }
    }
    let mean_variance = (0..3)
        .map(|c| {
            let mean = sum[c] / count;
            (sum_sq[c] / count - mean * mean).max(0.0)
        })
        .sum::<f64>()
        / 3.0;
    1.0 - (mean_variance / VARIANCE_NORMALIZER).min(1.0)
}

/// Mean absolute luma gradient over the top/central strip.
fn edge_score(frame: &Frame) -> f64 {
    let rows = (frame.height / 2).min(120);
    if rows < 2 || frame.width < 2 {
        return 0.0;
    }
    let mut dx_total = 0.0;
    let mut dx_count = 0usize;
    let mut dy_total = 0.0;
    let mut dy_count = 0usize;
    for y in 0..rows {
        for x in 0..frame.width {
            let here = frame.luma(x, y);
            if x + 1 < frame.width {
                dx_total += (frame.luma(x + 1, y) - here).abs();
                dx_count += 1;
            }
            if y + 1 < rows {
                dy_total += (frame.luma(x, y + 1) - here).abs();
                dy_count += 1;
            }
        }
    }
    let gx = dx_total / dx_count.max(1) as f64;
    let gy = dy_total / dy_count.max(1) as f64;
    ((gx + gy) / 2.0) / GRADIENT_NORMALIZER
}

/// Mean vertical luma gradient across the first rows of the bottom strip.
fn top_edge_score(frame: &Frame, strip_top: usize) -> f64 {
    let strip_rows = frame.height - strip_top;
    let rows = TOP_EDGE_ROWS.min(strip_rows.saturating_sub(1));
    if rows == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for y in strip_top..strip_top + rows {
        for x in 0..frame.width {
            total += (frame.luma(x, y + 1) - frame.luma(x, y)).abs();
        }
    }
    (total / (rows * frame.width) as f64) / GRADIENT_NORMALIZER
}

fn clamp(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
