//! Accept, retry or reject decisions on checked answers.

use crate::rag::types::{CheckedAnswer, Confidence};

pub(crate) fn meets_threshold(checked: &CheckedAnswer, threshold: f64) -> bool {
    checked.score() >= threshold
}

/// Higher-scoring of two attempts; ties keep the first.
pub(crate) fn better_of(first: CheckedAnswer, second: CheckedAnswer) -> CheckedAnswer {
    if second.score() > first.score() {
        second
    } else {
        first
    }
}

/// Percentage for display: whole numbers bare, anything else to one decimal,
/// so a score just under the threshold never prints as the threshold.
pub fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}%", value)
    } else {
        format!("{:.1}%", value)
    }
}

/// Warning attached to an answer returned below the threshold.
pub fn rejection_warning(score: f64, threshold: f64) -> String {
    let shown = format_percent(score);
    match Confidence::from_score(score) {
        Confidence::High => format!(
            "Consistency {} is below the configured {} acceptance threshold.",
            shown,
            format_percent(threshold)
        ),
        Confidence::Medium => format!(
            "Medium confidence ({}): some statements may not be supported by the sources. \
             Verify the cited passages before relying on this answer.",
            shown
        ),
        Confidence::Low => format!(
            "Low confidence ({}): answer quality is below threshold and it may contain \
             unsupported claims. Do not rely on it without checking the sources.",
            shown
        ),
    }
}
