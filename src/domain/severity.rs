// Humidity severity classification
use serde::Serialize;

/// Humidity at or below this is safe.
pub const SAFE_UP_TO: f64 = 50.0;
/// Humidity at or above this is dangerous.
pub const DANGER_FROM: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Safe,
    Warning,
    Danger,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Safe => "Safe",
            Severity::Warning => "Warning",
            Severity::Danger => "Danger",
        }
    }

    /// Style tag for the status badge.
    pub fn style(&self) -> &'static str {
        match self {
            Severity::Safe => "ok",
            Severity::Warning => "warn",
            Severity::Danger => "danger",
        }
    }
}

/// Thresholds: `[.., 50]` safe, `(50, 60)` warning, `[60, ..]` danger.
///
/// The first browser dashboard used 55/65 with the lower bound closed
/// (`< 55` safe, `< 65` warning). These bands replace it everywhere a
/// severity is shown, including the per-point history series.
///
/// Readings are validated as finite before they reach here; a NaN would
/// fall through to `Warning`.
pub fn classify(humidity: f64) -> Severity {
    if humidity >= DANGER_FROM {
        Severity::Danger
    } else if humidity <= SAFE_UP_TO {
        Severity::Safe
    } else {
        Severity::Warning
    }
}
