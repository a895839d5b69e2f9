//! Deterministic feature extraction from interaction event logs, plus the
//! standard scaler fitted on the training corpus.

mod behavioral;
mod payload;
mod pipeline;
mod scaler;

pub use behavioral::BehavioralStats;
pub use payload::{EventLogPayload, KeyPress, PointerEvent, ScrollEvent, DEFAULT_SCREEN_RESOLUTION};
pub use pipeline::{feature_matrix, FeatureExtractor};
pub use scaler::{ScalerState, StandardScaler};

use serde::{Deserialize, Serialize};

/// Bumped whenever slot order or meaning changes; persisted bundles record it.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Number of slots in every feature vector.
pub const FEATURE_DIM: usize = 19;

/// Slot order. A scaler or model fitted against this order must only see vectors in it.
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "key_interval_mean",
    "key_interval_std",
    "backspace_ratio",
    "key_count",
    "key_interval_median",
    "click_interval_mean",
    "click_count",
    "hover_distance_mean",
    "hover_distance_std",
    "hover_count",
    "hover_interval_mean",
    "hover_speed_mean",
    "scroll_speed_mean",
    "scroll_count",
    "time_spent_secs",
    "paste_count",
    "autofill_count",
    "screen_width",
    "screen_height",
];

/// Fixed-size feature vector for model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named slot, if the name is part of the schema.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }
}
