//! Model bundle persistence: weights, scaler, threshold and dimensionality as one unit.

mod bundle;

pub use bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
