use chrono::{DateTime, Utc};

/// Filename timestamp format. Every field is zero padded, widest unit first,
/// so lexicographic order over snapshot filenames equals chronological order.
/// The `--recent` selection relies on this.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// The standard way of stamping observations and snapshot filenames.
pub fn timestamp_slug(moment: DateTime<Utc>) -> String {
    moment.format(TIMESTAMP_FORMAT).to_string()
}

/// Seconds since the epoch as a float, the verdict timestamp representation.
pub fn epoch_seconds(moment: DateTime<Utc>) -> f64 {
    moment.timestamp_millis() as f64 / 1000.0
}
