//! Unit conversions applied to bus messages before they reach the browser.
//!
//! Two sub-operations, both keyed on optional paths of the decoded message:
//!
//! * `msg.data` – a 6-element pose vector.  Indices 0–2 are angles and are
//!   converted from radians to degrees; indices 3–5 are translations and
//!   pass through untouched.
//! * `msg.time` – a Unix timestamp in seconds, rendered as `HH:MM:SS` (UTC).
//!
//! A missing `msg`, `msg.data` or `msg.time` simply skips that step.
//!
//! # Example
//!
//! ```rust
//! use kinebridge_middleware::transform::apply;
//! use serde_json::json;
//!
//! let mut message = json!({"msg": {"data": [0.0, 0.0, 0.0, 1, 2, 3], "time": 3661}});
//! apply(&mut message);
//! assert_eq!(message["msg"]["time"], "01:01:01");
//! assert_eq!(message["msg"]["data"][3], 1);
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};

/// The π approximation used for the degree conversion.
///
/// Not [`std::f64::consts::PI`].  Converted values must match those computed
/// with this exact constant.
#[allow(clippy::approx_constant)]
pub const PI_APPROX: f64 = 3.14159265;

/// Positions in `msg.data` that are never converted.
pub const EXCLUDED_INDICES: [usize; 3] = [3, 4, 5];

fn to_degrees(radians: f64) -> f64 {
    radians * (180.0 / PI_APPROX)
}

fn is_excluded(index: usize) -> bool {
    EXCLUDED_INDICES.contains(&index)
}

/// Convert every entry of `data` from radians to degrees, except the
/// entries at [`EXCLUDED_INDICES`].
pub fn convert_data(data: &[f64]) -> Vec<f64> {
    data.iter()
        .enumerate()
        .map(|(i, &v)| if is_excluded(i) { v } else { to_degrees(v) })
        .collect()
}

/// Format a Unix timestamp (seconds, possibly fractional) as `HH:MM:SS` in
/// UTC.  Sub-second precision is dropped.
///
/// Returns `None` for non-finite values and timestamps outside the range
/// chrono can represent.
pub fn convert_timestamp(ts: f64) -> Option<String> {
    if !ts.is_finite() {
        return None;
    }
    let secs = ts.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs as i64, 0).map(|dt| dt.format("%H:%M:%S").to_string())
}

/// In-place variant of [`convert_data`] over JSON values.
///
/// Excluded positions keep their original JSON representation, so integer
/// translations stay integers.  Non-numeric entries are left alone.
fn convert_data_values(data: &mut [Value]) {
    for (i, value) in data.iter_mut().enumerate() {
        if is_excluded(i) {
            continue;
        }
        if let Some(converted) = value.as_f64().map(to_degrees).and_then(Number::from_f64) {
            *value = Value::Number(converted);
        }
    }
}

/// Apply both conversions to a decoded bus message.
pub fn apply(message: &mut Value) {
    let Some(msg) = message.get_mut("msg") else {
        return;
    };

    if let Some(Value::Array(data)) = msg.get_mut("data") {
        convert_data_values(data);
    }

    if let Some(time) = msg.get_mut("time")
        && let Some(formatted) = time.as_f64().and_then(convert_timestamp)
    {
        *time = Value::String(formatted);
    }
}
