//! Numeric token cleaning for upstream price payloads.
//!
//! The exchange reports prices as locale-formatted strings ("1,025.00") and
//! marks unreported values with placeholders. A literal "0" from this source
//! also means "not reported", so it is treated as missing rather than zero.

const MISSING_MARKERS: [&str; 5] = ["", "0", "--", "null", "None"];

/// Parse a raw token into a float, or `None` when it is missing or not numeric.
pub fn clean_num(token: Option<&str>) -> Option<f64> {
    let raw = token?;
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if MISSING_MARKERS.contains(&cleaned.as_str()) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
