//! Human-readable byte sizes

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Format a byte count as `512B`, `1.5KB`, `23MB`...
///
/// Values below 10 keep one decimal. `speed` appends `/s`; `short` drops the
/// trailing `B` of multi-letter units (`1.5K`, `23M`).
pub fn bytonize(bytes: u64, speed: bool, short: bool) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let mut text = if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else if value < 10.0 {
        format!("{:.1}{}", value, UNITS[unit])
    } else {
        format!("{:.0}{}", value, UNITS[unit])
    };

    if short && unit > 0 {
        text.pop();
    }
    if speed {
        text.push_str("/s");
    }
    text
}
