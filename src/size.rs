//! Human readable byte sizes in decimal units.

const UNITS: [&str; 3] = ["KB", "MB", "GB"];
const STEP: f64 = 1000.0;
const SIGNIFICANT: i32 = 3;

/// Formats a byte count as `B`, `KB`, `MB` or `GB`.
///
/// Counts below 1000 are printed as whole bytes. Larger counts are scaled by
/// 1000 per tier and shown with three significant digits, so `1_500_000`
/// becomes `"1.50MB"`. A value that would round to `1000` in one tier moves to
/// the next one instead. Past the GB tier the mantissa grows beyond three digits.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64 / STEP;
    let mut tier = 0usize;
    loop {
        let rounded = round_significant(value);
        if rounded >= STEP && tier + 1 < UNITS.len() {
            value /= STEP;
            tier += 1;
            continue;
        }
        let decimals = decimals_for(rounded);
        return format!("{:.*}{}", decimals, rounded, UNITS[tier]);
    }
}

fn round_significant(value: f64) -> f64 {
    let magnitude = value.log10().floor() as i32;
    let factor = 10f64.powi(SIGNIFICANT - 1 - magnitude);
    (value * factor).round() / factor
}

fn decimals_for(rounded: f64) -> usize {
    let magnitude = rounded.log10().floor() as i32;
    (SIGNIFICANT - 1 - magnitude).max(0) as usize
}
