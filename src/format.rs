// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Fixed-width formatting for the quantities shown in the table. Column
//! widths are derived from the `MAX_WIDTH_*` constants, so every formatter
//! here must stay within its declared width.

/// Maximum rendered width of a CPU percentage ("100.00").
pub const MAX_WIDTH_CPU: usize = 6;
/// Maximum rendered width of a block I/O rate ("1023.9K/s").
pub const MAX_WIDTH_BLKIO: usize = 9;
/// Maximum rendered width of a byte count ("1023.9P").
pub const MAX_WIDTH_MEMORY: usize = 7;

const UNITS: [&str; 7] = ["B", "K", "M", "G", "T", "P", "E"];

fn humanize(value: f64) -> String {
    let mut value = value;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", value.round() as u64, UNITS[unit])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}

/// Formats a CPU percentage.
pub fn percent_to_str(value: f64) -> String {
    format!("{value:.2}")
}

/// Formats a block I/O rate in bytes per second.
pub fn byps_to_str(value: f64) -> String {
    format!("{}/s", humanize(value))
}

/// Formats an absolute byte count.
pub fn byte_count_to_str(value: u64) -> String {
    humanize(value as f64)
}
