//! Human-readable byte counts
//!
//! Only used for observability: object sizes and per-source totals in log lines.

use byte_unit::{Byte, UnitType};

/// Format a byte count with binary units, e.g. `1536` -> `"1.50 KiB"`.
pub fn format_size(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{adjusted:.2}")
}
