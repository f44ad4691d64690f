//! Small helpers shared by the reader, builder and CLI

/// Format a byte count with binary units, e.g. `1.5 KiB`
///
/// Values under 1 KiB print as whole bytes. Larger values keep at most two
/// decimals with trailing zeros dropped.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        return format!("{bytes} {}", UNITS[0]);
    }

    let text = format!("{size:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1024 * 1024 * 3 + 1024 * 256), "3.25 MiB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5 GiB");
    }
}
