//! Common helpers shared across models

use num_format::{Locale, ToFormattedString};

/// Strip `/dev/` and `/dev/mapper/` prefixes so names from the block tree,
/// the encryption list and the NAS list compare equal.
pub fn device_name(path: &str) -> &str {
    path.strip_prefix("/dev/mapper/")
        .or_else(|| path.strip_prefix("/dev/"))
        .unwrap_or(path)
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps <= 8 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        6 => "EB",
        7 => "ZB",
        8 => "YB",
        _ => "Not Supported",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_strips_known_prefixes() {
        assert_eq!(device_name("/dev/sdb1"), "sdb1");
        assert_eq!(device_name("/dev/mapper/luks-sdb1"), "luks-sdb1");
        assert_eq!(device_name("sdb"), "sdb");
    }

    #[test]
    fn pretty_bytes_uses_binary_units() {
        assert_eq!(bytes_to_pretty(&512, false), "512.00 B");
        assert_eq!(bytes_to_pretty(&(3 * 1024 * 1024), false), "3.00 MB");
        assert_eq!(bytes_to_pretty(&2048, true), "2.00 KB (2,048 bytes)");
    }
}
