const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Renders a byte count with binary (1024-based) scaling and at most two
/// decimal places, rounded half-up. Trailing zeros are dropped, so 1536
/// renders as "1.5 KB" and 1024 as "1 KB". Values past the TB range stay
/// in TB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, BYTE_UNITS[unit])
}

/// Renders elapsed seconds as `HH:MM:SS`. The hours field keeps growing past
/// 99 instead of wrapping at a day boundary.
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_render_with_binary_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1), "1 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1 MB");
        assert_eq!(format_bytes(1_099_511_627_776), "1 TB");
    }

    #[test]
    fn bytes_round_half_up_at_two_decimals() {
        assert_eq!(format_bytes(1100), "1.07 KB");
        assert_eq!(format_bytes(1126), "1.1 KB");
        assert_eq!(format_bytes(2048 + 1024 / 2), "2.5 KB");
    }

    #[test]
    fn bytes_past_terabytes_stay_in_terabytes() {
        let one_pib = 1_u64 << 50;
        assert_eq!(format_bytes(one_pib), "1024 TB");
    }

    #[test]
    fn uptime_renders_zero_padded_fields() {
        assert_eq!(format_uptime(0), "00:00:00");
        assert_eq!(format_uptime(59), "00:00:59");
        assert_eq!(format_uptime(3661), "01:01:01");
    }

    #[test]
    fn uptime_hours_do_not_wrap_at_a_day() {
        assert_eq!(format_uptime(360_000), "100:00:00");
        assert_eq!(format_uptime(86_400), "24:00:00");
    }
}
