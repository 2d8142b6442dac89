const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Render seconds as `MM:SS`
pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "00:00".to_string();
    }
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, seconds)
}

/// Render a byte count in the largest fitting unit, two decimals at most
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0;
    let mut scale = 1u64;
    while exponent < SIZE_UNITS.len() - 1 && bytes >= scale * 1024 {
        scale *= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / scale as f64;
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[exponent])
}
