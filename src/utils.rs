use chrono::{Local, TimeZone, Utc};

/// 当前墙钟时间 (毫秒时间戳)
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 将毫秒时间戳格式化为本地时间 HH:MM:SS.mmm
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => format!("Invalid timestamp: {}", timestamp_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_millisecond_precision() {
        let formatted = format_timestamp(1_700_000_000_123);
        assert_eq!(formatted.len(), "HH:MM:SS.mmm".len());
        assert!(formatted.ends_with(".123"));
    }

    #[test]
    fn out_of_range_timestamp_is_reported() {
        assert!(format_timestamp(i64::MAX).starts_with("Invalid timestamp"));
    }
}
