use chrono::{NaiveDate, NaiveDateTime};

/// 倉儲系統使用的 Excel 序列日期（1899-12-30 起算的天數）
pub fn excel_serial_date(date: NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days()
}

pub fn clock_time(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%H:%M:%S").to_string()
}

/// 接受 "%Y-%m-%d" 或 "%Y-%m-%d %H:%M:%S"
pub fn parse_document_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
