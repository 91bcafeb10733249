//! start_time 的格式化

use chrono::{DateTime, FixedOffset, Utc};

/// `YYYY-MM-DD HH:MM:SS`
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 按固定UTC偏移输出本地时间
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format(START_TIME_FORMAT)
            .to_string()
    }

    pub fn now_formatted(&self) -> String {
        self.format(Utc::now())
    }
}
