use chrono::{DateTime, Utc};

use crate::cells::traits::TimeSource;

/// Wall clock time source
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
