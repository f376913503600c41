//! Engine-wide counters, read-only outside the dispatcher that owns them.

#[derive(Debug, Default)]
pub struct EngineCounters {
    pub steering_success_cnt: u64,
    pub steering_fail_cnt: u64,
    pub sticky_kick_cnt: u64,
    pub btm_retries_exhausted: u64,
    pub rrm_reports_dropped: u64,
    pub queue_overflow_cnt: u64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let c = EngineCounters::new();
        assert_eq!(c.steering_success_cnt, 0);
        assert_eq!(c.queue_overflow_cnt, 0);
    }
}
