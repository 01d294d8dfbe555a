pub struct IdleEvaluator {
    threshold_ms: u32,
}

impl IdleEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        Self {
            threshold_ms: threshold_s * 1000,
        }
    }

    pub fn is_idle(&self, idle_time: u32) -> bool {
        idle_time >= self.threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::IdleEvaluator;

    #[test]
    fn test_threshold_is_inclusive() {
        let evaluator = IdleEvaluator::from_seconds(10);
        assert!(!evaluator.is_idle(9_999));
        assert!(evaluator.is_idle(10_000));
        assert!(evaluator.is_idle(11_000));
    }
}
