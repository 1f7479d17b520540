use std::time::Duration;

/// At most `amount` events per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuotaTier {
    pub amount: u32,
    pub period: Duration,
}

impl QuotaTier {
    pub const fn new(amount: u32, period: Duration) -> Self {
        Self { amount, period }
    }

    /// `amount × period`, the key tiers are ordered by.
    pub fn weight(&self) -> Duration {
        self.period.saturating_mul(self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight() {
        assert_eq!(
            QuotaTier::new(3, Duration::from_secs(1)).weight(),
            Duration::from_secs(3)
        );
        assert_eq!(
            QuotaTier::new(5, Duration::from_secs(60)).weight(),
            Duration::from_secs(300)
        );
        assert_eq!(QuotaTier::new(0, Duration::from_secs(60)).weight(), Duration::ZERO);
    }

    #[test]
    fn test_weight_saturates() {
        let tier = QuotaTier::new(u32::MAX, Duration::MAX);
        assert_eq!(tier.weight(), Duration::MAX);
    }
}
