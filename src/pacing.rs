use std::time::Duration;

/// Cooperative fixed delay between outbound actions.
///
/// Used after every delivered deal and between recipients of one deal.
/// A zero delay returns immediately.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waits_the_configured_delay() {
        let pacer = FixedDelay::from_millis(20);
        let start = tokio::time::Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn none_does_not_sleep() {
        let start = std::time::Instant::now();
        FixedDelay::none().wait().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
