use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Every pause the client (and the engine on top of it) takes goes through
/// this, so tests can observe the schedule without waiting it out.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Client-side waits around failed calls.
#[derive(Debug, Clone)]
pub struct ClientPacing {
    /// Lower bound of the jittered wait after a 403/429.
    pub rate_limit_wait_min: Duration,
    /// Upper bound of the jittered wait after a 403/429.
    pub rate_limit_wait_max: Duration,
    /// Cooldown before handing a rate-limit failure back to the caller.
    pub rate_limit_cooldown: Duration,
    /// Cooldown before handing any other failure back to the caller.
    pub failure_cooldown: Duration,
}

impl Default for ClientPacing {
    fn default() -> Self {
        Self {
            rate_limit_wait_min: Duration::from_secs(15),
            rate_limit_wait_max: Duration::from_secs(25),
            rate_limit_cooldown: Duration::from_secs(5),
            failure_cooldown: Duration::from_secs(2),
        }
    }
}

impl ClientPacing {
    pub fn rate_limit_wait(&self) -> Duration {
        let min = self.rate_limit_wait_min.as_millis() as u64;
        let max = self.rate_limit_wait_max.as_millis() as u64;
        if max <= min {
            return self.rate_limit_wait_min;
        }
        Duration::from_millis(rand::rng().random_range(min..max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_wait_stays_in_band() {
        let pacing = ClientPacing::default();
        for _ in 0..100 {
            let wait = pacing.rate_limit_wait();
            assert!(wait >= Duration::from_secs(15));
            assert!(wait < Duration::from_secs(25));
        }
    }

    #[test]
    fn degenerate_band_uses_lower_bound() {
        let pacing = ClientPacing {
            rate_limit_wait_min: Duration::from_millis(10),
            rate_limit_wait_max: Duration::from_millis(10),
            ..ClientPacing::default()
        };
        assert_eq!(pacing.rate_limit_wait(), Duration::from_millis(10));
    }
}
