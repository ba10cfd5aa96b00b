use std::{num::NonZeroU32, sync::Arc, time::Duration};

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};

/// A window a pause is drawn from, uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pause {
    min: Duration,
    max: Duration,
}

impl Pause {
    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub const fn fixed(secs: u64) -> Self {
        Self::secs(secs, secs)
    }

    // windows tuned against the locator's bot detection
    pub const SETTLE: Self = Self::secs(1, 3);
    pub const PAGE_LOAD: Self = Self::secs(8, 10);
    pub const FIELD: Self = Self::secs(3, 5);
    pub const FIELD_SHORT: Self = Self::secs(2, 4);
    pub const RADIO: Self = Self::secs(2, 5);
    pub const BEFORE_SUBMIT: Self = Self::secs(8, 11);
    pub const AFTER_SUBMIT: Self = Self::secs(18, 22);
    pub const RESULTS: Self = Self::secs(2, 3);
    pub const PARSE: Self = Self::secs(1, 2);
    pub const BEFORE_CLICK: Self = Self::secs(5, 7);
    pub const DETAIL_LOAD: Self = Self::secs(10, 12);
    pub const BETWEEN_DETAILS: Self = Self::secs(7, 10);
    pub const REFRESH: Self = Self::secs(7, 10);
    pub const LAUNCH_RETRY: Self = Self::fixed(3);
    pub const LEDGER_FLUSH: Self = Self::fixed(3);
}

const NAVIGATION_JITTER: Duration = Duration::from_secs(2);

/// Largest `PACE_SCALE` accepted. Beyond it the longest pause runs past half an hour.
pub const MAX_SCALE: f64 = 100.0;

fn scaled(d: Duration, scale: f64) -> Duration {
    Duration::try_from_secs_f64(d.as_secs_f64() * scale).unwrap_or(Duration::MAX)
}

/// Sleeps between browser steps and caps how often pages are loaded.
#[derive(Clone)]
pub struct Pacer {
    scale: f64,
    navigations: Option<Arc<DefaultDirectRateLimiter>>,
}

impl Pacer {
    #[must_use]
    pub fn new(scale: f64, navigations_per_minute: NonZeroU32) -> Self {
        let navigations = (scale > 0.0).then(|| {
            Arc::new(RateLimiter::direct(Quota::per_minute(
                navigations_per_minute,
            )))
        });
        Self { scale, navigations }
    }

    /// No sleeping and no rate limit.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            scale: 0.0,
            navigations: None,
        }
    }

    /// The window `pause` covers once scaled.
    #[must_use]
    pub fn window(&self, pause: Pause) -> (Duration, Duration) {
        if self.scale <= 0.0 {
            return (Duration::ZERO, Duration::ZERO);
        }
        (scaled(pause.min, self.scale), scaled(pause.max, self.scale))
    }

    #[must_use]
    pub fn sample(&self, pause: Pause) -> Duration {
        let (min, max) = self.window(pause);
        if max <= min {
            return min;
        }
        Jitter::new(min, max - min) + Duration::ZERO
    }

    pub async fn pause(&self, pause: Pause) {
        let duration = self.sample(pause);
        if !duration.is_zero() {
            tracing::trace!("sleeping {duration:?}");
            tokio::time::sleep(duration).await;
        }
    }

    /// Waits for a navigation slot.
    pub async fn before_navigation(&self) {
        if let Some(limiter) = &self.navigations {
            limiter
                .until_ready_with_jitter(Jitter::up_to(NAVIGATION_JITTER))
                .await;
        }
    }
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("scale", &self.scale)
            .field("rate_limited", &self.navigations.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_minute(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_sample_stays_in_window() {
        let pacer = Pacer::new(1.0, per_minute(60));
        for _ in 0..100 {
            let d = pacer.sample(Pause::AFTER_SUBMIT);
            assert!(d >= Duration::from_secs(18), "{d:?}");
            assert!(d <= Duration::from_secs(22), "{d:?}");
        }
        assert_eq!(pacer.sample(Pause::LAUNCH_RETRY), Duration::from_secs(3));
    }

    #[test]
    fn test_scale() {
        let pacer = Pacer::new(0.5, per_minute(60));
        assert_eq!(
            pacer.window(Pause::PAGE_LOAD),
            (Duration::from_secs(4), Duration::from_secs(5))
        );
        let off = Pacer::new(0.0, per_minute(60));
        assert_eq!(off.sample(Pause::DETAIL_LOAD), Duration::ZERO);
        assert!(off.navigations.is_none());
    }

    #[test]
    fn test_huge_scale_saturates() {
        let pacer = Pacer::new(1e300, per_minute(60));
        assert_eq!(
            pacer.window(Pause::AFTER_SUBMIT),
            (Duration::MAX, Duration::MAX)
        );
        assert_eq!(pacer.sample(Pause::AFTER_SUBMIT), Duration::MAX);
    }

    #[tokio::test]
    async fn test_disabled_pacer_does_not_wait() {
        let pacer = Pacer::disabled();
        let start = std::time::Instant::now();
        for _ in 0..10 {
            pacer.before_navigation().await;
            pacer.pause(Pause::AFTER_SUBMIT).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
