//! Open-loop request generator.
//!
//! A fixed-interval timer fires once every `60 / rpm` seconds. Each tick
//! spawns one request task and the loop moves straight on to the next tick;
//! nothing in the loop waits on a response. The number of tasks in flight is
//! capped by a semaphore. A tick that finds the cap exhausted is dropped
//! rather than delayed, so the emission schedule never slows down.

use std::{
    future::Future,
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Semaphore, time};
use tracing::{debug, error, info, warn};

pub mod client;
pub mod counter;

pub use client::{PipeClient, RequestError, TinybirdPipe};
pub use counter::{SuccessCounter, is_milestone};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("requests per minute must be between 1 and {max}, got {0}", max = u32::MAX)]
    InvalidRate(i64),
    #[error("max in-flight requests must be at least 1, got {0}")]
    InvalidCapacity(usize),
}

/// Requests per minute, strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rpm(NonZeroU32);

impl Rpm {
    pub const DEFAULT: u32 = 100;

    pub fn new(value: i64) -> Result<Self, GeneratorError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(GeneratorError::InvalidRate(value))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Time between ticks.
    pub fn interval(self) -> Duration {
        Duration::from_secs_f64(delay_seconds(self))
    }
}

impl std::fmt::Display for Rpm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seconds between ticks for the given rate.
pub fn delay_seconds(rpm: Rpm) -> f64 {
    60.0 / f64::from(rpm.get())
}

/// Totals for one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneratorSummary {
    /// Ticks that spawned a request task.
    pub scheduled: u64,
    /// Ticks skipped because the in-flight cap was reached.
    pub dropped: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Tasks still running when the drain deadline passed.
    pub abandoned: u64,
}

#[derive(Debug)]
pub struct Generator {
    rpm: Rpm,
    max_in_flight: u32,
    drain_timeout: Duration,
    client: Arc<dyn PipeClient>,
    successes: Arc<SuccessCounter>,
    failures: Arc<AtomicU64>,
}

impl Generator {
    /// How long a stopped generator waits for in-flight requests.
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(
        rpm: Rpm,
        max_in_flight: usize,
        client: Arc<dyn PipeClient>,
    ) -> Result<Self, GeneratorError> {
        let max_in_flight = u32::try_from(max_in_flight)
            .ok()
            .filter(|n| *n > 0 && (*n as usize) <= Semaphore::MAX_PERMITS)
            .ok_or(GeneratorError::InvalidCapacity(max_in_flight))?;

        Ok(Self {
            rpm,
            max_in_flight,
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            client,
            successes: Arc::new(SuccessCounter::new()),
            failures: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn successes(&self) -> Arc<SuccessCounter> {
        Arc::clone(&self.successes)
    }

    /// Run forever.
    pub async fn spin(self) -> GeneratorSummary {
        self.spin_until(std::future::pending::<()>()).await
    }

    /// Run until `stop` resolves, then wait up to the drain timeout for
    /// in-flight tasks. Tasks still running after that are left behind and
    /// counted as abandoned.
    pub async fn spin_until<F>(self, stop: F) -> GeneratorSummary
    where
        F: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight as usize));
        let mut ticker = time::interval(self.rpm.interval());
        let mut scheduled = 0_u64;
        let mut dropped = 0_u64;

        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;

                () = &mut stop => {
                    info!("stop requested, waiting for in-flight requests");
                    break;
                }
                _ = ticker.tick() => {
                    let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            dropped += 1;
                            warn!(
                                max_in_flight = self.max_in_flight,
                                dropped,
                                "in-flight limit reached, dropping tick"
                            );
                            continue;
                        }
                    };
                    scheduled += 1;

                    let client = Arc::clone(&self.client);
                    let successes = Arc::clone(&self.successes);
                    let failures = Arc::clone(&self.failures);
                    tokio::spawn(async move {
                        execute(client.as_ref(), &successes, &failures).await;
                        drop(permit);
                    });
                }
            }
        }

        // Holding every permit means no task is still running.
        let abandoned = match time::timeout(
            self.drain_timeout,
            semaphore.acquire_many(self.max_in_flight),
        )
        .await
        {
            Ok(_drained) => 0,
            Err(_) => {
                let outstanding =
                    u64::from(self.max_in_flight) - semaphore.available_permits() as u64;
                warn!(
                    outstanding,
                    drain_timeout = ?self.drain_timeout,
                    "in-flight requests did not finish in time, abandoning them"
                );
                outstanding
            }
        };

        GeneratorSummary {
            scheduled,
            dropped,
            succeeded: self.successes.get(),
            failed: self.failures.load(Ordering::Relaxed),
            abandoned,
        }
    }
}

async fn execute(client: &dyn PipeClient, successes: &SuccessCounter, failures: &AtomicU64) {
    match client.query().await {
        Ok(()) => {
            let total = successes.increment();
            debug!(total, "request succeeded");
            if is_milestone(total) {
                info!("{total} successful requests have been made.");
            }
        }
        Err(err) => {
            failures.fetch_add(1, Ordering::Relaxed);
            match &err {
                RequestError::Transport(source) => {
                    warn!(error = %source, "An error occurred while sending the request")
                }
                RequestError::Status { status } => warn!(%status, "HTTP error occurred"),
                RequestError::Unexpected(message) => {
                    error!(error = %message, "An unexpected error occurred")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;

    #[derive(Debug, Default)]
    struct AlwaysOk {
        calls: AtomicU64,
    }

    #[async_trait]
    impl PipeClient for AlwaysOk {
        async fn query(&self) -> Result<(), RequestError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct AlwaysStatus(StatusCode);

    #[async_trait]
    impl PipeClient for AlwaysStatus {
        async fn query(&self) -> Result<(), RequestError> {
            Err(RequestError::Status { status: self.0 })
        }
    }

    #[derive(Debug)]
    struct Slow(Duration);

    #[async_trait]
    impl PipeClient for Slow {
        async fn query(&self) -> Result<(), RequestError> {
            time::sleep(self.0).await;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Hung;

    #[async_trait]
    impl PipeClient for Hung {
        async fn query(&self) -> Result<(), RequestError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn rpm(n: i64) -> Rpm {
        Rpm::new(n).unwrap()
    }

    #[test]
    fn delay_is_sixty_over_rate() {
        for n in [1_i64, 7, 60, 100, 120, 333, 6000] {
            assert_eq!(delay_seconds(rpm(n)), 60.0 / n as f64);
        }
        assert_eq!(rpm(120).interval(), Duration::from_millis(500));
        assert_eq!(rpm(60).interval(), Duration::from_secs(1));
    }

    #[test]
    fn zero_and_negative_rates_are_rejected() {
        assert_eq!(Rpm::new(0), Err(GeneratorError::InvalidRate(0)));
        assert_eq!(Rpm::new(-5), Err(GeneratorError::InvalidRate(-5)));
        assert_eq!(
            Rpm::new(i64::from(u32::MAX) + 1),
            Err(GeneratorError::InvalidRate(i64::from(u32::MAX) + 1))
        );
        assert_eq!(rpm(i64::from(Rpm::DEFAULT)).get(), 100);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = Generator::new(rpm(60), 0, Arc::new(AlwaysOk::default())).unwrap_err();
        assert_eq!(err, GeneratorError::InvalidCapacity(0));
    }

    #[tokio::test(start_paused = true)]
    async fn one_simulated_second_at_120_rpm_schedules_two_requests() {
        let client = Arc::new(AlwaysOk::default());
        let generator = Generator::new(rpm(120), 1000, client.clone()).unwrap();

        let summary = generator
            .spin_until(time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(summary.scheduled, 2, "{summary:?}");
        assert_eq!(summary.succeeded, summary.scheduled);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.dropped, 0);
        assert_eq!(client.calls.load(Ordering::Relaxed), summary.scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_never_advance_the_success_counter() {
        let generator = Generator::new(
            rpm(600),
            1000,
            Arc::new(AlwaysStatus(StatusCode::INTERNAL_SERVER_ERROR)),
        )
        .unwrap();
        let successes = generator.successes();

        let summary = generator
            .spin_until(time::sleep(Duration::from_secs(1)))
            .await;

        assert!(summary.scheduled >= 9, "{summary:?}");
        assert_eq!(summary.failed, summary.scheduled);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(successes.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_do_not_delay_the_schedule() {
        let generator = Generator::new(rpm(600), 1000, Arc::new(Slow(Duration::from_secs(30))))
            .unwrap()
            .with_drain_timeout(Duration::from_secs(60));

        let summary = generator
            .spin_until(time::sleep(Duration::from_secs(1)))
            .await;

        // Ten ticks at 100ms apart, none of them waiting on the 30s responses.
        assert!((9..=11).contains(&summary.scheduled), "{summary:?}");
        assert_eq!(summary.dropped, 0);
        assert_eq!(summary.succeeded, summary.scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_beyond_the_in_flight_cap_are_dropped() {
        let generator = Generator::new(rpm(600), 2, Arc::new(Slow(Duration::from_secs(10))))
            .unwrap()
            .with_drain_timeout(Duration::from_secs(60));

        let summary = generator
            .spin_until(time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(summary.scheduled, 2);
        assert!((7..=9).contains(&summary.dropped), "{summary:?}");
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_requests_are_abandoned_after_drain_timeout() {
        let generator = Generator::new(rpm(600), 1000, Arc::new(Hung))
            .unwrap()
            .with_drain_timeout(Duration::from_secs(1));

        let start = time::Instant::now();
        let summary = time::timeout(
            Duration::from_secs(3),
            generator.spin_until(time::sleep(Duration::from_millis(50))),
        )
        .await
        .expect("stopped generator must return despite a hung request");

        assert_eq!(summary.scheduled, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.succeeded, 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
