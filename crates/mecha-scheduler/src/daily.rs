//! Daily timer — fires once per calendar day at `HH:MM` in a fixed zone.
//! Sleeps between fires; zero work while idle.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Compute the first instant strictly after `after` whose local time in `tz` is `at`.
///
/// A time skipped by a DST jump fires at the first valid minute after the gap;
/// a repeated time fires on its earlier occurrence.
pub fn next_fire_after(after: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let start_day = after.with_timezone(&tz).date_naive();

    for offset in 0..=2 {
        let Some(day) = start_day.checked_add_signed(Duration::days(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(tz, day, at)
            && candidate > after
        {
            return candidate;
        }
    }

    tracing::warn!("⚠️ Could not resolve next fire time for {at} in {tz}, retrying in 24h");
    after + Duration::days(1)
}

fn resolve_local(tz: Tz, day: NaiveDate, at: NaiveTime) -> Option<DateTime<Utc>> {
    let mut local = day.and_time(at);
    // DST gaps are at most a few hours; walk forward minute by minute.
    for _ in 0..(4 * 60) {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(t) => return Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earlier, _) => return Some(earlier.with_timezone(&Utc)),
            LocalResult::None => local += Duration::minutes(1),
        }
    }
    None
}

/// Process-wide daily timer. Idle until [`DailyScheduler::start`], then running for good.
pub struct DailyScheduler {
    at: NaiveTime,
    tz: Tz,
    running: AtomicBool,
}

impl DailyScheduler {
    pub fn new(at: NaiveTime, tz: Tz) -> Arc<Self> {
        Arc::new(Self {
            at,
            tz,
            running: AtomicBool::new(false),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Arm the timer. Each fire spawns `job` as its own task and re-arms
    /// immediately. Returns `None` if the timer is already running.
    pub fn start<F, Fut>(self: &Arc<Self>, job: F) -> Option<JoinHandle<()>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("⚠️ Daily scheduler already running, ignoring second start");
            return None;
        }

        let this = Arc::clone(self);
        tracing::info!("⏰ Daily scheduler started ({} {})", this.at.format("%H:%M"), this.tz);

        Some(tokio::spawn(async move {
            let mut last_fire: Option<DateTime<Utc>> = None;
            loop {
                // Never schedule at or before the previous target, even if the
                // wall clock lags the timer.
                let from = match last_fire {
                    Some(last) => last.max(Utc::now()),
                    None => Utc::now(),
                };
                let next = next_fire_after(from, this.at, this.tz);
                tracing::info!("⏳ Next broadcast at {}", next.with_timezone(&this.tz));

                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                tracing::info!("🔔 Daily broadcast triggered");
                tokio::spawn(job());
                last_fire = Some(next);
            }
        }))
    }
}
