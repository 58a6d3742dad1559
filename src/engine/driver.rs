use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::bins;
use crate::core::{Frame, Outlet, StageKind, ThumbnailTemplate};
use crate::observability::{ProgressCounters, ProgressReporter};
use crate::stages::StageContext;

/// Hands out one timestamp per sweep over the streams.
///
/// Timestamps follow the wall clock but are strictly increasing, so two
/// sweeps started within the same second still produce distinct record keys.
pub struct SweepClock {
    now: fn() -> i64,
    last: AtomicI64,
}

impl SweepClock {
    pub fn new() -> Self {
        Self::with_source(|| Utc::now().timestamp())
    }

    pub fn with_source(now: fn() -> i64) -> Self {
        Self {
            now,
            last: AtomicI64::new(0),
        }
    }

    pub fn next_sweep(&self) -> i64 {
        let now = (self.now)();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now - 1);
        now.max(prev + 1)
    }
}

impl Default for SweepClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces frames, writes their initial record and publishes them on the
/// frame port. The port closes when the driver is dropped.
pub struct FrameDriver {
    ctx: StageContext,
    frames: Outlet<Frame>,
    counters: Arc<ProgressCounters>,
    thumbnails: ThumbnailTemplate,
    stream_count: u32,
    event_id: i64,
    clock: SweepClock,
}

impl FrameDriver {
    pub fn new(
        ctx: StageContext,
        frames: Outlet<Frame>,
        counters: Arc<ProgressCounters>,
        thumbnails: ThumbnailTemplate,
        stream_count: u32,
        event_id: i64,
    ) -> Self {
        Self {
            ctx,
            frames,
            counters,
            thumbnails,
            stream_count,
            event_id,
            clock: SweepClock::new(),
        }
    }

    pub fn with_clock(mut self, clock: SweepClock) -> Self {
        self.clock = clock;
        self
    }

    /// Insert one frame and hand it downstream. The insert completes and is
    /// counted before the frame is published.
    pub async fn emit(&self, stream_index: u32, timestamp: i64) -> Result<()> {
        let frame = Frame::new(stream_index, timestamp, &self.thumbnails);

        self.ctx
            .write(
                &frame.record_key,
                bins! {
                    "key" => frame.record_key.clone(),
                    "streamId" => i64::from(stream_index),
                    "time" => timestamp,
                    "thumbnailUrl" => frame.thumbnail_url.clone(),
                    "eventId" => self.event_id,
                },
            )
            .await?;

        debug!(key = %frame.record_key, "frame inserted");
        self.counters.record(StageKind::Driver);

        self.frames.publish(frame).await?;
        Ok(())
    }

    /// `(stream_index, timestamp)` for each of the first `total` frames,
    /// cycling through the streams with a fresh timestamp per sweep.
    pub fn plan(&self, total: u64) -> Vec<(u32, i64)> {
        let mut plan = Vec::with_capacity(total as usize);
        let mut timestamp = 0;
        for n in 0..total {
            let stream_index = (n % u64::from(self.stream_count)) as u32;
            if stream_index == 0 {
                timestamp = self.clock.next_sweep();
            }
            plan.push((stream_index, timestamp));
        }
        plan
    }

    /// Emit `total` frames from a single loop.
    pub async fn run_sequential(self, total: u64) -> Result<u64> {
        for (stream_index, timestamp) in self.plan(total) {
            self.emit(stream_index, timestamp).await?;
        }

        info!(frames = total, "driver finished, closing frame port");
        Ok(total)
    }

    /// Emit `total` frames from one short-lived worker each, at most
    /// `concurrency` of them running at once when set.
    pub async fn run_pool(self, total: u64, concurrency: Option<usize>) -> Result<u64> {
        let plan = self.plan(total);
        let driver = Arc::new(self);
        let semaphore = concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let mut workers = JoinSet::new();
        for (stream_index, timestamp) in plan {
            let driver = driver.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(semaphore.acquire_owned().await?),
                    None => None,
                };
                driver.emit(stream_index, timestamp).await
            });
        }

        // Dropping the set on error aborts the remaining workers.
        while let Some(joined) = workers.join_next().await {
            joined??;
        }

        info!(frames = total, "driver pool finished, closing frame port");
        Ok(total)
    }

    /// Sweep every stream, pause, report, forever.
    pub async fn run_continuous(self, interval: Duration, reporter: ProgressReporter) -> Result<u64> {
        let mut sweeps = 0u64;
        loop {
            let timestamp = self.clock.next_sweep();
            for stream_index in 0..self.stream_count {
                self.emit(stream_index, timestamp).await?;
            }
            sweeps += 1;
            debug!(sweeps, timestamp, "sweep finished");

            tokio::time::sleep(interval).await;
            reporter.log_progress();
        }
    }
}
