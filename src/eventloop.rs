//! Single-threaded tick scheduler. Drives `Collector::tick` at a fixed
//! cadence and, outside headless mode, cooperates with a renderer via a
//! non-blocking poll between ticks.
//!
//! Uses a monotonic-clock deadline for the next tick rather than a fixed
//! sleep, so drift from slow ticks (a loaded host, a slow disk) does not
//! accumulate across the run.

use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::analysis::{AnalysisEngine, Thresholds};
use crate::collector::Collector;
use crate::procsource::ProcSource;
use crate::store::Store;
use crate::tui::Renderer;

pub struct EventLoop<'a> {
    collector: Collector<'a>,
    engine: AnalysisEngine,
    store: Store,
    interval: Duration,
    headless: bool,
    regression_pct_threshold: f64,
}

impl<'a> EventLoop<'a> {
    pub fn new(
        source: &'a dyn ProcSource,
        store: Store,
        pattern: impl Into<String>,
        self_pid: i32,
        interval: Duration,
        headless: bool,
    ) -> Self {
        Self {
            collector: Collector::new(source, pattern, self_pid),
            engine: AnalysisEngine::new(Thresholds::default()),
            store,
            interval,
            headless,
            regression_pct_threshold: crate::baseline::DEFAULT_CHANGE_PCT_THRESHOLD,
        }
    }

    /// Runs until `shutdown` reports true, checked once per tick boundary
    /// (ticks themselves are not interruptible).
    pub fn run(&mut self, mut renderer: Box<dyn Renderer>, shutdown: impl Fn() -> bool) {
        info!(headless = self.headless, "event loop starting");
        renderer.init();

        while !shutdown() {
            let deadline = Instant::now() + self.interval;
            self.run_one_tick();

            if self.headless {
                Self::sleep_until(deadline, &shutdown);
                continue;
            }

            // Non-blocking renderer cooperation: poll for input/redraw in
            // short slices until the next tick deadline.
            while Instant::now() < deadline && !shutdown() && !renderer.wants_quit() {
                renderer.poll(Duration::from_millis(100));
                renderer.draw(&self.store);
            }

            if renderer.wants_quit() {
                break;
            }
        }

        renderer.shutdown();
        info!("event loop stopped");
    }

    fn run_one_tick(&mut self) {
        let now = crate::util::current_unix_time();
        let result = self.collector.tick(&self.store, now);

        if !result.counts.committed && result.counts.agents_found > 0 {
            error!(tick_agents = result.counts.agents_found, "tick failed to commit");
        }

        let analysis = self.engine.process_tick(
            &result.samples,
            &result.statuses,
            &result.fd_counts,
            &result.conn_counts,
            now,
        );

        let writer = self.store.writer();
        if writer.begin().is_ok() {
            for alert in &analysis.alerts {
                let _ = writer.write_alert(alert);
            }
            let _ = writer.commit();
        }

        for fingerprint in &analysis.fingerprints_due {
            if let Err(e) = crate::collector::persist_fingerprint_and_regressions(
                &self.store,
                fingerprint,
                self.regression_pct_threshold,
                now,
            ) {
                error!(error = %e, pid = fingerprint.pid, "failed to persist fingerprint");
            }
        }

        if self.headless {
            println!(
                "tick: agents={} samples={} alerts={} committed={}",
                result.counts.agents_found,
                result.counts.samples_written,
                analysis.alerts.len(),
                result.counts.committed
            );
        }
    }

    fn sleep_until(deadline: Instant, shutdown: &impl Fn() -> bool) {
        while !shutdown() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(200)));
        }
    }
}
