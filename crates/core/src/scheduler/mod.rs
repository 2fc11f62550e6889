use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{capture::Liveness, ViewKind};

/// Per-view render loop bound to a capture's liveness flag.
#[derive(Debug, Clone)]
pub struct FrameTask {
    kind: ViewKind,
    liveness: Liveness,
    frames: u64,
}

impl FrameTask {
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Frames this task has drawn.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Cooperative driver that runs every live view task once per refresh.
///
/// Each task checks its liveness flag at the top of every iteration and is
/// dropped as soon as the flag clears, so no work outlives its source.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    tasks: Vec<FrameTask>,
    frame: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the loop for `kind`, replacing any loop it already had.
    pub fn spawn(&mut self, kind: ViewKind, liveness: Liveness) {
        self.tasks.retain(|task| task.kind != kind);
        info!(view = %kind, "frame task started");
        self.tasks.push(FrameTask {
            kind,
            liveness,
            frames: 0,
        });
    }

    pub fn is_running(&self, kind: ViewKind) -> bool {
        self.tasks
            .iter()
            .any(|task| task.kind == kind && task.liveness.is_alive())
    }

    pub fn tasks(&self) -> &[FrameTask] {
        &self.tasks
    }

    /// Refreshes processed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Runs one refresh: `draw` is called once for every live task, in spawn
    /// order. Returns how many tasks drew.
    pub fn tick(&mut self, mut draw: impl FnMut(ViewKind)) -> usize {
        self.frame += 1;
        let mut drawn = 0;
        self.tasks.retain_mut(|task| {
            if !task.liveness.is_alive() {
                info!(view = %task.kind, frames = task.frames, "frame task exited");
                return false;
            }
            draw(task.kind);
            task.frames += 1;
            drawn += 1;
            true
        });
        drawn
    }
}

/// Emulates the display refresh timer that drives the scheduler.
///
/// Refreshes whose deadline already passed are skipped and counted as
/// dropped; there is no catching up.
#[derive(Debug)]
pub struct RefreshPacer {
    interval: Duration,
    next: Instant,
    dropped: u64,
}

impl RefreshPacer {
    pub fn new(rate_hz: u32) -> Self {
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);
        Self {
            interval,
            next: Instant::now() + interval,
            dropped: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Blocks until the next refresh. Returns the refreshes dropped since the
    /// previous call.
    pub fn wait(&mut self) -> u64 {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
            return 0;
        }

        let behind = now - self.next;
        let missed = (behind.as_nanos() / self.interval.as_nanos().max(1)) as u64;
        self.next = now + self.interval;
        if missed > 0 {
            self.dropped += missed;
            debug!(missed, total = self.dropped, "refreshes dropped");
        }
        missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_every_live_task_in_spawn_order() {
        let liveness = Liveness::new();
        let mut scheduler = FrameScheduler::new();
        for kind in ViewKind::ALL {
            scheduler.spawn(kind, liveness.clone());
        }

        let mut seen = Vec::new();
        assert_eq!(scheduler.tick(|kind| seen.push(kind)), 3);
        assert_eq!(seen, ViewKind::ALL.to_vec());
        assert_eq!(scheduler.frame(), 1);
    }

    #[test]
    fn released_tasks_exit_before_drawing() {
        let liveness = Liveness::new();
        let mut scheduler = FrameScheduler::new();
        scheduler.spawn(ViewKind::Waveform, liveness.clone());
        scheduler.tick(|_| {});

        liveness.release();
        let mut calls = 0;
        assert_eq!(scheduler.tick(|_| calls += 1), 0);
        assert_eq!(calls, 0);
        assert!(scheduler.tasks().is_empty());
        assert!(!scheduler.is_running(ViewKind::Waveform));
    }

    #[test]
    fn respawning_replaces_the_existing_task() {
        let old = Liveness::new();
        let mut scheduler = FrameScheduler::new();
        scheduler.spawn(ViewKind::Spectrum, old.clone());
        scheduler.tick(|_| {});
        scheduler.spawn(ViewKind::Spectrum, Liveness::new());

        assert_eq!(scheduler.tasks().len(), 1);
        assert_eq!(scheduler.tasks()[0].frames(), 0);
        old.release();
        assert!(scheduler.is_running(ViewKind::Spectrum));
    }

    #[test]
    fn pacer_counts_missed_refreshes() {
        let mut pacer = RefreshPacer::new(1000);
        std::thread::sleep(Duration::from_millis(20));
        let missed = pacer.wait();
        assert!(missed >= 5);
        assert_eq!(pacer.dropped(), missed);
    }
}
