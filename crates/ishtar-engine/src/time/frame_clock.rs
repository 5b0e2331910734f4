use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Seconds elapsed since the clock was created.
    ///
    /// Drives time-parameterized animation (e.g. an orbiting light) the way
    /// the per-frame wall clock would.
    pub elapsed: f32,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// Delta time is clamped so that camera movement stays sane when the process
/// is paused by a debugger, minimized, or stalls between frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_max: Duration,
}

const DT_MAX_DEFAULT: Duration = Duration::from_millis(250);

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_max: DT_MAX_DEFAULT,
        }
    }

    /// Creates a clock with a custom upper delta-time clamp.
    pub fn with_dt_max(dt_max: Duration) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_max,
        }
    }

    /// Resets the delta baseline without touching the elapsed origin.
    ///
    /// Useful after surface reconfigure events or when resuming from
    /// suspension.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last).min(self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn dt_is_clamped_to_maximum() {
        let mut clock = FrameClock::with_dt_max(Duration::from_millis(5));
        sleep(Duration::from_millis(20));
        let ft = clock.tick();
        assert!(ft.dt <= 0.005 + f32::EPSILON);
    }

    #[test]
    fn frame_index_increments_per_tick() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick().frame_index, 0);
        assert_eq!(clock.tick().frame_index, 1);
        assert_eq!(clock.tick().frame_index, 2);
    }

    #[test]
    fn elapsed_is_monotonic() {
        let mut clock = FrameClock::new();
        let a = clock.tick().elapsed;
        sleep(Duration::from_millis(2));
        let b = clock.tick().elapsed;
        assert!(b >= a);
    }
}
