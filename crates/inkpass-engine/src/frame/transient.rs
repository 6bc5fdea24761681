use std::time::{Duration, Instant};

use winit::window::CursorIcon;

/// Clock driving per-frame animations (marching ants, handle pulses, ...).
///
/// Delta time is clamped so a stalled or paused host does not make
/// animations jump.
#[derive(Debug, Clone)]
pub struct AnimationTimers {
    start: Instant,
    last: Instant,
    dt: Duration,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl AnimationTimers {
    pub fn new(now: Instant) -> Self {
        Self::with_clamps(now, Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(now: Instant, dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            start: now,
            last: now,
            dt: Duration::ZERO,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Moves the clock to `now` and returns the clamped delta in seconds.
    pub fn advance_to(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last).clamp(self.dt_min, self.dt_max);
        self.last = now;
        self.dt = dt;
        self.frame_index = self.frame_index.wrapping_add(1);
        dt.as_secs_f32()
    }

    /// Clamped delta of the last advance, in seconds.
    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt.as_secs_f32()
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.last.saturating_duration_since(self.start)
    }

    /// Position within a repeating cycle of `period`, in `[0, 1)`.
    pub fn phase(&self, period: Duration) -> f32 {
        if period.is_zero() {
            return 0.0;
        }
        let p = self.elapsed().as_secs_f64() % period.as_secs_f64();
        (p / period.as_secs_f64()) as f32
    }
}

/// A cursor shape requested by something drawn this frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CursorHint {
    pub icon: CursorIcon,
    pub priority: i32,
}

/// State that lives for one frame and is reset between frames.
#[derive(Debug, Clone)]
pub struct TransientState {
    timers: AnimationTimers,
    cursor_hints: Vec<CursorHint>,
}

impl TransientState {
    pub fn new(now: Instant) -> Self {
        Self { timers: AnimationTimers::new(now), cursor_hints: Vec::new() }
    }

    #[inline]
    pub fn timers(&self) -> &AnimationTimers {
        &self.timers
    }

    /// Queues a cursor request; the host resolves it once per frame.
    pub fn push_cursor_hint(&mut self, icon: CursorIcon, priority: i32) {
        self.cursor_hints.push(CursorHint { icon, priority });
    }

    #[inline]
    pub fn pending_cursor_hints(&self) -> &[CursorHint] {
        &self.cursor_hints
    }

    /// Removes every queued hint and returns the winning one.
    ///
    /// Highest priority wins; on a tie the later request wins.
    pub fn take_cursor_hint(&mut self) -> Option<CursorIcon> {
        let winner = self.cursor_hints.iter().max_by_key(|h| h.priority).map(|h| h.icon);
        self.cursor_hints.clear();
        winner
    }

    /// Drops unresolved cursor hints and advances the animation clock to `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.cursor_hints.clear();
        self.timers.advance_to(now);
    }
}

impl Default for TransientState {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}
