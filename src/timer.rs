/**
 * The exam countdown.
 *
 * The countdown does not own a thread or a callback: whoever owns it advances it one
 * second at a time and stops it when the session ends. A stopped countdown ignores
 * further ticks, so a late tick after completion or cancellation can never fire twice.
 */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
    running: bool,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The countdown was not running.
    Ignored,
    Running,
    /// This tick took the countdown to zero. Returned exactly once.
    Expired,
}

impl Countdown {
    /// Start a countdown of `seconds`.
    pub fn start(seconds: u64) -> Self {
        Countdown { remaining: seconds, running: true }
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
            Tick::Expired
        } else {
            Tick::Running
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// The remaining time as `M:SS`.
    pub fn display(&self) -> String {
        format_clock(self.remaining)
    }
}

/// Format a number of seconds as `M:SS`.
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
