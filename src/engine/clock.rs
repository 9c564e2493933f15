// Countdown clock for an in-progress ride.

/// One-shot signals raised by [`CountdownClock::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSignal {
    /// Remaining time dropped to the warning threshold.
    EndingSoon,
    /// Remaining time reached zero.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub remaining_seconds: u64,
    pub signal: Option<ClockSignal>,
}

/// Seconds left on a rental.
///
/// The clock does not know about rental states; the caller passes `running`
/// so time only moves while the rider is actually riding. Reaching zero never
/// stops the ride, it only raises [`ClockSignal::Expired`] once.
#[derive(Debug, Clone)]
pub struct CountdownClock {
    allotted: u64,
    remaining: u64,
    warning_threshold: u64,
    warned: bool,
    expired: bool,
}

impl CountdownClock {
    pub fn new(allotted: u64, warning_threshold: u64) -> Self {
        Self {
            allotted,
            remaining: allotted,
            warning_threshold,
            // Allotments at or under the threshold never warn.
            warned: allotted <= warning_threshold,
            expired: false,
        }
    }

    /// Advance one second if `running`; otherwise a no-op.
    pub fn tick(&mut self, running: bool) -> TickOutcome {
        if !running || self.remaining == 0 {
            return TickOutcome {
                remaining_seconds: self.remaining,
                signal: None,
            };
        }

        self.remaining -= 1;

        let signal = if self.remaining == 0 && !self.expired {
            self.expired = true;
            Some(ClockSignal::Expired)
        } else if self.remaining <= self.warning_threshold && !self.warned {
            self.warned = true;
            Some(ClockSignal::EndingSoon)
        } else {
            None
        };

        TickOutcome {
            remaining_seconds: self.remaining,
            signal,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn allotted(&self) -> u64 {
        self.allotted
    }

    /// Seconds consumed so far.
    pub fn elapsed(&self) -> u64 {
        self.allotted - self.remaining
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }
}
