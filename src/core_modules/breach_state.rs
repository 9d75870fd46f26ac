// THEORY:
// The `BreachStateMachine` is the debounce layer between noisy per-frame verdicts and
// the single boolean the operator sees. It keeps a counter that climbs by one on a
// positive verdict and falls by one on a negative verdict, clamped to
// `[0, required_frames]`.
//
// States:
// - `Clear`:        counter == 0, not breached.
// - `Accumulating`: 0 < counter < required_frames, not breached.
// - `Breached`:     the counter reached required_frames and has not since fallen
//                   back to 0. The counter may dip below the top while breached;
//                   the alarm latches until the counter fully decays.
//
// An intrusion must persist for `required_frames` positive verdicts to raise the
// alarm, and the alarm clears itself only after the counter decays back to 0.

/// The externally visible phase of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachPhase {
    Clear,
    Accumulating,
    Breached,
}

/// A change of the breach state produced by a single update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachTransition {
    Started,
    Cleared,
}

#[derive(Debug, Clone)]
pub struct BreachStateMachine {
    required_frames: u32,
    counter: u32,
    breached: bool,
}

impl BreachStateMachine {
    pub fn new(required_frames: u32) -> Self {
        Self {
            required_frames: required_frames.max(1),
            counter: 0,
            breached: false,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn required_frames(&self) -> u32 {
        self.required_frames
    }

    pub fn is_breached(&self) -> bool {
        self.breached
    }

    pub fn phase(&self) -> BreachPhase {
        if self.breached {
            BreachPhase::Breached
        } else if self.counter == 0 {
            BreachPhase::Clear
        } else {
            BreachPhase::Accumulating
        }
    }

    /// Applies one frame's verdict. Returns the edge, if the breach state flipped.
    pub fn update(&mut self, verdict: bool) -> Option<BreachTransition> {
        let was_breached = self.breached;

        if verdict {
            self.counter = (self.counter + 1).min(self.required_frames);
            if self.counter == self.required_frames {
                self.breached = true;
            }
        } else {
            self.counter = self.counter.saturating_sub(1);
            if self.counter == 0 {
                self.breached = false;
            }
        }

        match (was_breached, self.breached) {
            (false, true) => Some(BreachTransition::Started),
            (true, false) => Some(BreachTransition::Cleared),
            _ => None,
        }
    }

    /// Forces the machine back to `Clear`, whatever its current state.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.breached = false;
    }
}
