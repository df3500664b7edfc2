use std::collections::BTreeSet;

use crate::error::{ReportError, ReportResult};

/// Ordered set of absolute step numbers at which a report must fire.
///
/// The driver's step counter is one-based: when `current_step == 1` the
/// engine has just finished its first step. Frame indices supplied by users
/// follow the same convention, so `from_one_based` shifts each entry down by
/// one before storing it. Membership is checked by exact equality against
/// the current step, never by range containment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameIndexSet {
    steps: BTreeSet<u64>,
}

impl FrameIndexSet {
    /// Convert one-based frame indices into the zero-adjusted form used for
    /// step comparison. An entry of `[1, 100]` stores the first frame and
    /// frame 100. Zero is not a valid one-based index.
    pub fn from_one_based(indices: &[u64]) -> ReportResult<Self> {
        let mut steps = BTreeSet::new();
        for &idx in indices {
            if idx == 0 {
                return Err(ReportError::Invalid(
                    "frame indices are one-based; 0 is not a valid frame index".into(),
                ));
            }
            steps.insert(idx - 1);
        }
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn contains(&self, step: u64) -> bool {
        self.steps.contains(&step)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.steps.iter().copied()
    }
}

/// When the next report fires, relative to the step count the driver passed
/// in. Replaces the `-1` "no report" sentinel some reporter stacks use: a
/// driver polling `steps_until` gets `None` instead of a bogus step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextReport {
    /// Report on the very next step.
    Immediate,
    /// Report after this many steps, always >= 1.
    After(u64),
    /// This reporter will not fire at the current step.
    Never,
}

impl NextReport {
    pub fn steps_until(self) -> Option<u64> {
        match self {
            NextReport::Immediate => Some(1),
            NextReport::After(n) => Some(n),
            NextReport::Never => None,
        }
    }
}

/// Report cadence: either a forced set of exact frame indices, or a fixed
/// interval in steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTiming {
    Frames(FrameIndexSet),
    Interval(u64),
}

impl ReportTiming {
    /// Forced frame indices win over a fixed interval when both are given;
    /// an empty index set falls back to the interval.
    pub fn from_options(interval: u64, frame_indices: &[u64]) -> ReportResult<Self> {
        if !frame_indices.is_empty() {
            let set = FrameIndexSet::from_one_based(frame_indices)?;
            return Ok(ReportTiming::Frames(set));
        }
        if interval == 0 {
            return Err(ReportError::Invalid(
                "report interval must be at least 1 step".into(),
            ));
        }
        Ok(ReportTiming::Interval(interval))
    }

    pub fn next_report(&self, current_step: u64) -> NextReport {
        match self {
            ReportTiming::Frames(set) => {
                if set.contains(current_step) {
                    NextReport::Immediate
                } else {
                    NextReport::Never
                }
            }
            ReportTiming::Interval(interval) => {
                let steps_left = current_step % interval;
                NextReport::After(interval - steps_left)
            }
        }
    }
}

/// Which pieces of engine state a reporter needs fetched for it. Fixed at
/// construction per reporter instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateRequirements {
    pub positions: bool,
    pub velocities: bool,
    pub forces: bool,
    pub energy: bool,
}

/// Produced each polling tick: when the next report fires and what state the
/// engine should hand over when it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub next: NextReport,
    pub wants: StateRequirements,
}
