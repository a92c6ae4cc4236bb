/*============================================================
  Project: nuget-mirror
  Module: nuget_mirror::throttle
  ------------------------------------------------------------
  Purpose:
    Bound how many large artifacts a single package collects
    during one run.

  Security / Safety Notes:
    Pure state machine; the caller supplies on-disk sizes.

  Dependencies:
    None beyond std.

  Operational Scope:
    One instance per package, consulted before every version
    download. It reads folder state after prior downloads, so
    it lags by one download.

  Revision History:
    2026-10-16 NMR  Authored oversize throttle.
  ------------------------------------------------------------
  Principles Observed:
    - Skips are control flow, not errors
    - Fresh state for every package
============================================================*/

/// Outcome of consulting the throttle before a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Proceed,
    Skip,
}

/// Per-package oversize throttle.
#[derive(Debug, Clone)]
pub struct SizeThrottle {
    threshold_bytes: u64,
    cap: u32,
    triggered: bool,
    oversize_count: u32,
}

impl SizeThrottle {
    pub fn new(threshold_bytes: u64, cap: u32) -> Self {
        Self {
            threshold_bytes,
            cap,
            triggered: false,
            oversize_count: 0,
        }
    }

    /// Decide whether the next version may be fetched, given the largest
    /// file currently in the package folder.
    pub fn admit(&mut self, largest_on_disk: u64) -> ThrottleDecision {
        if self.is_tripped() {
            return ThrottleDecision::Skip;
        }
        if largest_on_disk > self.threshold_bytes {
            self.triggered = true;
            self.oversize_count += 1;
        }
        if self.is_tripped() {
            ThrottleDecision::Skip
        } else {
            ThrottleDecision::Proceed
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.triggered && self.oversize_count >= self.cap
    }

    pub fn oversize_count(&self) -> u32 {
        self.oversize_count
    }
}
