//! Debounces block assembly until the mempool shows enough endorsements.
//!
//! The count the node wants is only learned from a preapply rejection, so
//! the first attempt is always admitted. A rejection cap keeps assembly
//! from stalling forever when the pool underreports.

use serde_json::Value;

use crate::classifier;

pub struct MempoolGate {
    required: u64,
    rejections: u32,
    max_rejections: u32,
}

impl MempoolGate {
    pub fn new(max_rejections: u32) -> Self {
        Self { required: 0, rejections: 0, max_rejections }
    }

    /// Arms the gate with the endorsement count a preapply rejection named.
    pub fn require(&mut self, n: u64) {
        self.required = n;
    }

    pub fn required(&self) -> u64 {
        self.required
    }

    /// Decides whether assembly may proceed against this `applied` list.
    /// Accepting resets the requirement; the cap forces acceptance after
    /// `max_rejections` refusals.
    pub fn admit(&mut self, applied: &[Value]) -> bool {
        if self.required == 0 {
            return true;
        }
        let visible = applied.iter().filter(|op| classifier::is_endorsement(op)).count() as u64;
        if visible >= self.required {
            self.required = 0;
            self.rejections = 0;
            return true;
        }
        if self.rejections >= self.max_rejections {
            log::warn!(
                "gate: only {} of {} endorsements visible after {} retries, proceeding anyway",
                visible,
                self.required,
                self.rejections
            );
            self.required = 0;
            self.rejections = 0;
            return true;
        }
        self.rejections += 1;
        log::debug!("gate: {} of {} endorsements visible, waiting", visible, self.required);
        false
    }
}
