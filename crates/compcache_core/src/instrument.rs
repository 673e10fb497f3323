//! Byte-count instrumentation for encoder and decoder passes.
//!
//! Every logical unit (a type reference, a string, a value...) is wrapped in a
//! `start`/`stop` pair. Nested units are counted inclusively, so the bytes of a
//! type reference include those of its assembly name.

use std::cell::RefCell;
use std::collections::HashMap;

/// Receives unit boundaries from a context.
///
/// Both methods default to no-ops. Implementations must not touch the stream.
pub trait Instrumentation {
    #[allow(unused_variables)]
    fn start(&self, unit: &'static str) {}

    #[allow(unused_variables)]
    fn stop(&self, unit: &'static str, bytes: u64) {}
}

/// Discards all samples
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {}

/// Aggregated samples for one unit name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    /// Number of times the unit was written or read
    pub count: u64,
    /// Total bytes across all occurrences
    pub bytes: u64,
}

/// Sums up bytes per unit name.
#[derive(Debug, Default)]
pub struct ByteCounter {
    units: RefCell<HashMap<&'static str, UnitStats>>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for one unit, if it was ever seen
    pub fn get(&self, unit: &str) -> Option<UnitStats> {
        self.units.borrow().get(unit).copied()
    }

    /// All units, largest total first
    pub fn report(&self) -> Vec<(&'static str, UnitStats)> {
        let mut report = self
            .units
            .borrow()
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect::<Vec<_>>();
        report.sort_by(|a, b| b.1.bytes.cmp(&a.1.bytes).then(a.0.cmp(b.0)));

        report
    }

    /// Write the report to the debug log
    pub fn log_report(&self) {
        for (unit, stats) in self.report() {
            log::debug!(
                "{:<24} {:>8} occurrences {:>10} bytes",
                unit,
                stats.count,
                stats.bytes
            );
        }
    }

    pub fn clear(&self) {
        self.units.borrow_mut().clear();
    }
}

impl Instrumentation for ByteCounter {
    fn stop(&self, unit: &'static str, bytes: u64) {
        let mut units = self.units.borrow_mut();
        let stats = units.entry(unit).or_default();
        stats.count += 1;
        stats.bytes += bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_aggregates() {
        let counter = ByteCounter::new();
        counter.start("TypeRef");
        counter.stop("TypeRef", 10);
        counter.stop("TypeRef", 2);
        counter.stop("String", 30);

        assert_eq!(
            counter.get("TypeRef"),
            Some(UnitStats {
                count: 2,
                bytes: 12
            })
        );
        assert_eq!(counter.report()[0].0, "String");

        counter.clear();
        assert!(counter.report().is_empty());
    }
}
