//! Clock registry (§4.4).

use crate::diag::Sink;
use indexmap::IndexMap;

pub const DEFAULT_NAME: &str = "clk";
pub const DEFAULT_WIRE: &str = "i_clk";
pub const DEFAULT_PERIOD_PS: i64 = 10_000;

/// A single clock domain. `period_ps` models the source's "unknown"
/// sentinel as `None` rather than a magic integer — the spec's tagged
/// values are better expressed as `Option` in a systems language with a
/// real sum type (§9's own design note, generalized here).
#[derive(Debug, Clone)]
pub struct Clock {
    pub name: String,
    pub wire: String,
    pub top: Option<String>,
    pub class: Option<String>,
    pub period_ps: Option<i64>,
}

impl Clock {
    pub fn frequency_hz(&self) -> Option<i64> {
        self.period_ps.filter(|p| *p > 0).map(|p| 1_000_000_000_000 / p)
    }
}

#[derive(Debug, Default)]
pub struct ClockRegistry {
    clocks: IndexMap<String, Clock>,
}

impl ClockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-declares) a clock. Re-declarations must agree on
    /// wire and frequency; a mismatch is reported but the first
    /// declaration's values are kept (processing continues, per §4.4).
    pub fn declare(
        &mut self,
        name: &str,
        wire: Option<&str>,
        period_ps: Option<i64>,
        freq_hz: Option<i64>,
        top: Option<&str>,
        class: Option<&str>,
        sink: &mut Sink,
    ) -> &Clock {
        let resolved_period = period_ps.or_else(|| freq_hz.filter(|f| *f > 0).map(|f| 1_000_000_000_000 / f));
        if let Some(existing) = self.clocks.get(name) {
            let wire_conflict = wire.is_some_and(|w| w != existing.wire);
            let period_conflict = resolved_period.is_some() && resolved_period != existing.period_ps;
            if wire_conflict || period_conflict {
                sink.error("clock", Some(name.to_string()), "duplicate clock declaration disagrees with a prior one");
            }
        } else {
            self.clocks.insert(
                name.to_string(),
                Clock {
                    name: name.to_string(),
                    wire: wire.unwrap_or(DEFAULT_WIRE).to_string(),
                    top: top.map(str::to_string),
                    class: class.map(str::to_string),
                    period_ps: resolved_period,
                },
            );
        }
        self.clocks.get(name).expect("just inserted or already present")
    }

    /// Synthesizes the default `clk`/`i_clk` clock if nothing declared one,
    /// per §4.4, running at `default_period_ps` (the caller's
    /// `PipelineOptions::default_clock_period_ps`).
    pub fn finalize(&mut self, default_period_ps: i64) {
        if !self.clocks.contains_key(DEFAULT_NAME) {
            self.clocks.insert(
                DEFAULT_NAME.to_string(),
                Clock {
                    name: DEFAULT_NAME.to_string(),
                    wire: DEFAULT_WIRE.to_string(),
                    top: None,
                    class: None,
                    period_ps: Some(default_period_ps),
                },
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&Clock> {
        self.clocks.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &Clock> {
        self.clocks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clock_synthesized_when_absent() {
        let mut reg = ClockRegistry::new();
        reg.finalize(DEFAULT_PERIOD_PS);
        let clk = reg.get(DEFAULT_NAME).unwrap();
        assert_eq!(clk.wire, DEFAULT_WIRE);
        assert_eq!(clk.period_ps, Some(DEFAULT_PERIOD_PS));
    }

    #[test]
    fn frequency_derives_from_period() {
        let mut reg = ClockRegistry::new();
        let mut sink = Sink::new();
        reg.declare("sysclk", Some("i_sysclk"), Some(10_000), None, None, None, &mut sink);
        let clk = reg.get("sysclk").unwrap();
        assert_eq!(clk.frequency_hz(), Some(100_000_000));
    }

    #[test]
    fn conflicting_redeclaration_is_reported_not_fatal() {
        let mut reg = ClockRegistry::new();
        let mut sink = Sink::new();
        reg.declare("c", Some("i_c"), Some(10_000), None, None, None, &mut sink);
        reg.declare("c", Some("i_other"), Some(10_000), None, None, None, &mut sink);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(reg.get("c").unwrap().wire, "i_c");
    }
}
