//! Lightweight in-process metrics (SPEC_FULL §2, ambient supplement #11):
//! counters for messages relayed each direction, HS/Sim API errors, and
//! active bridges, exposed as Prometheus text. Grounded on the teacher
//! crate's `metrics::Metrics` (a `Lazy`-held global holding atomic
//! counters), trimmed from its generic labeled Counter/Gauge types to the
//! handful of named series this bridge actually emits.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

pub static METRICS: Lazy<Metrics> = Lazy::new(Metrics::default);

#[derive(Default)]
pub struct Metrics {
    pub sim_to_hs_relayed: AtomicU64,
    pub hs_to_sim_relayed: AtomicU64,
    pub hs_api_errors: AtomicU64,
    pub sim_api_errors: AtomicU64,
    pub bridges_enabled: AtomicU64,
    pub resync_runs: AtomicU64,
}

impl Metrics {
    pub fn inc_sim_to_hs(&self) {
        self.sim_to_hs_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hs_to_sim(&self) {
        self.hs_to_sim_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_hs_api_error(&self) {
        self.hs_api_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sim_api_error(&self) {
        self.sim_api_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bridges_enabled(&self) {
        self.bridges_enabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resync_runs(&self) {
        self.resync_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Renders the Prometheus exposition text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let line = |out: &mut String, name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!("{name} {value}\n"));
        };
        line(
            &mut out,
            "lighthouse_bridge_sim_to_hs_relayed_total",
            "Messages relayed from Sim to the homeserver.",
            self.sim_to_hs_relayed.load(Ordering::Relaxed),
        );
        line(
            &mut out,
            "lighthouse_bridge_hs_to_sim_relayed_total",
            "Messages relayed from the homeserver to Sim.",
            self.hs_to_sim_relayed.load(Ordering::Relaxed),
        );
        line(
            &mut out,
            "lighthouse_bridge_hs_api_errors_total",
            "Non-2xx responses from the homeserver API.",
            self.hs_api_errors.load(Ordering::Relaxed),
        );
        line(
            &mut out,
            "lighthouse_bridge_sim_api_errors_total",
            "Non-2xx responses from the Sim injection endpoint.",
            self.sim_api_errors.load(Ordering::Relaxed),
        );
        line(
            &mut out,
            "lighthouse_bridge_bridges_enabled_total",
            "Cumulative count of enable_bridge calls that succeeded.",
            self.bridges_enabled.load(Ordering::Relaxed),
        );
        line(
            &mut out,
            "lighthouse_bridge_resync_runs_total",
            "Cumulative count of resync_group calls that completed.",
            self.resync_runs.load(Ordering::Relaxed),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_all_series() {
        let m = Metrics::default();
        m.inc_sim_to_hs();
        m.inc_hs_api_error();
        let text = m.render();
        assert!(text.contains("lighthouse_bridge_sim_to_hs_relayed_total 1"));
        assert!(text.contains("lighthouse_bridge_hs_api_errors_total 1"));
        assert!(text.contains("lighthouse_bridge_hs_to_sim_relayed_total 0"));
    }
}
