//! Phase timings for a pack attempt

use std::time::{Duration, Instant};

/// Phase timings recorded by the packer
#[derive(Debug, Clone)]
pub struct PackMetrics {
    /// When measurement started
    start: Instant,
    /// Remote fetch or input decoding completed
    pub acquire: Option<Duration>,
    /// Archive or directory extraction completed
    pub extract: Option<Duration>,
    /// Project classification completed
    pub classify: Option<Duration>,
    /// Synthesis and optimization completed
    pub synthesize: Option<Duration>,
    /// Deploy call completed
    pub deploy: Option<Duration>,
    /// Whole attempt completed
    pub total: Option<Duration>,
    /// Individual phase durations
    phases: Vec<(String, Duration)>,
}

impl Default for PackMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PackMetrics {
    /// Start measuring
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            acquire: None,
            extract: None,
            classify: None,
            synthesize: None,
            deploy: None,
            total: None,
            phases: Vec::new(),
        }
    }

    pub fn mark_acquire(&mut self) {
        self.acquire = Some(self.start.elapsed());
    }

    pub fn mark_extract(&mut self) {
        self.extract = Some(self.start.elapsed());
    }

    pub fn mark_classify(&mut self) {
        self.classify = Some(self.start.elapsed());
    }

    pub fn mark_synthesize(&mut self) {
        self.synthesize = Some(self.start.elapsed());
    }

    pub fn mark_deploy(&mut self) {
        self.deploy = Some(self.start.elapsed());
    }

    pub fn mark_total(&mut self) {
        self.total = Some(self.start.elapsed());
    }

    /// Time a closure and record it as a phase
    pub fn time_phase<F, R>(&mut self, name: impl Into<String>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let phase_start = Instant::now();
        let result = f();
        self.phases.push((name.into(), phase_start.elapsed()));
        result
    }

    /// Recorded phases in order
    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    /// Time since measurement started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn format_duration(d: Duration) -> String {
        let ms = d.as_secs_f64() * 1000.0;
        if ms < 1.0 {
            format!("{}µs", d.as_micros())
        } else if ms < 1000.0 {
            format!("{:.2}ms", ms)
        } else {
            format!("{:.2}s", d.as_secs_f64())
        }
    }

    /// One-line-per-phase report of the marks that were set
    pub fn summary(&self) -> String {
        let marks = [
            ("Acquire", self.acquire),
            ("Extract", self.extract),
            ("Classify", self.classify),
            ("Synthesize", self.synthesize),
            ("Deploy", self.deploy),
        ];

        let mut lines = vec!["=== Pack Timings ===".to_string()];
        let mut prev = Duration::ZERO;
        for (name, mark) in marks {
            if let Some(at) = mark {
                lines.push(format!(
                    "  {:<12} {:>10} (+{})",
                    name,
                    Self::format_duration(at),
                    Self::format_duration(at.saturating_sub(prev))
                ));
                prev = at;
            }
        }

        if !self.phases.is_empty() {
            lines.push("--- Phases ---".to_string());
            for (name, duration) in &self.phases {
                lines.push(format!("  {:<12} {:>10}", name, Self::format_duration(*duration)));
            }
        }

        let total = self.total.unwrap_or_else(|| self.elapsed());
        lines.push(format!("  {:<12} {:>10}", "Total", Self::format_duration(total)));
        lines.join("\n")
    }

    /// Log the summary through tracing
    pub fn log_summary(&self) {
        for line in self.summary().lines() {
            tracing::debug!(target: "singlefile_pack::metrics", "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_are_monotonic() {
        let mut metrics = PackMetrics::new();
        metrics.mark_acquire();
        metrics.mark_extract();
        metrics.mark_total();
        assert!(metrics.acquire.unwrap() <= metrics.extract.unwrap());
        assert!(metrics.extract.unwrap() <= metrics.total.unwrap());
        assert!(metrics.deploy.is_none());
    }

    #[test]
    fn test_summary_lists_set_marks() {
        let mut metrics = PackMetrics::new();
        let value = metrics.time_phase("decode", || 7);
        assert_eq!(value, 7);
        metrics.mark_synthesize();

        let summary = metrics.summary();
        assert!(summary.contains("Synthesize"));
        assert!(summary.contains("decode"));
        assert!(summary.contains("Total"));
        assert!(!summary.contains("Deploy"));
    }
}
