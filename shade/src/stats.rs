use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::warn;

/// Counters accumulated over one shading run.
#[derive(Debug, Default)]
pub struct ShadeStats {
    pub jar_count: usize,
    pub classes_remapped: u64,
    pub resources_merged: u64,
    pub resources_dropped: u64,
    pub relocations_applied: usize,
    relocations: BTreeMap<String, String>,
    warnings: Vec<String>,
    total_time: Duration,
    started: Option<Instant>,
}

impl ShadeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_jar(&mut self) {
        if self.started.is_some() {
            warn!("start_jar called while a jar is already being timed");
        }
        self.started = Some(Instant::now());
    }

    pub fn finish_jar(&mut self) {
        if let Some(started) = self.started.take() {
            self.total_time += started.elapsed();
            self.jar_count += 1;
        }
    }

    /// Records a configured source -> destination mapping for the summary.
    pub fn relocate(&mut self, from: &str, to: &str) {
        self.relocations.insert(from.to_string(), to.to_string());
    }

    pub fn relocations(&self) -> &BTreeMap<String, String> {
        &self.relocations
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn average_time_per_jar(&self) -> Duration {
        self.total_time / self.jar_count.max(1) as u32
    }
}

impl fmt::Display for ShadeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*******************")?;
        writeln!(f, "SHADE STATS")?;
        writeln!(f)?;
        writeln!(f, "Total jars: {}", self.jar_count)?;
        writeln!(f, "Total time: {:.3}s", self.total_time.as_secs_f64())?;
        writeln!(
            f,
            "Average time/jar: {:.3}s",
            self.average_time_per_jar().as_secs_f64()
        )?;
        writeln!(f, "Classes remapped: {}", self.classes_remapped)?;
        writeln!(f, "Relocations applied: {}", self.relocations_applied)?;
        writeln!(
            f,
            "Resources merged: {}, dropped: {}",
            self.resources_merged, self.resources_dropped
        )?;
        for (from, to) in &self.relocations {
            writeln!(f, "  {from} -> {to}")?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings: {}", self.warnings.len())?;
        }
        write!(f, "*******************")
    }
}
