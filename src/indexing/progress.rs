//! Progress reporting for index builds

use std::time::{Duration, Instant};

/// Statistics collected during a build
#[derive(Debug, Default)]
pub struct BuildStats {
    /// Number of catalog items embedded and indexed
    pub items_indexed: usize,

    /// Number of `embed_batch` calls
    pub batches: usize,

    /// Time elapsed during the build, including the save
    pub elapsed: Duration,

    /// Start time of the build
    start_time: Option<Instant>,
}

impl BuildStats {
    /// Create new stats and start timing
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Stop timing and record elapsed time
    pub fn stop_timing(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed = start.elapsed();
            self.start_time = None;
        }
    }

    /// Items per second, or `None` before anything was timed
    pub fn items_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (self.items_indexed > 0 && secs > 0.0).then(|| self.items_indexed as f64 / secs)
    }

    /// Display the statistics in a human-readable format
    pub fn display(&self) {
        println!("\nBuild Complete:");
        println!("  Items indexed: {}", self.items_indexed);
        println!("  Batches: {}", self.batches);
        println!("  Time elapsed: {:.2}s", self.elapsed.as_secs_f64());

        if let Some(rate) = self.items_per_second() {
            println!("  Performance: {rate:.0} items/second");
        }
    }
}
