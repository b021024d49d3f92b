use dbt::contexts::{ApplyObserver, ApplyReport, SkipReason};
use std::path::Path;
use std::time::Instant;

pub struct ProgressIndicator {
    total: usize,
    completed: usize,
    failed: usize,
    dry_run: bool,
    start_time: Instant,
}

impl ProgressIndicator {
    pub fn new(total: usize, dry_run: bool) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            dry_run,
            start_time: Instant::now(),
        }
    }

    pub fn finish(&self, report: &ApplyReport) {
        let elapsed = self.start_time.elapsed();
        println!("\n{}", "=".repeat(60));
        println!("Summary:");
        println!("  Total:     {}", self.total);
        println!("  Succeeded: {}", self.completed);
        println!("  Failed:    {}", self.failed);
        println!("  Duration:  {:.2}s", elapsed.as_secs_f64());
        for (path, reason) in &report.skipped {
            println!("  ✗ {}: {}", path, reason);
        }
        println!("{}", "=".repeat(60));
    }
}

impl ApplyObserver for ProgressIndicator {
    fn item_started(&mut self, path: &str) {
        println!(
            "Processing: {} ({}/{})",
            path,
            self.completed + self.failed + 1,
            self.total
        );
    }

    fn item_finished(&mut self, path: &str, outcome: Result<&Path, &SkipReason>) {
        match outcome {
            Ok(written) => {
                self.completed += 1;
                if self.dry_run {
                    println!("⊚ Would write {}", written.display());
                } else {
                    println!("✓ Wrote {}", written.display());
                }
            }
            Err(reason) => {
                self.failed += 1;
                eprintln!("✗ Skipped {}: {}", path, reason);
            }
        }
    }
}
