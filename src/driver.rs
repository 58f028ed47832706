// Polling loop that runs a reconciliation pass per table definition

use std::sync::Arc;
use tokio::task;
use tokio::time::{sleep, Duration};

use crate::config::TableDefinition;
use crate::kernel::KernelTables;
use crate::sync::run_pass;

/// Totals for one polling cycle over every table definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub passes: usize,
    pub skipped: usize,
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Run one pass per definition, in order. A failed scan skips that
/// definition only; it is retried on the next cycle.
pub fn run_cycle(kernel: &dyn KernelTables, tables: &[TableDefinition]) -> CycleSummary {
    let mut summary = CycleSummary::default();

    for table in tables {
        match run_pass(kernel, table) {
            Ok(report) => {
                summary.passes += 1;
                summary.added += report.added;
                summary.removed += report.removed;
                summary.failed += report.failed;

                if report.is_converged() {
                    tracing::debug!("Table '{}' already in sync", table.name);
                } else {
                    tracing::info!(
                        "Table '{}': added {}, removed {}, failed {}",
                        table.name,
                        report.added,
                        report.removed,
                        report.failed
                    );
                }
            }
            Err(e) => {
                summary.skipped += 1;
                tracing::error!("Skipping table '{}' this cycle: {}", table.name, e);
            }
        }
    }

    summary
}

pub struct Driver {
    kernel: Arc<dyn KernelTables>,
    tables: Arc<Vec<TableDefinition>>,
    sleep_time: Duration,
}

impl Driver {
    pub fn new(
        kernel: Arc<dyn KernelTables>,
        tables: Vec<TableDefinition>,
        sleep_time: Duration,
    ) -> Self {
        Driver {
            kernel,
            tables: Arc::new(tables),
            sleep_time,
        }
    }

    /// Run cycles until Ctrl-C, or a single cycle when `once` is set
    pub async fn run(&self, once: bool) -> anyhow::Result<()> {
        loop {
            let kernel = self.kernel.clone();
            let tables = self.tables.clone();

            // Kernel access spawns `ip`, keep it off the async workers
            let summary = task::spawn_blocking(move || run_cycle(kernel.as_ref(), &tables)).await?;
            tracing::debug!(
                "Cycle finished: {} passes, {} skipped, {} added, {} removed, {} failed",
                summary.passes,
                summary.skipped,
                summary.added,
                summary.removed,
                summary.failed
            );

            if once {
                return Ok(());
            }

            tokio::select! {
                _ = sleep(self.sleep_time) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received interrupt, shutting down");
                    return Ok(());
                }
            }
        }
    }
}
