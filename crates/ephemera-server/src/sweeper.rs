use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use ephemera_core::{RecordStore, SweepReport, sweep};

/// Background task that enforces self-destruct deadlines and time expiry
/// without waiting for anyone to open the message again.
pub async fn run_sweep_loop(store: Arc<dyn RecordStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let store = store.clone();
        match tokio::task::spawn_blocking(move || sweep(&*store, Utc::now())).await {
            Ok(Ok(SweepReport {
                destroyed,
                expired,
                failed,
            })) => {
                if destroyed > 0 || expired > 0 {
                    info!("Sweep: destroyed {} and expired {} messages", destroyed, expired);
                }
                if failed > 0 {
                    warn!("Sweep: {} overdue messages could not be processed", failed);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
