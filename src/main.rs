//! Loopway demo binary
//!
//! Runs the counter workflow once: `increment` repeats until its value reaches
//! 10, then `final` reports completion.

use loopway::{config::Config, demo::run_demo};

/// Application entry point
///
/// Configuration comes from the environment:
/// - LOOPWAY_MAX_ITERATIONS: optional loop guard
/// - LOOPWAY_VALIDATE_OUTPUTS: step output validation (default on)
/// - LOOPWAY_RECORD_HISTORY: per-execution history (default on)
/// - LOOPWAY_LOG: tracing filter (default "info")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::default();

    let result = run_demo(config).await?;
    if let Some(err) = result.error {
        return Err(err.into());
    }

    Ok(())
}
