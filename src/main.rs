//! LBDrain service entry point.
//!
//! Loads configuration, serves the health endpoint and drains on SIGTERM.

use lbdrain::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await
}
