//! Health command - Check the backend is reachable.

use anyhow::{Context, Result};

use super::CommandContext;

pub async fn execute(ctx: CommandContext) -> Result<()> {
    let backend = ctx.backend()?;

    let health = backend
        .health()
        .await
        .context("Backend unavailable")?;

    if !health.is_healthy() {
        anyhow::bail!("Backend unavailable: reported status '{}'", health.status);
    }

    if !ctx.quiet {
        println!("✅ Backend at {} is {}", backend.base_url(), health.status);
    }
    Ok(())
}
