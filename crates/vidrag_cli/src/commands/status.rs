//! Status command - One-shot status lookup.

use anyhow::{Context, Result};
use clap::Args;
use vidrag_core::{RemoteStatus, VideoBackend, VideoId};

use super::CommandContext;
use crate::display;

#[derive(Args)]
pub struct StatusArgs {
    /// Video ID returned by `vidrag ingest`
    video_id: String,
}

pub async fn execute(args: StatusArgs, ctx: CommandContext) -> Result<()> {
    let backend = ctx.backend()?;
    let video_id = VideoId::new(args.video_id);

    let report = backend
        .fetch_status(&video_id)
        .await
        .with_context(|| format!("Failed to fetch status for {}", video_id))?;

    let label = match &report.status {
        RemoteStatus::Processing => "PROCESSING".to_string(),
        RemoteStatus::Ready => "READY".to_string(),
        RemoteStatus::Error => "ERROR".to_string(),
        RemoteStatus::Other(raw) => raw.to_uppercase(),
    };
    println!("🎬 {}  {}", video_id, label);

    match report.status {
        RemoteStatus::Ready => {
            let metadata = backend
                .fetch_metadata(&video_id)
                .await
                .with_context(|| format!("Failed to fetch metadata for {}", video_id))?;
            println!("{}", display::metadata_block(&metadata));
        }
        RemoteStatus::Error => {
            println!(
                "   ❌ {}",
                report.error.as_deref().unwrap_or("Unknown error")
            );
        }
        RemoteStatus::Processing | RemoteStatus::Other(_) => {
            println!(
                "   {} {}",
                display::progress_bar(report.progress),
                display::stage_label(&report.stage)
            );
        }
    }

    Ok(())
}
