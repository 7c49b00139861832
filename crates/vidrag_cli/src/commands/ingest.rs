//! Ingest command - Submit a video and follow its processing.

use anyhow::Result;
use clap::Args;
use tracing::info;
use vidrag_core::SubmitOutcome;

use super::{follow_ingestion, report_settled, CommandContext};

#[derive(Args)]
pub struct IngestArgs {
    /// YouTube URL of the video
    url: String,

    /// Return as soon as the backend accepts the job
    #[arg(long)]
    detach: bool,
}

pub async fn execute(args: IngestArgs, ctx: CommandContext) -> Result<()> {
    let facade = ctx.session()?;

    println!("📥 Submitting {}", args.url);
    let video_id = match facade.submit(&args.url).await {
        SubmitOutcome::Accepted(video_id) => video_id,
        SubmitOutcome::Failed(message) => anyhow::bail!("Ingestion failed: {}", message),
        SubmitOutcome::Superseded | SubmitOutcome::Closed => {
            anyhow::bail!("Submission was cancelled")
        }
    };
    println!("   Video ID: {}", video_id);

    if args.detach {
        info!(video_id = %video_id, "Detached from ingestion");
        println!("   Check progress with: vidrag status {}", video_id);
        return Ok(());
    }

    let state = tokio::select! {
        state = follow_ingestion(&facade, ctx.quiet) => state,
        _ = tokio::signal::ctrl_c() => {
            facade.shutdown();
            println!();
            println!("Stopped following. Processing continues on the backend.");
            println!("   Check progress with: vidrag status {}", video_id);
            return Ok(());
        }
    };

    report_settled(&state)
}
