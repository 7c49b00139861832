//! Chat command - Interactive question/answer loop about one video.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use vidrag_core::{AskOutcome, SessionFacade, SessionStatus, SubmitOutcome, VideoId};

use super::{follow_ingestion, report_settled, CommandContext};
use crate::display;

#[derive(Args)]
pub struct ChatArgs {
    /// YouTube URL to ingest before chatting
    #[arg(conflicts_with = "video_id")]
    url: Option<String>,

    /// Chat about a video that was already submitted
    #[arg(long)]
    video_id: Option<String>,
}

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Reset,
    Help,
    Text(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/reset" | "/new" => Input::Reset,
        "/help" => Input::Help,
        text => Input::Text(text),
    }
}

const HELP: &str = "   /reset  start over with a new video\n   /quit   leave the chat";

pub async fn execute(args: ChatArgs, ctx: CommandContext) -> Result<()> {
    let facade = ctx.session()?;

    if let Some(url) = &args.url {
        ingest(&facade, url, ctx.quiet).await?;
    } else if let Some(id) = args.video_id {
        if let SubmitOutcome::Accepted(video_id) = facade.attach(VideoId::new(id)) {
            println!("🔗 Attached to {}", video_id);
        }
        let state = follow_ingestion(&facade, ctx.quiet).await;
        report_settled(&state)?;
    }

    println!("Type a question, or /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let ready = facade.status() == SessionStatus::Ready;
        print!("{}", if ready { "❓ " } else { "🎬 URL> " });
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::Reset => {
                facade.reset()?;
                println!("🔄 Session cleared. Enter a video URL to start again.");
            }
            Input::Text(text) if ready => ask(&facade, text).await,
            Input::Text(url) => {
                if let Err(e) = ingest(&facade, url, ctx.quiet).await {
                    eprintln!("❌ {:#}", e);
                }
            }
        }
    }

    facade.shutdown();
    Ok(())
}

async fn ingest(facade: &SessionFacade, url: &str, quiet: bool) -> Result<()> {
    match facade.submit(url).await {
        SubmitOutcome::Accepted(video_id) => println!("📥 Processing {}", video_id),
        SubmitOutcome::Failed(message) => anyhow::bail!("Ingestion failed: {}", message),
        SubmitOutcome::Superseded | SubmitOutcome::Closed => {
            anyhow::bail!("Submission was cancelled")
        }
    }

    let state = tokio::select! {
        state = follow_ingestion(facade, quiet) => state,
        _ = tokio::signal::ctrl_c() => {
            facade.reset()?;
            anyhow::bail!("Processing interrupted");
        }
    };
    report_settled(&state)
}

async fn ask(facade: &SessionFacade, question: &str) {
    let outcome = tokio::select! {
        outcome = facade.ask(question) => outcome,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the ask records the cancellation in the transcript.
            println!();
            println!("⚠️  Request cancelled");
            return;
        }
    };

    match outcome {
        Ok(AskOutcome::Answered) => {
            if let Some(turn) = facade.snapshot().chat_history.last() {
                println!("{}", display::assistant_turn(turn));
            }
        }
        Ok(AskOutcome::Discarded) => debug!("Answer arrived after the session moved on"),
        Ok(AskOutcome::Failed(message)) => {
            debug!(%message, "Question failed");
            eprintln!("❌ Error: {}", message);
        }
        Err(e) => {
            warn!(error = %e, "Question rejected");
            eprintln!("⚠️  {}", e);
        }
    }
}
