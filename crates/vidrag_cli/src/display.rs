//! Terminal rendering for session state.

use vidrag_core::{SessionState, SourceRef, Turn, VideoMetadata};

const BAR_WIDTH: usize = 30;
const EXCERPT_LIMIT: usize = 160;

/// Icon and label for a backend processing stage.
pub fn stage_label(stage: &str) -> String {
    let icon = match stage {
        "downloading" => "⬇️ ",
        "transcribing" => "🎤",
        "chunking" => "✂️ ",
        "indexing" => "📊",
        "complete" => "✅",
        _ => "⏳",
    };
    let name = if stage.is_empty() { "waiting" } else { stage };
    format!("{} {}", icon, capitalize(name))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn progress_bar(progress: f64) -> String {
    let fraction = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        (fraction * 100.0).round() as u32
    )
}

/// One line summarizing an in-progress job.
pub fn progress_line(state: &SessionState) -> String {
    format!("   {} {}", progress_bar(state.progress), stage_label(&state.stage))
}

pub fn metadata_block(metadata: &VideoMetadata) -> String {
    format!(
        "   Title:    {}\n   Duration: {}\n   Chunks:   {}",
        metadata.title,
        metadata.duration_label(),
        metadata.chunk_count
    )
}

/// Numbered source list printed under an answer.
pub fn sources_block(sources: &[SourceRef]) -> String {
    let mut out = String::from("   📚 Sources:");
    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("\n   [{}] {}", i + 1, source.timestamp_url));
        out.push_str(&format!("\n       {}", excerpt(&source.text)));
    }
    out
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= EXCERPT_LIMIT {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_LIMIT).collect();
    format!("{}…", cut.trim_end())
}

pub fn assistant_turn(turn: &Turn) -> String {
    let mut out = format!("🤖 {}", turn.content);
    if !turn.sources.is_empty() {
        out.push('\n');
        out.push_str(&sources_block(&turn.sources));
    }
    out
}
