//! `skb preview`: chunk a file and print the result without storing it.

use std::path::Path;

use anyhow::{Context, Result};

use support_kb_core::models::Chunk;
use support_kb_core::preview::PreviewSession;

use crate::config::Config;
use crate::extract;

/// CLI entry point for `skb preview <path>`.
pub fn run_preview(config: &Config, path: &Path, json: bool) -> Result<()> {
    let text = extract::extract_file(path)?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let session = PreviewSession::with_limits(source, &text, &config.chunking.limits());

    if json {
        let out = serde_json::json!({
            "source": session.source(),
            "chunks": session.chunks(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialize preview")?
        );
        return Ok(());
    }

    print!("{}", format_preview(session.source(), session.chunks()));
    Ok(())
}

fn format_preview(source: &str, chunks: &[Chunk]) -> String {
    let mut out = format!("--- Preview: {} ({} chunks) ---\n", source, chunks.len());
    for chunk in chunks {
        out.push_str(&format!(
            "\n[chunk {}] {} ({} chars)\n{}\n",
            chunk.index,
            chunk.title,
            chunk.content.chars().count(),
            chunk.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_preview() {
        let chunks = vec![Chunk {
            index: 0,
            title: "Fees".to_string(),
            section: Some("Fees".to_string()),
            content: "No fees.".to_string(),
        }];
        let out = format_preview("faq.txt", &chunks);
        assert!(out.starts_with("--- Preview: faq.txt (1 chunks) ---"));
        assert!(out.contains("[chunk 0] Fees (8 chars)\nNo fees.\n"));
    }
}
