//! Clipboard integration for copying formatted output and pasting input
//!
//! Uses arboard for cross-platform clipboard access

use anyhow::{Context, Result};
use arboard::Clipboard;

/// Copy rendered HTML with a plain-text alternative, so rich editors get the
/// colors and plain ones get the words.
pub fn copy_html(html: &str, plain: &str) -> Result<()> {
    if html.is_empty() {
        return Ok(());
    }

    let mut clipboard = Clipboard::new().context("Clipboard unavailable")?;
    clipboard.set_html(html, Some(plain))?;
    tracing::debug!("Copied {} bytes of HTML to clipboard", html.len());
    Ok(())
}

/// Paste text from system clipboard
pub fn paste() -> Result<String> {
    let mut clipboard = Clipboard::new().context("Clipboard unavailable")?;
    let text = clipboard.get_text()?;
    tracing::debug!("Pasted {} bytes from clipboard", text.len());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires clipboard access, may fail in CI
    fn test_copy_paste() {
        let text = "Alice says: Hello.";
        copy_html("<span class=\"speech\">Alice says: Hello.</span>", text).expect("Copy failed");
        assert_eq!(paste().expect("Paste failed"), text);
    }

    #[test]
    fn test_empty_copy_is_noop() {
        assert!(copy_html("", "").is_ok());
    }
}
