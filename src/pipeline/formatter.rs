use super::{DictionaryEntry, apply_dictionary};
use crate::provider::{ChatModel, ChatRequest};
use std::fmt::Write as _;
use tracing::warn;

const MAX_FORMAT_TOKENS: u32 = 2000;

const FORMAT_SYSTEM_PROMPT: &str = "\
You are a careful text formatter. Your job is to:
1. Add proper punctuation (periods, commas, question marks, exclamation marks)
2. Fix capitalization (start of sentences, proper nouns)
3. Add appropriate spacing
4. Fix obvious grammar errors
5. Apply dictionary replacements exactly as specified

CRITICAL RULES:
- Do NOT change the meaning or content
- Do NOT add new information
- Do NOT remove information
- Do NOT rewrite sentences - only format them
- Preserve all technical terms, names, and specific words
- Output ONLY the formatted text, no explanations or comments";

fn build_prompt(text: &str, entries: &[DictionaryEntry]) -> String {
    let mut prompt = String::from(
        "Format the following transcribed text with proper punctuation, \
         capitalization, and spacing.",
    );

    // Restate the dictionary in the prompt as a second line of defense behind
    // the deterministic substitution pass.
    if !entries.is_empty() {
        prompt.push_str(
            "\n\nIMPORTANT: Apply these exact word/phrase replacements (case-insensitive):\n",
        );
        for entry in entries {
            let _ = writeln!(
                prompt,
                "- \"{}\" should always be written as \"{}\"",
                entry.phrase, entry.replacement
            );
        }
    }

    let _ = write!(prompt, "\nText to format:\n{}\n\nReturn only the formatted text:", text);
    prompt
}

/// Apply the dictionary, then ask the chat model to polish punctuation and
/// capitalization.
///
/// Polishing is best-effort: any provider failure is logged and the
/// dictionary-substituted text is returned instead, so the caller always gets
/// usable output. Empty or whitespace-only input is returned unchanged
/// without touching the provider.
pub async fn format_text(
    merged: &str,
    entries: &[DictionaryEntry],
    chat: &dyn ChatModel,
) -> String {
    if merged.trim().is_empty() {
        return merged.to_string();
    }

    let substituted = apply_dictionary(merged, entries);

    let request = ChatRequest {
        system: FORMAT_SYSTEM_PROMPT.to_string(),
        prompt: build_prompt(&substituted, entries),
        temperature: 0.0,
        max_tokens: MAX_FORMAT_TOKENS,
    };

    match chat.complete(request).await {
        Ok(polished) => {
            let polished = polished.trim();
            if polished.is_empty() {
                substituted
            } else {
                polished.to_string()
            }
        }
        Err(e) => {
            warn!(
                "text polishing failed ({}), returning dictionary-substituted text: {}",
                e.code(),
                e
            );
            substituted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Chat stub with a canned outcome and a call counter.
    struct StubChat {
        reply: Result<&'static str, fn() -> ProviderError>,
        calls: AtomicUsize,
    }

    impl StubChat {
        fn replying(reply: &'static str) -> Self {
            Self { reply: Ok(reply), calls: AtomicUsize::new(0) }
        }

        fn failing(err: fn() -> ProviderError) -> Self {
            Self { reply: Err(err), calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ChatModel for StubChat {
        async fn complete(&self, _request: ChatRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(err) => Err(err()),
            }
        }
    }

    fn entries() -> Vec<DictionaryEntry> {
        vec![DictionaryEntry {
            phrase: "AI".to_string(),
            replacement: "artificial intelligence".to_string(),
        }]
    }

    #[tokio::test]
    async fn empty_input_skips_the_provider() {
        let chat = StubChat::replying("never used");
        assert_eq!(format_text("", &entries(), &chat).await, "");
        assert_eq!(format_text("   \n", &entries(), &chat).await, "   \n");
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_substituted_text() {
        let chat = StubChat::failing(|| ProviderError::QuotaExhausted);
        let out = format_text("i love AI", &entries(), &chat).await;
        assert_eq!(out, apply_dictionary("i love AI", &entries()));
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn successful_polish_is_returned_trimmed() {
        let chat = StubChat::replying("  I love artificial intelligence.  ");
        let out = format_text("i love AI", &entries(), &chat).await;
        assert_eq!(out, "I love artificial intelligence.");
    }

    #[tokio::test]
    async fn blank_polish_falls_back_to_substituted_text() {
        let chat = StubChat::replying("   ");
        let out = format_text("i love AI", &entries(), &chat).await;
        assert_eq!(out, "i love artificial intelligence");
    }

    #[test]
    fn prompt_restates_dictionary_directives() {
        let prompt = build_prompt("some text", &entries());
        assert!(prompt.contains("\"AI\" should always be written as \"artificial intelligence\""));
        assert!(prompt.contains("some text"));
    }
}
