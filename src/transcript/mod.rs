pub mod supadata;
pub mod timestamp;

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use supadata::SupadataClient;
pub use timestamp::{embed_url, format_clock, normalize_seconds, segment_start_seconds};

/// Keys under which providers wrap the segment list, tried in order.
const SEGMENT_KEYS: [&str; 3] = ["content", "segments", "transcript"];

/// Keys carrying a flat transcript string when no segments are present.
const TEXT_KEYS: [&str; 3] = ["content", "transcript", "text"];

/// Keys carrying a segment's spoken text.
const SEGMENT_TEXT_KEYS: [&str; 3] = ["text", "content", "c"];

/// Transcript payload as returned by a provider, before assembly
#[derive(Debug, Clone)]
pub struct RawTranscript {
    pub body: Value,
    /// The provider flagged the payload as truncated
    pub partial: bool,
}

/// Remote transcript source
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch(&self, video_id: &str, language: &str) -> Result<RawTranscript>;
}

/// Fetches transcripts and renders them into bracket-tagged lines.
pub struct TranscriptAssembler {
    provider: Arc<dyn TranscriptProvider>,
    language: String,
}

impl TranscriptAssembler {
    pub fn new(provider: Arc<dyn TranscriptProvider>, language: impl Into<String>) -> Self {
        Self {
            provider,
            language: language.into(),
        }
    }

    /// Fetch the transcript for a platform video id as `[<seconds>] <text>` lines.
    pub async fn fetch_transcript(&self, video_id: &str) -> Result<String> {
        info!("📝 Fetching transcript for video {}", video_id);
        let raw = self.provider.fetch(video_id, &self.language).await?;
        let transcript = assemble_transcript(&raw)?;
        info!("✅ Transcript assembled: {} chars", transcript.len());
        Ok(transcript)
    }

    /// Same as [`fetch_transcript`](Self::fetch_transcript) for a watch URL.
    pub async fn fetch_transcript_for_url(&self, url: &str) -> Result<String> {
        self.fetch_transcript(&extract_video_id(url)).await
    }
}

/// Render a raw provider payload into the bracket-tagged transcript text.
pub fn assemble_transcript(raw: &RawTranscript) -> Result<String> {
    let body = &raw.body;

    if is_unavailable(body) {
        return Err(PipelineError::TranscriptUnavailable);
    }

    let transcript = match find_segments(body) {
        Some(segments) if !segments.is_empty() => {
            debug!("Assembling {} transcript segments", segments.len());
            segments
                .iter()
                .map(|segment| {
                    format!("[{}] {}", segment_start_seconds(segment), segment_text(segment))
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        _ => TEXT_KEYS
            .iter()
            .filter_map(|key| body.get(*key).and_then(Value::as_str))
            .find(|text| !text.is_empty())
            .unwrap_or_default()
            .to_string(),
    };

    if transcript.trim().is_empty() {
        if raw.partial {
            return Err(PipelineError::TranscriptIncomplete(
                "provider returned partial content without any text".to_string(),
            ));
        }
        return Err(PipelineError::TranscriptEmpty);
    }

    if raw.partial {
        warn!("⚠️ Partial transcript received, continuing with {} chars", transcript.len());
    }

    Ok(transcript)
}

fn is_unavailable(body: &Value) -> bool {
    body.get("error").and_then(Value::as_str) == Some("transcript-unavailable")
        || body.get("message").and_then(Value::as_str) == Some("Transcript Unavailable")
}

fn find_segments(body: &Value) -> Option<&Vec<Value>> {
    SEGMENT_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
}

fn segment_text(segment: &Value) -> &str {
    SEGMENT_TEXT_KEYS
        .iter()
        .filter_map(|key| segment.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or("")
}

/// Platform video id from a URL: the `v` query parameter if present, else the
/// last path segment. Bare ids pass through unchanged.
pub fn extract_video_id(input: &str) -> String {
    let input = input.trim();
    match url::Url::parse(input) {
        Ok(parsed) => {
            if let Some((_, v)) = parsed.query_pairs().find(|(key, _)| key == "v") {
                return v.into_owned();
            }
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
                .unwrap_or_default()
        }
        Err(_) => input.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(body: Value) -> RawTranscript {
        RawTranscript { body, partial: false }
    }

    #[test]
    fn test_segments_under_content() {
        let body = json!({"content": [
            {"text": "Hello!", "offset": 10500},
            {"text": "Look at the Eiffel Tower.", "offset": 45000}
        ]});
        assert_eq!(
            assemble_transcript(&raw(body)).unwrap(),
            "[10] Hello!\n[45] Look at the Eiffel Tower."
        );
    }

    #[test]
    fn test_offset_at_threshold_stays_in_seconds() {
        let body = json!({"content": [
            {"text": "Still seconds.", "offset": 10000},
            {"text": "Now milliseconds.", "offset": 10001}
        ]});
        assert_eq!(
            assemble_transcript(&raw(body)).unwrap(),
            "[10000] Still seconds.\n[10] Now milliseconds."
        );
    }

    #[test]
    fn test_mixed_field_names_keep_order() {
        let body = json!({"segments": [
            {"start": 1, "text": "a"},
            {"startTime": 20000, "content": "b"},
            {"start_time": 3, "c": "c"},
            {"s": 4, "text": "d"}
        ]});
        let transcript = assemble_transcript(&raw(body)).unwrap();
        let lines: Vec<&str> = transcript.lines().collect();
        assert_eq!(lines, vec!["[1] a", "[20] b", "[3] c", "[4] d"]);
    }

    #[test]
    fn test_transcript_key_wrapper() {
        let body = json!({"transcript": [{"start": 5.7, "text": "x"}]});
        assert_eq!(assemble_transcript(&raw(body)).unwrap(), "[5] x");
    }

    #[test]
    fn test_plain_text_fallback() {
        let body = json!({"text": "no timing here"});
        assert_eq!(assemble_transcript(&raw(body)).unwrap(), "no timing here");
        let body = json!({"content": "flat content"});
        assert_eq!(assemble_transcript(&raw(body)).unwrap(), "flat content");
    }

    #[test]
    fn test_unavailable() {
        let err = assemble_transcript(&raw(json!({"error": "transcript-unavailable"}))).unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptUnavailable));
        let err = assemble_transcript(&raw(json!({"message": "Transcript Unavailable"}))).unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptUnavailable));
    }

    #[test]
    fn test_empty_and_incomplete() {
        let err = assemble_transcript(&raw(json!({"lang": "pl"}))).unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptEmpty));

        let partial = RawTranscript { body: json!({"content": []}), partial: true };
        let err = assemble_transcript(&partial).unwrap_err();
        assert!(matches!(err, PipelineError::TranscriptIncomplete(_)));

        let partial = RawTranscript {
            body: json!({"content": [{"start": 1, "text": "kept"}]}),
            partial: true,
        };
        assert_eq!(assemble_transcript(&partial).unwrap(), "[1] kept");
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=3"), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(extract_video_id("https://youtube.com/shorts/abc/"), "abc");
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    struct FixedProvider(Value);

    #[async_trait]
    impl TranscriptProvider for FixedProvider {
        async fn fetch(&self, _video_id: &str, language: &str) -> Result<RawTranscript> {
            assert_eq!(language, "pl");
            Ok(RawTranscript { body: self.0.clone(), partial: false })
        }
    }

    #[tokio::test]
    async fn test_assembler_uses_provider() {
        let provider = Arc::new(FixedProvider(json!({"content": [{"start": 2, "text": "hi"}]})));
        let assembler = TranscriptAssembler::new(provider, "pl");
        let text = assembler
            .fetch_transcript_for_url("https://www.youtube.com/watch?v=xyz")
            .await
            .unwrap();
        assert_eq!(text, "[2] hi");
    }
}
