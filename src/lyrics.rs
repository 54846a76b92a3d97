//! Lyric transcription: prompt, response cleanup, and parsing.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{AudioClip, LyricsModel};
use crate::error::AppError;
use crate::karaoke::LyricLine;

/// Instruction sent with every clip.
pub const TRANSCRIPTION_PROMPT: &str = "Karaoke transcription. Listen to the attached vocal track and \
return ONLY JSON of the form {\"lyrics\": [{\"startTime\": <seconds>, \"endTime\": <seconds>, \"text\": <line>}]}. \
Times must be exact seconds from the start of the audio, one entry per sung line, in order.";

/// Body of a successful transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsDocument {
    pub lyrics: Vec<LyricLine>,
}

/// Transcribes `audio` with a single model call and parses the answer.
pub async fn transcribe_lyrics(
    model: &dyn LyricsModel,
    audio: AudioClip,
) -> Result<LyricsDocument, AppError> {
    let raw = model.generate(TRANSCRIPTION_PROMPT, audio).await?;
    let document = parse_lyrics_response(&raw)?;
    info!(lines = document.lyrics.len(), "lyrics transcribed");
    Ok(document)
}

/// Removes a surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

/// Parses model output into a [`LyricsDocument`].
pub fn parse_lyrics_response(raw: &str) -> Result<LyricsDocument, AppError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str::<LyricsDocument>(cleaned).map_err(|err| {
        warn!(error = %err, response = %preview(cleaned), "model returned unusable lyrics JSON");
        AppError::transcription(format!("transcription failed: invalid lyrics JSON: {err}"))
    })
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct CannedModel(&'static str);

    #[async_trait]
    impl LyricsModel for CannedModel {
        async fn generate(&self, prompt: &str, _audio: AudioClip) -> Result<String, AppError> {
            assert!(prompt.contains("startTime"));
            Ok(self.0.to_string())
        }
    }

    fn clip() -> AudioClip {
        AudioClip {
            bytes: vec![0; 4],
            mime_type: "audio/wav".to_string(),
        }
    }

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```\n[]\n```  "), "[]");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_lyrics() {
        let raw = "```json\n{\"lyrics\": [{\"startTime\": 1.0, \"endTime\": 3.5, \"text\": \"Hello\"}]}\n```";
        let doc = parse_lyrics_response(raw).expect("lyrics");
        assert_eq!(doc.lyrics, vec![LyricLine::new(1.0, 3.5, "Hello")]);
    }

    #[test]
    fn malformed_json_is_transcription_failure() {
        for raw in ["not json", "{\"lyrics\": \"oops\"}", "{\"words\": []}", ""] {
            let err = parse_lyrics_response(raw).expect_err("should fail");
            assert!(matches!(err, AppError::Transcription(_)), "{raw:?}");
        }
    }

    #[tokio::test]
    async fn transcribe_runs_one_call_and_parses() {
        let doc = transcribe_lyrics(
            &CannedModel("{\"lyrics\": [{\"startTime\": 0, \"endTime\": 2, \"text\": \"la\"}]}"),
            clip(),
        )
        .await
        .expect("lyrics");
        assert_eq!(doc.lyrics.len(), 1);
        assert_eq!(doc.lyrics[0].text, "la");
    }
}
