//! MIME detection for audio handed to the transcription model.
//!
//! Audio is never decoded in-process; the separation tool, the encoder and the
//! transcription model all read the uploaded file, so any upload name is
//! accepted.

use std::path::Path;

/// Returns the MIME type for an audio file, `application/octet-stream` when
/// the extension is unknown or missing.
pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("webm") => "audio/webm",
        Some("aif") | Some("aiff") => "audio/aiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type_for(Path::new("a/vocals.wav")), "audio/wav");
        assert_eq!(mime_type_for(Path::new("temp_song.MP3")), "audio/mpeg");
        assert_eq!(mime_type_for(Path::new("take.aiff")), "audio/aiff");
        assert_eq!(mime_type_for(Path::new("take.opus")), "audio/opus");
    }

    #[test]
    fn unknown_or_missing_extension_is_octet_stream() {
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
        assert_eq!(mime_type_for(Path::new("clip.xyz")), "application/octet-stream");
    }
}
