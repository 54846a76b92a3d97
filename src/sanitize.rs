//! Filename sanitization for uploaded names.

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Total and idempotent. Distinct inputs may map to the same output.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::sanitize_filename;

    fn is_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }

    #[test]
    fn keeps_safe_names_untouched() {
        assert_eq!(sanitize_filename("song-01_final.mp3"), "song-01_final.mp3");
    }

    #[test]
    fn replaces_each_unsafe_character() {
        assert_eq!(sanitize_filename("my song (live).mp3"), "my_song__live_.mp3");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("canción.wav"), "canci_n.wav");
    }

    #[test]
    fn output_is_safe_and_idempotent() {
        let inputs = [
            "",
            "plain",
            "a b\tc\nd",
            "C:\\Users\\me\\track.flac",
            "emoji 🎤 karaoke.ogg",
            "quote'd \"name\"%.wav",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            assert!(is_safe(&once), "{once:?} contains unsafe characters");
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn preserves_character_count() {
        let input = "añb🎤c";
        assert_eq!(
            sanitize_filename(input).chars().count(),
            input.chars().count()
        );
    }
}
