//! Karaoke filter-script compilation.
//!
//! Lyric lines become one `drawtext` directive each, chained after a base
//! scale filter into a single ffmpeg filtergraph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::jobs::FILTER_SCRIPT_FILE;

pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 720;
pub const FONT_SIZE: u32 = 42;
/// Cleaned text longer than this is wrapped onto two lines.
pub const WRAP_THRESHOLD_CHARS: usize = 42;
/// Vertical offset of the text block below the canvas centre.
pub const TEXT_OFFSET_Y: u32 = 200;

/// One timed lyric line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LyricLine {
    /// Start of the visibility window in seconds (inclusive).
    #[serde(deserialize_with = "seconds")]
    pub start_time: f64,
    /// End of the visibility window in seconds (exclusive).
    #[serde(deserialize_with = "seconds")]
    pub end_time: f64,
    pub text: String,
}

#[cfg(test)]
impl LyricLine {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// Accepts numbers, numeric strings, and `null` for time fields.
fn seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => {
            let trimmed = text.trim();
            trimmed
                .strip_suffix('s')
                .unwrap_or(trimmed)
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid seconds value {text:?}"))
                })
        }
        Raw::Null(()) => Ok(0.0),
    }
}

/// Removes characters that break filtergraph quoting.
pub fn clean_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | ':' | '\\' | '%'))
        .collect()
}

/// Splits long text into two lines at the word-count midpoint.
///
/// Text at or under the threshold, or with a single word, is returned as is.
pub fn wrap_text(text: &str) -> String {
    if text.chars().count() <= WRAP_THRESHOLD_CHARS {
        return text.to_string();
    }
    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.len() < 2 {
        return text.to_string();
    }
    let mid = words.len() / 2;
    format!("{}\n{}", words[..mid].join(" "), words[mid..].join(" "))
}

/// Builds the `drawtext` directive for one line.
pub fn drawtext_directive(line: &LyricLine, font_file: Option<&str>) -> String {
    let text = wrap_text(&clean_text(&line.text));
    let font = font_file
        .map(|path| format!("fontfile='{}':", escape_font_path(path)))
        .unwrap_or_default();

    format!(
        "drawtext={font}text='{text}':fontcolor=white:fontsize={FONT_SIZE}:\
         box=1:boxcolor=black@0.6:boxborderw=10:\
         x=(w-text_w)/2:y=(h-text_h)/2+{TEXT_OFFSET_Y}:\
         enable='gte(t,{start})*lt(t,{end})'",
        start = line.start_time,
        end = line.end_time,
    )
}

/// Compiles all lines, in input order, into one comma-joined filter script.
pub fn compile_filter_script(lines: &[LyricLine], font_file: Option<&str>) -> String {
    let mut filters = Vec::with_capacity(lines.len() + 1);
    filters.push(format!("scale={CANVAS_WIDTH}:{CANVAS_HEIGHT}"));
    filters.extend(lines.iter().map(|line| drawtext_directive(line, font_file)));
    filters.join(",")
}

/// Writes the compiled script into `dir` and returns its path.
pub async fn write_filter_script(
    dir: &Path,
    lines: &[LyricLine],
    font_file: Option<&str>,
) -> Result<PathBuf, AppError> {
    let path = dir.join(FILTER_SCRIPT_FILE);
    let script = compile_filter_script(lines, font_file);
    tokio::fs::write(&path, script).await.map_err(|err| {
        AppError::internal(format!("failed to write filter script {:?}: {err}", path))
    })?;
    Ok(path)
}

/// Escapes a font path for use inside a quoted filter option.
fn escape_font_path(path: &str) -> String {
    path.replace('\\', "/").replace(':', "\\:").replace('\'', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Extracts the `[start, end)` bounds from an emitted enable expression.
    fn enable_window(directive: &str) -> (f64, f64) {
        let expr = directive
            .split("enable='")
            .nth(1)
            .and_then(|rest| rest.strip_suffix('\''))
            .expect("enable expression");
        let start = expr
            .strip_prefix("gte(t,")
            .and_then(|rest| rest.split(')').next())
            .expect("start bound");
        let end = expr
            .split("lt(t,")
            .nth(1)
            .and_then(|rest| rest.split(')').next())
            .expect("end bound");
        (start.parse().expect("start"), end.parse().expect("end"))
    }

    #[test]
    fn script_starts_with_scale_and_joins_with_commas() {
        let lines = vec![
            LyricLine::new(0.0, 2.0, "first"),
            LyricLine::new(2.0, 4.0, "second"),
        ];
        let script = compile_filter_script(&lines, None);
        assert!(script.starts_with("scale=1280:720,drawtext="));
        assert_eq!(script.matches(",drawtext=").count(), 2);
        assert!(script.find("text='first'") < script.find("text='second'"));
    }

    #[test]
    fn empty_lyrics_compile_to_scale_only() {
        assert_eq!(compile_filter_script(&[], None), "scale=1280:720");
    }

    #[test]
    fn directive_carries_layout_and_style() {
        let directive = drawtext_directive(&LyricLine::new(1.0, 3.5, "Hello"), None);
        assert!(directive.contains("text='Hello'"));
        assert!(directive.contains("fontcolor=white"));
        assert!(directive.contains("fontsize=42"));
        assert!(directive.contains("boxcolor=black@0.6"));
        assert!(directive.contains("x=(w-text_w)/2"));
        assert!(directive.contains("y=(h-text_h)/2+200"));
        assert!(!directive.contains("fontfile"));
    }

    #[test]
    fn overlay_window_is_closed_open() {
        let line = LyricLine::new(1.0, 3.5, "Hello");
        let directive = drawtext_directive(&line, None);
        assert!(directive.contains("enable='gte(t,1)*lt(t,3.5)'"));

        let (start, end) = enable_window(&directive);
        let visible = |t: f64| t >= start && t < end;
        for t in [1.0, 1.5, 3.0, 3.49] {
            assert!(visible(t), "visible at {t}");
        }
        for t in [0.0, 0.99, 3.5, 4.0] {
            assert!(!visible(t), "hidden at {t}");
        }
    }

    #[test]
    fn strips_filter_breaking_characters() {
        assert_eq!(clean_text("  It's 100%: C:\\path  "), "Its 100 Cpath");
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let text = "a".repeat(42);
        assert_eq!(wrap_text(&text), text);
        let directive = drawtext_directive(&LyricLine::new(0.0, 1.0, "short line of lyrics"), None);
        assert!(!directive.contains('\n'));
    }

    #[test]
    fn long_text_splits_at_word_count_midpoint() {
        let text = "one two three four five six seven eight nine ten eleven";
        assert!(text.chars().count() > 42);
        let wrapped = wrap_text(text);
        let parts = wrapped.split('\n').collect::<Vec<_>>();
        assert_eq!(parts, ["one two three four five", "six seven eight nine ten eleven"]);
    }

    #[test]
    fn midpoint_counts_words_not_characters() {
        let text = "supercalifragilisticexpialidocious extraordinarily a b";
        assert_eq!(
            wrap_text(text),
            "supercalifragilisticexpialidocious extraordinarily\na b"
        );
    }

    #[test]
    fn single_long_word_is_not_split() {
        let text = "x".repeat(60);
        assert_eq!(wrap_text(&text), text);
    }

    #[test]
    fn wrap_is_measured_after_cleaning() {
        // 43 characters raw, 42 after the colon is removed.
        let raw = format!("{}:", "a ".repeat(21));
        let directive = drawtext_directive(&LyricLine::new(0.0, 1.0, raw), None);
        assert!(!directive.contains('\n'));
    }

    #[test]
    fn font_path_is_escaped() {
        let directive =
            drawtext_directive(&LyricLine::new(0.0, 1.0, "x"), Some("C:\\Windows\\Fonts\\arial.ttf"));
        assert!(directive.starts_with("drawtext=fontfile='C\\:/Windows/Fonts/arial.ttf':text='x'"));
    }

    #[test]
    fn lyric_line_accepts_camel_case_and_quoted_numbers() {
        let lines: Vec<LyricLine> = serde_json::from_str(
            r#"[{"startTime": 1.0, "endTime": "3.5", "text": "Hello"}, {"text": "no times"}, {"startTime": null, "endTime": "2s"}]"#,
        )
        .expect("lyrics");
        assert_eq!(lines[0], LyricLine::new(1.0, 3.5, "Hello"));
        assert_eq!(lines[1], LyricLine::new(0.0, 0.0, "no times"));
        assert_eq!(lines[2], LyricLine::new(0.0, 2.0, ""));

        let json = serde_json::to_value(&lines[0]).expect("serialize");
        assert_eq!(json["startTime"], 1.0);
        assert_eq!(json["endTime"], 3.5);
    }

    #[test]
    fn lyric_line_rejects_non_finite_or_malformed_times() {
        for raw in ["\"NaN\"", "\"inf\"", "\"-infinity\"", "\"2ss\"", "\"s\"", "\"abc\""] {
            let json = format!(r#"{{"startTime": {raw}, "endTime": 1, "text": "x"}}"#);
            assert!(
                serde_json::from_str::<LyricLine>(&json).is_err(),
                "{raw} should be rejected"
            );
        }
        let line: LyricLine =
            serde_json::from_str(r#"{"startTime": " 1.25s ", "endTime": 2, "text": "x"}"#)
                .expect("single unit suffix");
        assert_eq!(line.start_time, 1.25);
    }

    #[tokio::test]
    async fn script_is_written_next_to_job_audio() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lines = vec![LyricLine::new(0.5, 1.5, "la la")];
        let path = write_filter_script(dir.path(), &lines, None)
            .await
            .expect("script");
        assert_eq!(path, dir.path().join("filters_karaoke.txt"));
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, compile_filter_script(&lines, None));
    }
}
