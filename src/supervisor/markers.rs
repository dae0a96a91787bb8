//! Output markers emitted by the external program
//!
//! The completion message is an unversioned contract, so it is matched by a
//! small ordered table. New message formats are added as table rows.

/// One tolerated completion-message format.
#[derive(Debug, Clone, Copy)]
pub struct CompletionMatcher {
    /// Short label used in logs.
    pub name: &'static str,
    extract: fn(&str) -> Option<u64>,
}

impl CompletionMatcher {
    /// Step count if `line` is in this matcher's format.
    #[must_use]
    pub fn extract(&self, line: &str) -> Option<u64> {
        (self.extract)(line)
    }
}

/// Tolerated formats, most specific first.
pub const COMPLETION_MATCHERS: &[CompletionMatcher] = &[
    CompletionMatcher {
        name: "counted",
        extract: counted_packages_delivered_in,
    },
    CompletionMatcher {
        name: "plain",
        extract: packages_delivered_in,
    },
    CompletionMatcher {
        name: "after",
        extract: packages_delivered_after,
    },
];

/// First matching completion format for `line`, with its step count.
#[must_use]
pub fn match_completion(line: &str) -> Option<(&'static str, u64)> {
    COMPLETION_MATCHERS
        .iter()
        .find_map(|m| m.extract(line).map(|steps| (m.name, steps)))
}

/// `All 12 packages delivered in 340 steps`
fn counted_packages_delivered_in(line: &str) -> Option<u64> {
    let lower = line.to_ascii_lowercase();
    let idx = lower.find("packages delivered in ")?;
    let head = lower[..idx].trim_end();
    let count_start = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if count_start == head.len() {
        return None;
    }
    let before_all = head[..count_start].trim_end().strip_suffix("all")?;
    if ends_in_word(before_all) {
        return None;
    }
    steps_followed_by_unit(&lower[idx + "packages delivered in ".len()..])
}

/// `All packages delivered in 340 steps`
fn packages_delivered_in(line: &str) -> Option<u64> {
    let lower = line.to_ascii_lowercase();
    let idx = find_word(&lower, "all packages delivered in ")?;
    steps_followed_by_unit(&lower[idx + "all packages delivered in ".len()..])
}

/// `All packages delivered after 340 steps` / `All packages have been delivered after 340 steps`
fn packages_delivered_after(line: &str) -> Option<u64> {
    let lower = line.to_ascii_lowercase();
    ["all packages delivered after ", "all packages have been delivered after "]
        .iter()
        .find_map(|phrase| {
            let idx = find_word(&lower, phrase)?;
            steps_followed_by_unit(&lower[idx + phrase.len()..])
        })
}

/// First occurrence of `phrase` that starts a word.
fn find_word(haystack: &str, phrase: &str) -> Option<usize> {
    haystack
        .match_indices(phrase)
        .map(|(idx, _)| idx)
        .find(|&idx| !ends_in_word(&haystack[..idx]))
}

fn ends_in_word(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_alphanumeric)
}

/// Leading integer of `rest`, which must be followed by `step`/`steps`.
fn steps_followed_by_unit(rest: &str) -> Option<u64> {
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    rest[digits_end..]
        .trim_start()
        .starts_with("step")
        .then(|| rest[..digits_end].parse().ok())
        .flatten()
}

const INDEX_FAULT: &str = "ArrayIndexOutOfBoundsException";
const COLOR_ROUTINE: &str = "getColorValue";
/// Stack frames searched after an exception line.
const FRAME_WINDOW: usize = 8;

/// Whether the captured output shows the color-parsing index fault that a
/// malformed configuration artifact produces.
#[must_use]
pub fn detect_config_corruption<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().enumerate().any(|(i, line)| {
        let line = line.as_ref();
        if !line.contains(INDEX_FAULT) {
            return false;
        }
        line.contains(COLOR_ROUTINE)
            || lines
                .iter()
                .skip(i + 1)
                .take(FRAME_WINDOW)
                .any(|frame| frame.as_ref().contains(COLOR_ROUTINE))
    })
}
