use super::*;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static HTML_EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:b|i|em|strong)\s*>").expect("valid html emphasis regex")
});
// Emphasis markers only pair up around a non-space run bounded by
// non-word characters, so `2 * 3 * 4` and `a_b and c_d` stay intact.
static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\W)\*\*(\S(?:.*?\S)?)\*\*(\W|$)").expect("valid bold regex")
});
static BOLD_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\W)__(\S(?:.*?\S)?)__(\W|$)").expect("valid bold underscore regex")
});
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\W)\*(\S(?:[^*]*?\S)?)\*(\W|$)").expect("valid italic regex")
});
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\W)_(\S(?:[^_]*?\S)?)_(\W|$)").expect("valid italic underscore regex")
});

/// Removes one emphasis style until nothing changes; adjacent spans share
/// their boundary character, so a single pass can miss every other one.
fn strip_emphasis(re: &Regex, text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, "${1}${2}${3}");
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

fn fold_typography(c: char) -> Option<&'static str> {
    let folded = match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => "\"",
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => "-",
        '\u{FF3F}' => "_",
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => " ",
        '\u{2026}' => "...",
        '\u{FB01}' => "fi",
        '\u{FB02}' => "fl",
        '\u{FB00}' => "ff",
        _ => return None,
    };
    Some(folded)
}

/// Folds typography, strips emphasis markup, collapses whitespace and lowercases.
pub fn normalize_text(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        match fold_typography(c) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(c),
        }
    }

    let collapsed = WHITESPACE_RE.replace_all(&folded, " ");
    let stripped = HTML_EMPHASIS_RE.replace_all(&collapsed, "");
    let stripped = strip_emphasis(&BOLD_STAR_RE, &stripped);
    let stripped = strip_emphasis(&BOLD_UNDERSCORE_RE, &stripped);
    let stripped = strip_emphasis(&ITALIC_STAR_RE, &stripped);
    let stripped = strip_emphasis(&ITALIC_UNDERSCORE_RE, &stripped);

    WHITESPACE_RE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Char-safe excerpt of `chars[start..end]`, shortened to `max_chars`.
pub fn excerpt(chars: &[char], start: usize, end: usize, max_chars: usize) -> String {
    let end = end.min(chars.len());
    let start = start.min(end);
    let slice = &chars[start..end];
    if slice.len() <= max_chars {
        return slice.iter().collect();
    }

    let mut shortened: String = slice[..max_chars].iter().collect();
    shortened.push_str("...");
    shortened
}
