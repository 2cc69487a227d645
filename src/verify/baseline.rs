use super::*;

fn is_disallowed(c: char) -> bool {
    c == '\u{FFFD}'
        || ('\u{E000}'..='\u{F8FF}').contains(&c)
        || (c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
}

/// Longest run of the trailing `n`-word sequence, for the worst `n`.
fn trailing_repeat(words: &[&str]) -> Option<(usize, usize)> {
    let mut worst: Option<(usize, usize)> = None;

    for n in 1..=BASELINE_MAX_NGRAM {
        if words.len() < n * 2 {
            break;
        }

        let tail = &words[words.len() - n..];
        let mut repeats = 1;
        while (repeats + 1) * n <= words.len() {
            let end = words.len() - repeats * n;
            if &words[end - n..end] != tail {
                break;
            }
            repeats += 1;
        }

        if worst.is_none_or(|(_, current)| repeats > current) {
            worst = Some((n, repeats));
        }
    }

    worst
}

pub fn verify_baseline(document: &str) -> Outcome {
    let alnum_count = document.chars().filter(|c| c.is_alphanumeric()).count();
    if alnum_count < BASELINE_MIN_ALNUM_CHARS {
        return Outcome::fail(format!(
            "document has {alnum_count} alphanumeric characters; at least {BASELINE_MIN_ALNUM_CHARS} required"
        ));
    }

    if let Some((offset, c)) = document.chars().enumerate().find(|(_, c)| is_disallowed(*c)) {
        return Outcome::fail(format!(
            "document contains disallowed character U+{:04X} at offset {}",
            c as u32, offset
        ));
    }

    let words: Vec<&str> = document.split_whitespace().collect();
    if let Some((n, repeats)) = trailing_repeat(&words) {
        if repeats > BASELINE_MAX_REPEATS {
            return Outcome::fail(format!(
                "trailing {n}-word sequence repeats {repeats} times; at most {BASELINE_MAX_REPEATS} allowed"
            ));
        }
    }

    Outcome::pass(format!(
        "{alnum_count} alphanumeric characters, {} words",
        words.len()
    ))
}
