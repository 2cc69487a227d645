use super::*;

pub fn verify_presence(text: &str, document: &[char], expect_present: bool) -> Result<Outcome> {
    let scan = search(text, document)?;

    match (scan.first, expect_present) {
        (Some(found), true) => Ok(Outcome::pass(format!(
            "found at offset {} (similarity {:.2})",
            found.start, found.similarity
        ))),
        (Some(found), false) => Ok(Outcome::fail(format!(
            "text '{}' was found at offset {} as '{}' (similarity {:.2})",
            text,
            found.start,
            excerpt(document, found.start, found.end, EXCERPT_MAX_CHARS),
            found.similarity
        ))),
        (None, true) => {
            let closest = match scan.best {
                Some(best) => format!(
                    "closest match '{}' (similarity {:.2})",
                    excerpt(document, best.start, best.end, EXCERPT_MAX_CHARS),
                    best.similarity.max(0.0)
                ),
                None => "document is empty".to_string(),
            };
            Ok(Outcome::fail(format!(
                "text '{}' not found (minimum similarity {:.2}); {}",
                text, PRESENCE_SIMILARITY_MIN, closest
            )))
        }
        (None, false) => Ok(Outcome::pass("text is absent".to_string())),
    }
}

pub fn verify_order(before: &str, after: &str, document: &[char]) -> Result<Outcome> {
    let before_scan = search(before, document)?;
    let after_scan = search(after, document)?;

    let (before_match, after_match) = match (before_scan.first, after_scan.first) {
        (Some(before_match), Some(after_match)) => (before_match, after_match),
        (None, None) => {
            return Ok(Outcome::fail(format!(
                "neither 'before' text '{before}' nor 'after' text '{after}' was found"
            )));
        }
        (None, Some(_)) => {
            return Ok(Outcome::fail(format!("'before' text '{before}' was not found")));
        }
        (Some(_), None) => {
            return Ok(Outcome::fail(format!("'after' text '{after}' was not found")));
        }
    };

    if before_match.start < after_match.start {
        Ok(Outcome::pass(format!(
            "'before' at offset {} precedes 'after' at offset {}",
            before_match.start, after_match.start
        )))
    } else {
        Ok(Outcome::fail(format!(
            "'before' text '{}' first appears at offset {}, not before 'after' text '{}' at offset {}",
            before, before_match.start, after, after_match.start
        )))
    }
}
