use super::*;

static DISPLAY_DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("valid display math regex"));
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").expect("valid bracket math regex"));
static PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").expect("valid paren math regex"));
static ENVIRONMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\\begin\{(?:equation|align|gather|multline|eqnarray|displaymath)\*?\}(.+?)\\end\{(?:equation|align|gather|multline|eqnarray|displaymath)\*?\}",
    )
    .expect("valid math environment regex")
});
static INLINE_DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$\n]+?)\$").expect("valid inline math regex"));

static SIZING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:left|right|bigl|bigr|Bigl|Bigr|biggl|biggr|big|Big|bigg|Bigg|displaystyle|textstyle|scriptstyle)\b")
        .expect("valid sizing regex")
});
static SPACING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:qquad|quad)\b|\\[,;:! ]|~").expect("valid spacing regex")
});
static TEXT_WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:mathrm|text|textrm|mathit|operatorname)\s*\{([^{}]*)\}")
        .expect("valid text wrapper regex")
});
static FRAC_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:dfrac|tfrac)\b").expect("valid frac alias regex"));
static SINGLE_TOKEN_BRACES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([_^])\{([A-Za-z0-9])\}").expect("valid single token regex")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const SYMBOL_ALIASES: &[(&str, &str)] = &[
    (r"\le", r"\leq"),
    (r"\ge", r"\geq"),
    (r"\ne", r"\neq"),
    (r"\to", r"\rightarrow"),
    (r"\gets", r"\leftarrow"),
];

/// Contents of every delimited math span, display forms first.
pub fn extract_math_segments(document: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut remainder = document.to_string();

    for pattern in [&*ENVIRONMENT_RE, &*DISPLAY_DOLLAR_RE, &*BRACKET_RE, &*PAREN_RE] {
        segments.extend(
            pattern
                .captures_iter(&remainder)
                .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string())),
        );
        remainder = pattern.replace_all(&remainder, " ").into_owned();
    }

    segments.extend(
        INLINE_DOLLAR_RE
            .captures_iter(&remainder)
            .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string())),
    );

    segments
        .into_iter()
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

fn replace_command_alias(latex: &str, alias: &str, canonical: &str) -> String {
    let mut output = String::with_capacity(latex.len());
    let mut rest = latex;

    while let Some(position) = rest.find(alias) {
        output.push_str(&rest[..position]);
        let after = &rest[position + alias.len()..];
        let continues_name = after.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if continues_name {
            output.push_str(alias);
        } else {
            output.push_str(canonical);
        }
        rest = after;
    }
    output.push_str(rest);
    output
}

/// Spacing- and formatting-insensitive form of a LaTeX expression.
pub fn normalize_latex(latex: &str) -> String {
    let mut normalized = SIZING_RE.replace_all(latex, "").into_owned();
    normalized = SPACING_RE.replace_all(&normalized, "").into_owned();
    normalized = TEXT_WRAPPER_RE.replace_all(&normalized, "$1").into_owned();
    normalized = FRAC_ALIAS_RE.replace_all(&normalized, r"\frac").into_owned();
    for (alias, canonical) in SYMBOL_ALIASES {
        normalized = replace_command_alias(&normalized, alias, canonical);
    }
    normalized = WHITESPACE_RE.replace_all(&normalized, "").into_owned();
    normalized = SINGLE_TOKEN_BRACES_RE
        .replace_all(&normalized, "$1$2")
        .into_owned();

    normalized
        .trim_matches(|c: char| c == '.' || c == ',')
        .to_string()
}

pub fn verify_math(expected: &str, document: &str) -> Result<Outcome> {
    let target = normalize_latex(expected.trim().trim_matches('$'));
    if target.is_empty() {
        bail!("math expression is empty after normalization");
    }

    let segments = extract_math_segments(document);
    if segments.is_empty() {
        return Ok(Outcome::fail(format!(
            "no math expressions found in document (expected '{expected}')"
        )));
    }

    let mut best: Option<(f64, &str)> = None;
    for segment in &segments {
        let candidate = normalize_latex(segment);
        if candidate.contains(&target) {
            return Ok(Outcome::pass(format!("matched math expression '{}'", segment.trim())));
        }

        let similarity = strsim::normalized_levenshtein(&candidate, &target);
        if best.is_none_or(|(current, _)| similarity > current) {
            best = Some((similarity, segment.as_str()));
        }
    }

    let (similarity, closest) = best.unwrap_or((0.0, ""));
    Ok(Outcome::fail(format!(
        "math '{}' not found among {} expression(s); best partial match '{}' (similarity {:.2})",
        expected,
        segments.len(),
        closest.trim(),
        similarity
    )))
}
