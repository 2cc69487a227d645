use super::*;

/// An approximate occurrence of a needle inside a haystack, in char offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatch {
    pub start: usize,
    pub end: usize,
    pub distance: usize,
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyScan {
    /// Leftmost occurrence within the allowed distance.
    pub first: Option<FuzzyMatch>,
    /// Lowest distance anywhere, leftmost on ties.
    pub best: Option<FuzzyMatch>,
}

pub fn allowed_distance(needle_len: usize) -> usize {
    // epsilon keeps 10 chars at 0.9 from flooring to zero edits
    ((needle_len as f64) * (1.0 - PRESENCE_SIMILARITY_MIN) + 1e-9).floor() as usize
}

/// Semi-global edit distance: the needle must be consumed entirely, the
/// haystack may be entered and left anywhere. Each cell carries the haystack
/// offset its alignment started at.
pub fn scan(needle: &[char], haystack: &[char], max_distance: usize) -> FuzzyScan {
    let m = needle.len();
    if m == 0 {
        return FuzzyScan {
            first: None,
            best: None,
        };
    }

    let mut cost: Vec<usize> = (0..=m).collect();
    let mut start = vec![0_usize; m + 1];
    let mut next_cost = vec![0_usize; m + 1];
    let mut next_start = vec![0_usize; m + 1];

    let mut first = None;
    let mut best: Option<FuzzyMatch> = None;

    for (j, &hay_char) in haystack.iter().enumerate() {
        next_cost[0] = 0;
        next_start[0] = j + 1;

        for i in 1..=m {
            let substitution = cost[i - 1] + usize::from(needle[i - 1] != hay_char);
            let skip_haystack = cost[i] + 1;
            let skip_needle = next_cost[i - 1] + 1;

            let (value, origin) = if substitution <= skip_haystack && substitution <= skip_needle {
                (substitution, start[i - 1])
            } else if skip_needle <= skip_haystack {
                (skip_needle, next_start[i - 1])
            } else {
                (skip_haystack, start[i])
            };
            next_cost[i] = value;
            next_start[i] = origin;
        }

        std::mem::swap(&mut cost, &mut next_cost);
        std::mem::swap(&mut start, &mut next_start);

        let distance = cost[m];
        let candidate = FuzzyMatch {
            start: start[m],
            end: j + 1,
            distance,
            similarity: 1.0 - (distance as f64 / m as f64),
        };
        if first.is_none() && distance <= max_distance {
            first = Some(candidate);
        }
        if best.is_none_or(|current| distance < current.distance) {
            best = Some(candidate);
        }
    }

    FuzzyScan { first, best }
}

/// Scans a normalized document for `needle`, normalizing the needle first.
pub fn search(needle: &str, document: &[char]) -> Result<FuzzyScan> {
    let needle: Vec<char> = normalize_text(needle).chars().collect();
    if needle.is_empty() {
        bail!("search text is empty after normalization");
    }

    Ok(scan(&needle, document, allowed_distance(needle.len())))
}
