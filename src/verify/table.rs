use super::*;

const MAX_SPAN: usize = 64;

static MARKDOWN_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?\s*:?-{2,}:?\s*(\|\s*:?-{2,}:?\s*)*\|?$").expect("valid separator regex")
});
static HTML_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("valid html table regex")
});
static HTML_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid html row regex"));
static HTML_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<t[dh]\b([^>]*)>(.*?)</t[dh]\s*>").expect("valid html cell regex")
});
static COLSPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)colspan\s*=\s*["']?(\d+)"#).expect("valid colspan regex")
});
static ROWSPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)rowspan\s*=\s*["']?(\d+)"#).expect("valid rowspan regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));

/// Rows of cell text; rows may have different lengths.
pub type TableGrid = Vec<Vec<String>>;

pub fn parse_tables(document: &str) -> Vec<TableGrid> {
    let mut tables = parse_markdown_tables(document);
    tables.extend(parse_html_tables(document));
    tables
}

fn split_markdown_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn markdown_block_to_table(block: &[&str]) -> Option<TableGrid> {
    let has_separator = block
        .iter()
        .any(|line| MARKDOWN_SEPARATOR_RE.is_match(line.trim()));
    let all_piped = block.iter().all(|line| line.trim_start().starts_with('|'));
    if !has_separator && !all_piped {
        return None;
    }

    let rows: TableGrid = block
        .iter()
        .filter(|line| !MARKDOWN_SEPARATOR_RE.is_match(line.trim()))
        .map(|line| split_markdown_cells(line))
        .collect();
    let header_only = rows.len() == 1 && rows[0].len() > 1 && has_separator;
    (rows.len() >= 2 || header_only).then_some(rows)
}

fn parse_markdown_tables(document: &str) -> Vec<TableGrid> {
    let mut tables = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in document.lines() {
        if line.contains('|') {
            block.push(line);
            continue;
        }
        if !block.is_empty() {
            tables.extend(markdown_block_to_table(&block));
            block.clear();
        }
    }
    if !block.is_empty() {
        tables.extend(markdown_block_to_table(&block));
    }

    tables
}

fn span_attribute(attributes: &str, pattern: &Regex) -> usize {
    pattern
        .captures(attributes)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

fn html_cell_text(raw: &str) -> String {
    let text = TAG_RE.replace_all(raw, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_html_tables(document: &str) -> Vec<TableGrid> {
    let mut tables = Vec::new();

    for table in HTML_TABLE_RE.captures_iter(document) {
        let body = table.get(1).map(|m| m.as_str()).unwrap_or_default();
        let mut grid: Vec<Vec<Option<String>>> = Vec::new();

        for (row_index, row) in HTML_ROW_RE.captures_iter(body).enumerate() {
            let row_body = row.get(1).map(|m| m.as_str()).unwrap_or_default();
            if grid.len() <= row_index {
                grid.resize(row_index + 1, Vec::new());
            }

            let mut column = 0;
            for cell in HTML_CELL_RE.captures_iter(row_body) {
                let attributes = cell.get(1).map(|m| m.as_str()).unwrap_or_default();
                let text = html_cell_text(cell.get(2).map(|m| m.as_str()).unwrap_or_default());
                let colspan = span_attribute(attributes, &COLSPAN_RE);
                let rowspan = span_attribute(attributes, &ROWSPAN_RE);

                while grid[row_index].get(column).is_some_and(Option::is_some) {
                    column += 1;
                }

                for target_row in row_index..row_index + rowspan {
                    if grid.len() <= target_row {
                        grid.resize(target_row + 1, Vec::new());
                    }
                    let cells = &mut grid[target_row];
                    if cells.len() < column + colspan {
                        cells.resize(column + colspan, None);
                    }
                    for slot in &mut cells[column..column + colspan] {
                        *slot = Some(text.clone());
                    }
                }
                column += colspan;
            }
        }

        let rows: TableGrid = grid
            .into_iter()
            .map(|row| row.into_iter().map(Option::unwrap_or_default).collect::<Vec<_>>())
            .filter(|row: &Vec<String>| !row.is_empty())
            .collect();
        if !rows.is_empty() {
            tables.push(rows);
        }
    }

    tables
}

pub fn cell_matches(actual: &str, expected: &str) -> bool {
    let actual = normalize_text(actual);
    let expected = normalize_text(expected);
    if actual == expected {
        return true;
    }

    let longest = actual.chars().count().max(expected.chars().count());
    if longest == 0 {
        return false;
    }
    let similarity = 1.0 - strsim::levenshtein(&actual, &expected) as f64 / longest as f64;
    similarity >= TABLE_CELL_SIMILARITY_MIN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Up,
    Down,
    Left,
    Right,
    TopHeading,
    LeftHeading,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::TopHeading => "top_heading",
            Self::LeftHeading => "left_heading",
        }
    }

    fn lookup(self, grid: &TableGrid, row: usize, column: usize) -> Option<&str> {
        let at = |r: usize, c: usize| grid.get(r).and_then(|cells| cells.get(c)).map(String::as_str);
        match self {
            Self::Up => row.checked_sub(1).and_then(|r| at(r, column)),
            Self::Down => at(row + 1, column),
            Self::Left => column.checked_sub(1).and_then(|c| at(row, c)),
            Self::Right => at(row, column + 1),
            Self::TopHeading if row > 0 => at(0, column),
            Self::LeftHeading if column > 0 => at(row, 0),
            Self::TopHeading | Self::LeftHeading => None,
        }
    }
}

pub struct TableExpectation<'a> {
    pub cell: &'a str,
    pub relations: Vec<(Relation, &'a str)>,
}

pub fn verify_table(expectation: &TableExpectation<'_>, document: &str) -> Result<Outcome> {
    let tables = parse_tables(document);
    if tables.is_empty() {
        return Ok(Outcome::fail("no table found in document".to_string()));
    }

    let mut cell_found = false;
    // (satisfied count, explanation) of the closest miss
    let mut closest: Option<(usize, String)> = None;

    for (table_index, grid) in tables.iter().enumerate() {
        for (row, cells) in grid.iter().enumerate() {
            for (column, actual) in cells.iter().enumerate() {
                if !cell_matches(actual, expectation.cell) {
                    continue;
                }
                cell_found = true;

                let mut satisfied = 0;
                let mut first_miss = None;
                for (relation, expected) in &expectation.relations {
                    match relation.lookup(grid, row, column) {
                        Some(neighbor) if cell_matches(neighbor, expected) => satisfied += 1,
                        Some(neighbor) => {
                            first_miss.get_or_insert_with(|| {
                                format!(
                                    "cell '{}' found but {} neighbor is '{}' (expected '{}')",
                                    expectation.cell,
                                    relation.as_str(),
                                    neighbor,
                                    expected
                                )
                            });
                        }
                        None => {
                            first_miss.get_or_insert_with(|| {
                                format!(
                                    "cell '{}' found but has no {} neighbor (expected '{}')",
                                    expectation.cell,
                                    relation.as_str(),
                                    expected
                                )
                            });
                        }
                    }
                }

                match first_miss {
                    None => {
                        return Ok(Outcome::pass(format!(
                            "cell matched in table {} at row {}, column {}",
                            table_index + 1,
                            row + 1,
                            column + 1
                        )));
                    }
                    Some(explanation) => {
                        if closest.as_ref().is_none_or(|(best, _)| satisfied > *best) {
                            closest = Some((satisfied, explanation));
                        }
                    }
                }
            }
        }
    }

    if !cell_found {
        return Ok(Outcome::fail(format!(
            "cell '{}' not found in any of {} table(s)",
            expectation.cell,
            tables.len()
        )));
    }

    let explanation = closest
        .map(|(_, explanation)| explanation)
        .unwrap_or_else(|| format!("cell '{}' relations did not hold", expectation.cell));
    Ok(Outcome::fail(explanation))
}
