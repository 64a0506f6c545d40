/// A line that can take part in a table: it carries at least one `|`.
pub fn is_row(trimmed: &str) -> bool {
    trimmed.contains('|')
}

/// Whether `trimmed` can sit under a header row as its separator.
///
/// A `|`-prefixed line only needs a dash in it. Without the leading pipe the
/// line has to be a pure delimiter row such as `-|-` or `:--|--:`.
pub fn is_separator(trimmed: &str) -> bool {
    if !trimmed.contains('-') || !trimmed.contains('|') {
        return false;
    }
    trimmed.starts_with('|')
        || trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':') || c.is_whitespace())
}

/// Split one row into trimmed cells, dropping a single outer pipe on each side.
pub fn split_row(row: &str) -> Vec<String> {
    let row = row.trim();
    let row = row.strip_prefix('|').unwrap_or(row);
    let row = row.strip_suffix('|').unwrap_or(row);
    row.split('|').map(|cell| cell.trim().to_string()).collect()
}
