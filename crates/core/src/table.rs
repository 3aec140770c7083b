//! Parser for the fixed-width column reports kubectl prints (`api-resources -o wide` and friends).
//!
//! Column boundaries come from the start offsets of the header's field names;
//! the final column consumes the remainder of the line. A row whose cells do
//! not line up with those boundaries (a cell straddling one, as happens with
//! hand-edited or re-spaced output) is re-read cell by cell instead: cells are
//! matched to columns in order, leaving blank only columns the caller declared
//! as blankable, choosing the placement closest to the header offsets.
//!
//! A `[...]` group is always a single cell, so bracketed lists may contain spaces.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Lower-cased header name.
    pub name: String,
    /// Char offset of the name in the header line.
    pub start: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: BTreeMap<String, String>,
}

impl Row {
    /// Trimmed cell text; blank cells and unknown columns read as `""`.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(&column.to_ascii_lowercase()).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn has_column(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.columns.iter().any(|c| c.name == name)
    }
}

/// Without `blankable`, any column may be empty.
#[derive(Debug, Clone, Default)]
pub struct TableParser {
    blankable: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    start: usize,
    end: usize,
}

impl TableParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns that may legitimately be empty in a row.
    pub fn blankable(mut self, columns: &[&str]) -> Self {
        self.blankable = Some(columns.iter().map(|c| c.to_ascii_lowercase()).collect());
        self
    }

    /// Parse header + rows. Empty input yields an empty table; rows that cannot be
    /// matched to the header are skipped.
    pub fn parse(&self, raw: &str) -> Table {
        let mut lines = raw.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else { return Table::default() };
        let header: Vec<char> = header.chars().collect();
        let columns: Vec<Column> = split_cells(&header)
            .into_iter()
            .map(|c| Column { name: header[c.start..c.end].iter().collect::<String>().to_ascii_lowercase(), start: c.start })
            .collect();
        if columns.is_empty() {
            return Table::default();
        }

        let rows = lines
            .filter_map(|line| {
                let chars: Vec<char> = line.chars().collect();
                let cells = split_cells(&chars);
                let aligned = is_aligned(&cells, &columns).then(|| by_offsets(&chars, &columns));
                let values = match aligned {
                    Some(values) if self.complete(&values, &columns) => Some(values),
                    _ => self.by_cells(&chars, &cells, &columns).filter(|v| self.complete(v, &columns)),
                };
                values.map(|values| Row { cells: columns.iter().map(|c| c.name.clone()).zip(values).collect() })
            })
            .collect();
        Table { columns, rows }
    }

    fn blank_ok(&self, column: &Column) -> bool {
        self.blankable.as_ref().map(|b| b.contains(&column.name)).unwrap_or(true)
    }

    fn complete(&self, values: &[String], columns: &[Column]) -> bool {
        values.iter().zip(columns).all(|(v, c)| !v.is_empty() || self.blank_ok(c))
    }

    fn by_cells(&self, chars: &[char], cells: &[Cell], columns: &[Column]) -> Option<Vec<String>> {
        let n = cells.len();
        let m = columns.len();
        if n == 0 {
            return None;
        }
        if n >= m {
            // Positional; surplus cells fold into the last column.
            let mut out: Vec<String> = cells[..m - 1].iter().map(|c| text(chars, c.start, c.end)).collect();
            out.push(text(chars, cells[m - 1].start, chars.len()));
            return Some(out);
        }

        // cost[i][j]: best placement of the first i cells onto the first j columns.
        const INF: usize = usize::MAX;
        let mut cost = vec![vec![INF; m + 1]; n + 1];
        let mut took = vec![vec![false; m + 1]; n + 1];
        cost[0][0] = 0;
        for j in 1..=m {
            let blank_ok = self.blank_ok(&columns[j - 1]);
            for i in 0..=n.min(j) {
                if i > 0 && cost[i - 1][j - 1] != INF {
                    cost[i][j] = cost[i - 1][j - 1] + cells[i - 1].start.abs_diff(columns[j - 1].start);
                    took[i][j] = true;
                }
                if blank_ok && cost[i][j - 1] < cost[i][j] {
                    cost[i][j] = cost[i][j - 1];
                    took[i][j] = false;
                }
            }
        }
        if cost[n][m] == INF {
            return None;
        }

        let mut out = vec![String::new(); m];
        let (mut i, mut j) = (n, m);
        while j > 0 {
            if took[i][j] {
                let end = if j == m { chars.len() } else { cells[i - 1].end };
                out[j - 1] = text(chars, cells[i - 1].start, end);
                i -= 1;
            }
            j -= 1;
        }
        Some(out)
    }
}

fn text(chars: &[char], start: usize, end: usize) -> String {
    chars[start.min(chars.len())..end.min(chars.len())].iter().collect::<String>().trim().to_string()
}

/// Whitespace-separated cells; a `[` opens a cell that runs to the matching `]`.
fn split_cells(chars: &[char]) -> Vec<Cell> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let mut depth = 0usize;
        while i < chars.len() {
            match chars[i] {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                c if c.is_whitespace() && depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
        out.push(Cell { start, end: i });
    }
    out
}

fn span(columns: &[Column], idx: usize) -> (usize, usize) {
    let start = columns[idx].start;
    let end = columns.get(idx + 1).map(|c| c.start).unwrap_or(usize::MAX);
    (start, end)
}

fn is_aligned(cells: &[Cell], columns: &[Column]) -> bool {
    cells.iter().all(|cell| {
        (0..columns.len()).any(|idx| {
            let (start, end) = span(columns, idx);
            cell.start >= start && cell.end <= end
        })
    })
}

fn by_offsets(chars: &[char], columns: &[Column]) -> Vec<String> {
    (0..columns.len())
        .map(|idx| {
            let (start, end) = span(columns, idx);
            text(chars, start, end)
        })
        .collect()
}
