use std::{borrow::Cow, fmt};

/// Cells wider than this are clipped with a trailing ellipsis.
pub const MAX_CELL_WIDTH: usize = 48;

/// A plain-text table for terminal output.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(headers: &[String], rows: Vec<Vec<String>>) -> Self {
        let mut table = Self::new(headers.iter().cloned());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Appends a row, padding or cutting it to the header width.
    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells = row
            .into_iter()
            .take(self.headers.len())
            .map(Into::into)
            .collect::<Vec<String>>();
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn print(&self) {
        print!("{self}");
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = self
            .headers
            .iter()
            .map(|header| display_cell(header).chars().count())
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(display_cell(cell).chars().count());
            }
        }
        widths.into_iter().map(|width| width.max(3)).collect()
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();
        writeln!(f, "{}", format_line(&self.headers, &widths))?;
        let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
        writeln!(f, "{}", format_line(&separator, &widths))?;
        for row in &self.rows {
            writeln!(f, "{}", format_line(row, &widths))?;
        }
        Ok(())
    }
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", display_cell(cell), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

/// Flattens control whitespace and clips long values.
fn display_cell(value: &str) -> Cow<'_, str> {
    let flattened = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    match flattened.char_indices().nth(MAX_CELL_WIDTH - 1) {
        Some((cut, _)) if flattened.chars().count() > MAX_CELL_WIDTH => {
            Cow::Owned(format!("{}…", &flattened[..cut]))
        }
        _ => flattened,
    }
}
