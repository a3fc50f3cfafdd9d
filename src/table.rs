//! Read delimited text files into a column table.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// Errors while reading a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The file could not be read.
    #[error("failed to read table {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Only UTF-8 input is supported; convert other encodings first.
    #[error("{path} is not valid UTF-8 (invalid byte at offset {offset}); convert it to UTF-8 first")]
    NotUtf8 { path: PathBuf, offset: usize },
    /// The file has no header row.
    #[error("table has no header row")]
    Empty,
    /// A record has a different number of fields than the header.
    #[error("line {line}: expected {expected} fields, found {actual}")]
    RaggedRow {
        line: usize,
        expected: usize,
        actual: usize,
    },
    /// A quoted field is never closed.
    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },
}

/// One named column. Raw cell text is always kept, the parsed values only when
/// every cell is a number.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<String>,
    pub numbers: Option<Vec<f64>>,
}

impl Column {
    /// Build a column, inferring whether it is numeric.
    pub fn new(name: impl Into<String>, cells: Vec<String>) -> Self {
        let numbers = if cells.is_empty() {
            None
        } else {
            cells
                .iter()
                .map(|cell| cell.parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()
        };
        Self {
            name: name.into(),
            cells,
            numbers,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numbers.is_some()
    }

    /// Whether every cell in the column is distinct.
    pub fn has_unique_values(&self) -> bool {
        let mut sorted: Vec<&str> = self.cells.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.windows(2).all(|pair| pair[0] != pair[1])
    }
}

/// Columns of equal length, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let rows = columns.first().map_or(0, |c| c.cells.len());
        debug_assert!(columns.iter().all(|c| c.cells.len() == rows));
        Self { columns, rows }
    }

    /// Read a delimited UTF-8 file with a header row. A leading byte order mark is ignored.
    pub fn read(path: &Path, delimiter: char) -> Result<Self, TableError> {
        let bytes = fs::read(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|err| TableError::NotUtf8 {
            path: path.to_path_buf(),
            offset: err.utf8_error().valid_up_to(),
        })?;
        let table = Self::parse(&text, delimiter)?;
        debug!(
            "read {} rows, {} columns from {}",
            table.rows,
            table.columns.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse delimited text with a header row.
    pub fn parse(text: &str, delimiter: char) -> Result<Self, TableError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header) = lines.next().ok_or(TableError::Empty)?;
        let names = split_record(header, delimiter, header_line)?;
        if names.is_empty() {
            return Err(TableError::Empty);
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
        for (line, record) in lines {
            let fields = split_record(record, delimiter, line)?;
            if fields.len() != names.len() {
                return Err(TableError::RaggedRow {
                    line,
                    expected: names.len(),
                    actual: fields.len(),
                });
            }
            for (column, field) in cells.iter_mut().zip(fields) {
                column.push(field);
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();
        Ok(Self::from_columns(columns))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Find a column by its header name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric columns, left to right.
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    /// Non-numeric columns, left to right.
    pub fn text_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.is_numeric()).collect()
    }
}

/// Split one record, honouring double quotes (`""` escapes a quote).
fn split_record(record: &str, delimiter: char, line: usize) -> Result<Vec<String>, TableError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            quoted = true;
            was_quoted = true;
        } else if c == delimiter {
            fields.push(finish_field(&mut field, was_quoted));
            was_quoted = false;
        } else if !was_quoted {
            field.push(c);
        }
    }
    if quoted {
        return Err(TableError::UnterminatedQuote { line });
    }
    fields.push(finish_field(&mut field, was_quoted));
    Ok(fields)
}

fn finish_field(field: &mut String, was_quoted: bool) -> String {
    let value = if was_quoted {
        field.clone()
    } else {
        field.trim().to_string()
    };
    field.clear();
    value
}
