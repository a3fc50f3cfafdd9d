//! Select or create unique row identifiers.

use log::debug;

use crate::table::{Column, Table};

/// Determine a unique string identifier for every row.
///
/// In priority order:
/// - the left-most text column, if each value is unique
/// - the left-most numeric column, if each value is unique
/// - the sequence `0..rows`
pub fn select_or_create_identifiers(table: &Table) -> Vec<String> {
    if let Some(column) = first_unique(&table.text_columns()) {
        debug!("identifiers from text column `{}`", column.name);
        return column.cells.clone();
    }
    if let Some(column) = first_unique(&table.numeric_columns()) {
        debug!("identifiers from numeric column `{}`", column.name);
        return column.cells.clone();
    }
    debug!("identifiers from a numeric sequence");
    numeric_sequence(table.rows())
}

/// `"0"`, `"1"`, ... `"rows - 1"`.
pub fn numeric_sequence(rows: usize) -> Vec<String> {
    (0..rows).map(|i| i.to_string()).collect()
}

fn first_unique<'a>(columns: &[&'a Column]) -> Option<&'a Column> {
    columns.first().copied().filter(|c| c.has_unique_values())
}

#[cfg(test)]
mod test {
    use super::{numeric_sequence, select_or_create_identifiers};
    use crate::table::{Column, Table};

    const ROWS: usize = 7;

    enum Kind {
        UniqueString,
        UniqueInt,
        DuplicateString,
        DuplicateInt,
    }

    fn column(index: usize, kind: &Kind) -> Column {
        let cells = (0..ROWS)
            .map(|i| match kind {
                Kind::UniqueString => format!("s{i}"),
                Kind::UniqueInt => i.to_string(),
                Kind::DuplicateString => "a".to_string(),
                Kind::DuplicateInt => "2".to_string(),
            })
            .collect();
        Column::new(format!("column{index}"), cells)
    }

    fn table(kinds: &[Kind]) -> Table {
        Table::from_columns(
            kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| column(i, kind))
                .collect(),
        )
    }

    #[test]
    fn test_unique_string() {
        let ids = select_or_create_identifiers(&table(&[Kind::UniqueInt, Kind::UniqueString]));
        assert_eq!(ids, column(1, &Kind::UniqueString).cells);
    }

    #[test]
    fn test_duplicated_string_without_int() {
        let ids = select_or_create_identifiers(&table(&[Kind::DuplicateString]));
        assert_eq!(ids, numeric_sequence(ROWS));
    }

    #[test]
    fn test_duplicated_string_and_duplicated_int() {
        let ids =
            select_or_create_identifiers(&table(&[Kind::DuplicateString, Kind::DuplicateInt]));
        assert_eq!(ids, numeric_sequence(ROWS));
    }

    #[test]
    fn test_duplicated_string_and_unique_int() {
        let ids = select_or_create_identifiers(&table(&[Kind::DuplicateString, Kind::UniqueInt]));
        assert_eq!(ids, column(1, &Kind::UniqueInt).cells);
    }

    #[test]
    fn test_only_leftmost_column_is_considered() {
        let ids = select_or_create_identifiers(&table(&[
            Kind::DuplicateString,
            Kind::UniqueString,
            Kind::DuplicateInt,
            Kind::UniqueInt,
        ]));
        assert_eq!(ids, numeric_sequence(ROWS));
    }
}
