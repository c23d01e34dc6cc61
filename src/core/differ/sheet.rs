use std::collections::BTreeSet;

use crate::core::{cell_to_string, CellChange, Sheet, SheetChangeSet, Workbook};

/// Compare two workbooks sheet by sheet.
///
/// Rows and cells are paired by position and compared up to the shorter of
/// the two sides; rows or columns beyond that are not reported.
pub fn diff_workbooks(original: &Workbook, new: &Workbook) -> SheetChangeSet {
    let original_names: BTreeSet<&str> = original.sheet_names().into_iter().collect();
    let new_names: BTreeSet<&str> = new.sheet_names().into_iter().collect();

    let mut changes = SheetChangeSet {
        added_sheets: new_names.difference(&original_names).map(|s| s.to_string()).collect(),
        removed_sheets: original_names.difference(&new_names).map(|s| s.to_string()).collect(),
        ..Default::default()
    };

    for name in original_names.intersection(&new_names) {
        if let (Some(before), Some(after)) = (original.sheet(name), new.sheet(name)) {
            let cells = diff_sheet(before, after);
            if !cells.is_empty() {
                changes.details.insert(name.to_string(), cells);
            }
        }
    }

    changes
}

fn diff_sheet(original: &Sheet, new: &Sheet) -> Vec<CellChange> {
    let mut cells = Vec::new();

    for (row_index, (before_row, after_row)) in original.rows.iter().zip(&new.rows).enumerate() {
        for (col_index, (before, after)) in before_row.iter().zip(after_row).enumerate() {
            if before != after {
                cells.push(CellChange {
                    row: row_index as u32 + 1,
                    column: col_index as u32 + 1,
                    old_value: cell_to_string(before),
                    new_value: cell_to_string(after),
                });
            }
        }
    }

    cells
}
