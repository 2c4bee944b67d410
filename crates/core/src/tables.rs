//! Loaders for the category-path table and the labeled-example table.
//!
//! JSON files are always supported. Spreadsheets (`.xlsx`, `.xls`, `.ods`)
//! need the `xlsx` feature; their first row is a header and is skipped,
//! as are fully blank rows.

use crate::error::TableError;
use crate::models::{CategoryPath, ExampleTable};
use std::path::Path;

pub fn load_taxonomy(path: &Path, sheet: Option<&str>) -> Result<Vec<CategoryPath>, TableError> {
    match extension(path).as_str() {
        "json" => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xlsm" | "xls" | "ods" => workbook::taxonomy(path, sheet),
        other => {
            let _ = sheet;
            Err(TableError::UnsupportedFormat(other.to_string()))
        }
    }
}

pub fn load_examples(path: &Path, sheet: Option<&str>) -> Result<ExampleTable, TableError> {
    match extension(path).as_str() {
        "json" => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xlsm" | "xls" | "ods" => workbook::examples(path, sheet),
        other => {
            let _ = sheet;
            Err(TableError::UnsupportedFormat(other.to_string()))
        }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

#[cfg(feature = "xlsx")]
mod workbook {
    use crate::error::TableError;
    use crate::models::{CategoryPath, ExampleTable, LabeledExample};
    use calamine::{open_workbook_auto, DataType, Range, Reader};
    use std::path::Path;

    pub(super) fn taxonomy(
        path: &Path,
        sheet: Option<&str>,
    ) -> Result<Vec<CategoryPath>, TableError> {
        let range = read_sheet(path, sheet)?;
        Ok(range
            .rows()
            .skip(1)
            .map(|row| row.iter().map(cell_text).collect::<CategoryPath>())
            .filter(|row| row.iter().any(Option::is_some))
            .collect())
    }

    pub(super) fn examples(path: &Path, sheet: Option<&str>) -> Result<ExampleTable, TableError> {
        let range = read_sheet(path, sheet)?;
        let mut rows = Vec::new();
        for (i, row) in range.rows().enumerate().skip(1) {
            if row.iter().all(|c| cell_text(c).is_none()) {
                continue;
            }
            let text = required_text(row, i, 0)?;
            let label = required_text(row, i, 1)?;
            let class_code = match row.get(2) {
                Some(DataType::Int(v)) => *v,
                Some(DataType::Float(v)) if v.fract() == 0.0 => *v as i64,
                Some(DataType::String(s)) => s.trim().parse().map_err(|_| TableError::BadCell {
                    row: i,
                    column: 2,
                    reason: format!("class code {s:?} is not an integer"),
                })?,
                _ => {
                    return Err(TableError::BadCell {
                        row: i,
                        column: 2,
                        reason: "missing class code".into(),
                    })
                }
            };
            rows.push(LabeledExample::new(text, label, class_code));
        }
        Ok(ExampleTable::new(rows))
    }

    fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<Range<DataType>, TableError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| TableError::Workbook(e.to_string()))?;
        let range = match sheet {
            Some(name) => workbook
                .worksheet_range(name)
                .ok_or_else(|| TableError::MissingSheet(name.to_string()))?,
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| TableError::MissingSheet("#0".to_string()))?,
        };
        range.map_err(|e| TableError::Workbook(e.to_string()))
    }

    fn cell_text(cell: &DataType) -> Option<String> {
        let text = match cell {
            DataType::String(s) => s.trim().to_string(),
            DataType::Int(v) => v.to_string(),
            DataType::Float(v) if v.fract() == 0.0 => (*v as i64).to_string(),
            DataType::Float(v) => v.to_string(),
            DataType::Bool(v) => v.to_string(),
            _ => String::new(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn required_text(row: &[DataType], i: usize, column: usize) -> Result<String, TableError> {
        row.get(column)
            .and_then(cell_text)
            .ok_or_else(|| TableError::BadCell {
                row: i,
                column,
                reason: "empty cell".into(),
            })
    }
}
