//! Record Extractor Module
//!
//! 先頭行を見出しとし、以降の各行を`Record`へ変換するモジュール。
//! 1列目がキー、2列目が名前、3列目以降が見出しに対応付けられたフィールドです。

use std::io::Read;
use std::sync::Arc;

use crate::error::SourceReadError;
use crate::normalize::normalize;
use crate::parser::WorkbookParser;
use crate::types::{FieldMap, Record, RecordBatch, SheetCells};

/// セルグリッドからレコードを抽出する
///
/// # 抽出規則
///
/// 1. 1行目の各セルを正規化して見出し`H[1..n]`とする。列数`n`は最後の空でない見出しまで
/// 2. 2行目以降は列`1..n`を正規化する（存在しないセルは空）。`n`より右のセルは無視する
/// 3. すべての値が`""`の行はスキップする
/// 4. `{ key: v[1], name: v[2], fields: { H[i] -> v[i] | i >= 3 } }`を行順に追加する
///
/// # 引数
///
/// * `cells` - 先頭ワークシートのセルグリッド
///
/// # 戻り値
///
/// 見出しと行順のレコードを持つ`RecordBatch`
pub fn extract(cells: &SheetCells) -> RecordBatch {
    if cells.height() == 0 {
        return RecordBatch::default();
    }

    let mut headers: Vec<String> = (0..cells.row_width(0))
        .map(|col| normalize(cells.cell(0, col)))
        .collect();
    while headers.last().is_some_and(|h| h.is_empty()) {
        headers.pop();
    }

    let width = headers.len();
    let field_names: Arc<[String]> = headers.iter().skip(2).cloned().collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in 1..cells.height() {
        let mut values: Vec<String> = (0..width).map(|col| normalize(cells.cell(row, col))).collect();
        if values.iter().all(|v| v.is_empty()) {
            skipped += 1;
            continue;
        }

        // 見出しが2列未満でも、キーと名前は常に存在する
        values.resize(width.max(2), String::new());
        let fields = values.split_off(2);
        let name = values.pop().unwrap_or_default();
        let key = values.pop().unwrap_or_default();

        records.push(Record {
            key,
            name,
            fields: FieldMap::new(Arc::clone(&field_names), fields),
        });
    }

    tracing::debug!(
        columns = width,
        records = records.len(),
        skipped_empty_rows = skipped,
        "records extracted"
    );

    RecordBatch { headers, records }
}

/// スプレッドシートのバイト列を開いてレコードを抽出する
///
/// # 引数
///
/// * `reader` - スプレッドシートを読み込むためのリーダー（xlsx, xlsm, xlsb, xls, ods）
///
/// # 戻り値
///
/// * `Ok(RecordBatch)` - 抽出に成功した場合
/// * `Err(SourceReadError)` - 読めない、破損している、またはサポート外の形式である場合
///
/// # 使用例
///
/// ```rust,no_run
/// use gradesheet::extract_from_reader;
/// use std::fs::File;
///
/// # fn main() -> Result<(), gradesheet::SourceReadError> {
/// let batch = extract_from_reader(File::open("grades.xlsx")?)?;
/// for record in &batch.records {
///     println!("{} {}", record.key, record.name);
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_from_reader<R: Read>(reader: R) -> Result<RecordBatch, SourceReadError> {
    let mut parser = WorkbookParser::open(reader)?;
    let cells = parser.first_sheet_cells()?;
    Ok(extract(&cells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawCell, RichTextRun, ScalarValue};

    fn row(values: &[&str]) -> Vec<RawCell> {
        values
            .iter()
            .map(|v| {
                if v.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::text(*v)
                }
            })
            .collect()
    }

    fn sheet(rows: Vec<Vec<RawCell>>) -> SheetCells {
        SheetCells::from_rows(rows)
    }

    #[test]
    fn test_basic_extraction() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101", "102"]),
            row(&["S1", "Alice", "A+", "B"]),
        ]);
        let batch = extract(&cells);

        assert_eq!(batch.headers, vec!["RegNo", "Name", "101", "102"]);
        assert_eq!(batch.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.key, "S1");
        assert_eq!(record.name, "Alice");
        let fields: Vec<_> = record.fields.iter().collect();
        assert_eq!(fields, vec![("101", "A+"), ("102", "B")]);
    }

    #[test]
    fn test_empty_rows_excluded() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101", "102"]),
            row(&["", "", "", ""]),
            vec![RawCell::text("   "), RawCell::Empty],
            row(&["S2", "Bob", "O", "A"]),
        ]);
        let batch = extract(&cells);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].key, "S2");
    }

    #[test]
    fn test_short_row_padded_and_long_row_truncated() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101", "102"]),
            row(&["S1", "Alice"]),
            row(&["S2", "Bob", "A", "B", "extra"]),
        ]);
        let batch = extract(&cells);

        assert_eq!(batch.records[0].fields.values(), &["", ""]);
        assert_eq!(batch.records[1].fields.values(), &["A", "B"]);
    }

    #[test]
    fn test_trailing_empty_headers_ignored() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101", "", ""]),
            row(&["S1", "Alice", "A", "", "stray"]),
        ]);
        let batch = extract(&cells);
        assert_eq!(batch.headers.len(), 3);
        assert_eq!(batch.records[0].fields.len(), 1);
    }

    #[test]
    fn test_row_with_only_trailing_stray_value_is_empty() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101"]),
            row(&["", "", "", "stray"]),
        ]);
        assert!(extract(&cells).is_empty());
    }

    #[test]
    fn test_field_names_shared_across_records() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101"]),
            row(&["S1", "Alice", "A"]),
            row(&["S2", "Bob", "B"]),
        ]);
        let batch = extract(&cells);
        let first = batch.records[0].fields.names();
        let second = batch.records[1].fields.names();
        assert!(Arc::ptr_eq(first, second));
    }

    #[test]
    fn test_mixed_cell_shapes() {
        let cells = sheet(vec![
            row(&["RegNo", "Name", "101"]),
            vec![
                RawCell::Scalar(ScalarValue::Number(921722104001.0)),
                RawCell::RichText(vec![RichTextRun::plain("Al"), RichTextRun::plain("ice")]),
                RawCell::FormulaResult {
                    formula: "B1".to_string(),
                    cached: Some(ScalarValue::String("A+".to_string())),
                },
            ],
        ]);
        let batch = extract(&cells);
        assert_eq!(batch.records[0].key, "921722104001");
        assert_eq!(batch.records[0].name, "Alice");
        assert_eq!(batch.records[0].fields.get("101"), Some("A+"));
    }

    #[test]
    fn test_empty_sheet() {
        let batch = extract(&SheetCells::default());
        assert!(batch.headers.is_empty());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_header_only_one_column() {
        let cells = sheet(vec![row(&["RegNo"]), row(&["S1"])]);
        let batch = extract(&cells);
        assert_eq!(batch.records[0].key, "S1");
        assert_eq!(batch.records[0].name, "");
        assert!(batch.records[0].fields.is_empty());
    }
}
