//! Workbook Parser Module
//!
//! calamineを使用したスプレッドシート解析の実装。
//! 先頭ワークシートのセルを、絶対座標でアドレス可能な`SheetCells`へ変換します。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read};

use crate::error::SourceReadError;
use crate::normalize::{normalize, EPOCH_1904_OFFSET_DAYS};
use crate::parser::XlsxMetadata;
use crate::security::SecurityConfig;
use crate::types::{RawCell, ScalarValue, SheetCells};

/// ZIPアーカイブ（XLSX/ODS）のシグネチャ
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// ワークブックパーサー
///
/// calamineのラッパーとして、形式を自動判別してワークブックを開きます
/// （xlsx, xlsm, xlsb, xls, ods）。XLSXの場合は`XlsxMetadata`も統合し、
/// calamineが平坦化してしまうリッチテキストとハイパーリンクを復元します。
pub(crate) struct WorkbookParser {
    /// calamineのワークブック
    workbook: Sheets<Cursor<Vec<u8>>>,
    /// XMLメタデータ（XLSXのみ）
    metadata: Option<XlsxMetadata>,
}

impl WorkbookParser {
    /// ワークブックを開く
    ///
    /// # 引数
    ///
    /// * `reader` - スプレッドシートを読み込むためのリーダー
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookParser)` - ワークブックの読み込みに成功した場合
    /// * `Err(SourceReadError)` - 形式を判別できない、破損している、または制限を超える場合
    pub fn open<R: Read>(mut reader: R) -> Result<Self, SourceReadError> {
        let security_config = SecurityConfig::default();

        // ファイル全体をメモリに読み込む（セキュリティ: ファイルサイズ制限を適用）
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        security_config.check_input_size(buffer.len())?;

        // ZIPベースの形式は、calamineに渡す前にアーカイブの制限を検証する
        let metadata = if buffer.starts_with(ZIP_MAGIC) {
            Some(XlsxMetadata::parse(Cursor::new(buffer.as_slice()))?)
        } else {
            None
        };

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer))?;
        let metadata = match workbook {
            Sheets::Xlsx(_) => metadata,
            _ => None,
        };

        tracing::debug!(
            format = format_name(&workbook),
            sheets = workbook.sheet_names().len(),
            "workbook opened"
        );

        Ok(Self { workbook, metadata })
    }

    /// 先頭ワークシートのセルを取得
    ///
    /// # 戻り値
    ///
    /// * `Ok(SheetCells)` - 先頭ワークシートのセルグリッド（A1起点の絶対座標）
    /// * `Err(SourceReadError)` - シートが存在しない、または読み込みに失敗した場合
    pub fn first_sheet_cells(&mut self) -> Result<SheetCells, SourceReadError> {
        let sheet_name = self
            .workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(SourceReadError::NoWorksheet)?;

        let range = self.workbook.worksheet_range(&sheet_name)?;

        // 数式は全セルで再利用するため1回だけ取得する。
        // 数式を持たない形式では失敗し得るので、その場合は数式なしとして扱う
        let formulas = match self.workbook.worksheet_formula(&sheet_name) {
            Ok(formulas) => Some(formulas),
            Err(e) => {
                tracing::debug!(sheet = %sheet_name, error = %e, "formula range unavailable");
                None
            }
        };

        let (height, width) = extent(&range, formulas.as_ref());
        let mut rows = Vec::with_capacity(height as usize);
        for row in 0..height {
            let mut cells = Vec::with_capacity(width as usize);
            for col in 0..width {
                cells.push(self.raw_cell((row, col), &range, formulas.as_ref()));
            }
            rows.push(cells);
        }

        tracing::debug!(sheet = %sheet_name, rows = height, cols = width, "sheet read");
        Ok(SheetCells::from_rows(rows))
    }

    /// 1セル分の`RawCell`を組み立てる
    ///
    /// 優先順位: 数式 > ハイパーリンク > リッチテキスト > スカラー
    fn raw_cell(
        &self,
        pos: (u32, u32),
        range: &Range<Data>,
        formulas: Option<&Range<String>>,
    ) -> RawCell {
        let is_1904 = self.metadata.as_ref().map(|m| m.is_1904).unwrap_or(false);
        let scalar = range
            .get_value(pos)
            .and_then(|data| to_scalar(data, is_1904));

        if let Some(formula) = formulas
            .and_then(|f| f.get_value(pos))
            .filter(|f| !f.is_empty())
        {
            return RawCell::FormulaResult {
                formula: formula.clone(),
                cached: scalar,
            };
        }

        if let Some(metadata) = &self.metadata {
            if let Some(target) = metadata.hyperlinks.get(&pos) {
                let text = match scalar {
                    Some(ScalarValue::String(text)) => text,
                    Some(other) => normalize(&RawCell::Scalar(other)),
                    None => String::new(),
                };
                return RawCell::Hyperlink {
                    text,
                    target: target.clone(),
                };
            }

            if let Some(runs) = metadata.rich_text.get(&pos) {
                return RawCell::RichText(runs.clone());
            }
        }

        scalar.map(RawCell::Scalar).unwrap_or(RawCell::Empty)
    }
}

/// calamineの値をスカラーへ変換（空セルは`None`）
fn to_scalar(data: &Data, is_1904: bool) -> Option<ScalarValue> {
    let value = match data {
        Data::Empty => return None,
        Data::Int(i) => ScalarValue::Number(*i as f64),
        Data::Float(f) => ScalarValue::Number(*f),
        Data::String(s) => ScalarValue::String(s.clone()),
        Data::Bool(b) => ScalarValue::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            ScalarValue::DateTime(if is_1904 {
                serial + EPOCH_1904_OFFSET_DAYS
            } else {
                serial
            })
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => ScalarValue::String(s.clone()),
        Data::Error(e) => ScalarValue::Error(e.to_string()),
    };
    Some(value)
}

/// A1から最終セルまでの行数・列数
fn extent(range: &Range<Data>, formulas: Option<&Range<String>>) -> (u32, u32) {
    let ends = range
        .end()
        .into_iter()
        .chain(formulas.and_then(|f| f.end()));
    ends.fold((0, 0), |(h, w), (row, col)| {
        (h.max(row.saturating_add(1)), w.max(col.saturating_add(1)))
    })
}

fn format_name<RS>(sheets: &Sheets<RS>) -> &'static str {
    match sheets {
        Sheets::Xls(_) => "xls",
        Sheets::Xlsx(_) => "xlsx",
        Sheets::Xlsb(_) => "xlsb",
        Sheets::Ods(_) => "ods",
    }
}


// ブック全体を通した動作は統合テスト（tests/）で検証します。
