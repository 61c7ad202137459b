//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! セルの生データ（`RawCell`）と、抽出後のレコードモデル（`Record` / `RecordBatch`）を含みます。

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::Arc;

/// スカラー値
///
/// 書式やリッチテキストを剥がした後の、単一セルの値を表します。
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// 文字列
    String(String),

    /// 数値（f64）
    Number(f64),

    /// 論理値
    Bool(bool),

    /// 日時（1900年システムのシリアル値）
    ///
    /// 1904年エポックのブックは読み込み時に1900年システムへ換算済みです。
    DateTime(f64),

    /// エラー値（例: `#DIV/0!`）
    Error(String),
}

/// リッチテキストの1ラン
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichTextRun {
    /// ランのテキスト
    pub text: String,
    /// 太字
    pub bold: bool,
    /// 斜体
    pub italic: bool,
}

impl RichTextRun {
    /// 書式なしのランを生成
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// スプレッドシートのセルの生データ
///
/// セルが取り得る表現を閉じた集合として列挙します。
/// 正規化（[`crate::normalize`]）はすべてのバリアントを網羅的に扱います。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCell {
    /// 空セル（または存在しないセル）
    #[default]
    Empty,

    /// プレーンなスカラー値
    Scalar(ScalarValue),

    /// リッチテキスト（ランの並び）
    RichText(Vec<RichTextRun>),

    /// ハイパーリンク（表示テキストとリンク先）
    Hyperlink {
        /// 表示テキスト
        text: String,
        /// リンク先
        target: String,
    },

    /// 数式とそのキャッシュ結果
    FormulaResult {
        /// 数式（先頭の`=`なし）
        formula: String,
        /// キャッシュされた計算結果（未計算のブックでは`None`）
        cached: Option<ScalarValue>,
    },
}

impl RawCell {
    /// 文字列スカラーのセルを生成
    pub fn text(value: impl Into<String>) -> Self {
        RawCell::Scalar(ScalarValue::String(value.into()))
    }
}

/// 1シート分のセルグリッド
///
/// 座標はシート上の絶対位置（0始まり）です。範囲外の参照は空セルとして扱います。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetCells {
    rows: Vec<Vec<RawCell>>,
}

static EMPTY_CELL: RawCell = RawCell::Empty;

impl SheetCells {
    /// 行の並びからグリッドを生成
    pub fn from_rows(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// 行数（最終行まで、先頭の空行も含む）
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// 指定行の列数
    pub fn row_width(&self, row: usize) -> usize {
        self.rows.get(row).map(Vec::len).unwrap_or(0)
    }

    /// 指定座標のセルを取得
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// 列見出しに対応付けられた、順序付きのフィールド値
///
/// 見出しの並びはバッチ内の全レコードで`Arc`共有されます。
/// 同名の見出しは位置ごとに保持され、名前による検索は最後の出現を返します。
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    names: Arc<[String]>,
    values: Vec<String>,
}

impl FieldMap {
    pub(crate) fn new(names: Arc<[String]>, values: Vec<String>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// フィールド数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// フィールドが空かどうか
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 見出し名で値を取得（重複時は最後の出現）
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .zip(self.values.iter())
            .rev()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    /// 列順に`(見出し, 値)`を走査
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    /// 列順の値
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// 共有されている見出しの並び
    pub fn names(&self) -> &Arc<[String]> {
        &self.names
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 1データ行を正規化したレコード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// 主キー（登録番号）
    pub key: String,
    /// 表示名
    pub name: String,
    /// 3列目以降のフィールド（列順）
    pub fields: FieldMap,
}

/// 1つのスプレッドシートから抽出したレコードの集合
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecordBatch {
    /// 見出し行（キー列・名前列を含む全列）
    pub headers: Vec<String>,
    /// 行順のレコード（見出し行と空行を除く）
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// レコード数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// レコードが空かどうか
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str], values: &[&str]) -> FieldMap {
        let names: Arc<[String]> = names.iter().map(|s| s.to_string()).collect();
        FieldMap::new(names, values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_field_map_preserves_column_order() {
        let map = fields(&["103", "101", "102"], &["C", "A", "B"]);
        let order: Vec<_> = map.iter().collect();
        assert_eq!(order, vec![("103", "C"), ("101", "A"), ("102", "B")]);
    }

    #[test]
    fn test_field_map_duplicate_header_last_wins() {
        let map = fields(&["101", "101"], &["first", "second"]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("101"), Some("second"));
        assert_eq!(map.get("999"), None);
    }

    #[test]
    fn test_field_map_serializes_in_order() {
        let map = fields(&["b", "a"], &["2", "1"]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":"2","a":"1"}"#);
    }

    #[test]
    fn test_sheet_cells_out_of_range_is_empty() {
        let cells = SheetCells::from_rows(vec![vec![RawCell::text("A1")]]);
        assert_eq!(cells.cell(0, 0), &RawCell::text("A1"));
        assert_eq!(cells.cell(0, 5), &RawCell::Empty);
        assert_eq!(cells.cell(9, 0), &RawCell::Empty);
        assert_eq!(cells.height(), 1);
        assert_eq!(cells.row_width(3), 0);
    }
}
