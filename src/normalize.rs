//! Cell Normalizer Module
//!
//! あらゆるセル表現（スカラー、リッチテキスト、ハイパーリンク、数式キャッシュ、空）を
//! トリム済みの単一文字列へ変換するモジュール。
//!
//! 解釈できない値は空文字列へ縮退させ、エラーとして呼び出し元へ伝播させません。
//! 1セルの異常でシート全体の抽出を止めないための方針です。

use chrono::{Duration, NaiveDate};

use crate::types::{RawCell, ScalarValue};

/// 1900年システムでの1904年エポックとの差（日数）
pub(crate) const EPOCH_1904_OFFSET_DAYS: f64 = 1462.0;

/// セルを文字列へ正規化する
///
/// # 引数
///
/// * `cell` - 正規化するセル
///
/// # 戻り値
///
/// 前後の空白を取り除いた文字列。空セルや解釈できない値は`""`。
///
/// # 使用例
///
/// ```rust
/// use gradesheet::{normalize, RawCell, RichTextRun};
///
/// let cell = RawCell::RichText(vec![RichTextRun::plain("Al"), RichTextRun::plain("ice")]);
/// assert_eq!(normalize(&cell), "Alice");
/// ```
pub fn normalize(cell: &RawCell) -> String {
    let text = match cell {
        RawCell::Empty => return String::new(),
        RawCell::RichText(runs) => runs.iter().map(|run| run.text.as_str()).collect(),
        RawCell::Hyperlink { text, .. } => text.clone(),
        RawCell::FormulaResult {
            cached: Some(value),
            ..
        } => scalar_to_string(value),
        RawCell::FormulaResult { cached: None, .. } => {
            tracing::trace!("formula without cached result normalized to empty");
            return String::new();
        }
        RawCell::Scalar(value) => scalar_to_string(value),
    };

    let trimmed = text.trim();
    if trimmed.len() == text.len() {
        text
    } else {
        trimmed.to_string()
    }
}

/// スカラー値を文字列へ変換
fn scalar_to_string(value: &ScalarValue) -> String {
    match value {
        ScalarValue::String(s) => s.clone(),
        ScalarValue::Number(n) => format_number(*n),
        ScalarValue::Bool(b) => b.to_string(),
        ScalarValue::DateTime(serial) => {
            format_serial_date(*serial).unwrap_or_else(|| format_number(*serial))
        }
        ScalarValue::Error(code) => {
            tracing::trace!(code = %code, "error cell normalized to empty");
            String::new()
        }
    }
}

/// 数値を文字列へ変換
///
/// 整数値は小数点なし（`101.0` → `"101"`）、それ以外は最短の往復可能表現。
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// 1900年システムのシリアル値をISO形式の日付（時刻）文字列へ変換
///
/// # エポックシステム
///
/// - シリアル値1 = 1900-01-01
/// - シリアル値60はExcelの1900年うるう年バグによる架空の日付で、2月28日として扱う
/// - シリアル値61以降は1899-12-30起算
///
/// 時刻成分がある場合は`%Y-%m-%d %H:%M:%S`、ない場合は`%Y-%m-%d`。
/// 負の値や範囲外の値は`None`。
pub(crate) fn format_serial_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let epoch = if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let days = serial.floor();
    let mut seconds = ((serial - days) * 86_400.0).round() as i64;
    let mut days = days as i64;
    if seconds >= 86_400 {
        days += 1;
        seconds -= 86_400;
    }

    let date = epoch.checked_add_signed(Duration::try_days(days)?)?;
    if seconds == 0 {
        return Some(date.format("%Y-%m-%d").to_string());
    }

    let datetime = date
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_seconds(seconds)?)?;
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RichTextRun;

    #[test]
    fn test_empty() {
        assert_eq!(normalize(&RawCell::Empty), "");
    }

    #[test]
    fn test_rich_text_runs_concatenated() {
        let cell = RawCell::RichText(vec![
            RichTextRun {
                text: "Al".to_string(),
                bold: true,
                italic: false,
            },
            RichTextRun::plain("ice"),
        ]);
        assert_eq!(normalize(&cell), "Alice");
    }

    #[test]
    fn test_rich_text_keeps_inner_whitespace() {
        let cell = RawCell::RichText(vec![RichTextRun::plain(" Bob "), RichTextRun::plain("Smith ")]);
        assert_eq!(normalize(&cell), "Bob Smith");
    }

    #[test]
    fn test_hyperlink_uses_text() {
        let cell = RawCell::Hyperlink {
            text: " Portal ".to_string(),
            target: "https://example.com".to_string(),
        };
        assert_eq!(normalize(&cell), "Portal");
    }

    #[test]
    fn test_formula_cached_result() {
        let cell = RawCell::FormulaResult {
            formula: "SUM(A1:D1)".to_string(),
            cached: Some(ScalarValue::Number(100.0)),
        };
        assert_eq!(normalize(&cell), "100");

        let missing = RawCell::FormulaResult {
            formula: "SUM(A1:D1)".to_string(),
            cached: None,
        };
        assert_eq!(normalize(&missing), "");
    }

    #[test]
    fn test_scalar_string_trimmed() {
        assert_eq!(normalize(&RawCell::text("  S1\t")), "S1");
        assert_eq!(normalize(&RawCell::text("   ")), "");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Number(101.0))), "101");
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Number(0.0))), "0");
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Number(8.5))), "8.5");
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Number(-3.0))), "-3");
    }

    #[test]
    fn test_bool() {
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Bool(true))), "true");
        assert_eq!(normalize(&RawCell::Scalar(ScalarValue::Bool(false))), "false");
    }

    #[test]
    fn test_error_cell_degrades_to_empty() {
        let cell = RawCell::Scalar(ScalarValue::Error("#DIV/0!".to_string()));
        assert_eq!(normalize(&cell), "");

        let formula = RawCell::FormulaResult {
            formula: "1/0".to_string(),
            cached: Some(ScalarValue::Error("#DIV/0!".to_string())),
        };
        assert_eq!(normalize(&formula), "");
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(format_serial_date(1.0).as_deref(), Some("1900-01-01"));
        assert_eq!(format_serial_date(59.0).as_deref(), Some("1900-02-28"));
        assert_eq!(format_serial_date(61.0).as_deref(), Some("1900-03-01"));
        assert_eq!(format_serial_date(45658.0).as_deref(), Some("2025-01-01"));
        assert_eq!(
            format_serial_date(45658.5).as_deref(),
            Some("2025-01-01 12:00:00")
        );
        assert_eq!(format_serial_date(-1.0), None);
    }

    #[test]
    fn test_1904_offset() {
        // 1904年システムのシリアル0 = 1904-01-01
        assert_eq!(
            format_serial_date(EPOCH_1904_OFFSET_DAYS).as_deref(),
            Some("1904-01-01")
        );
    }

    #[test]
    fn test_datetime_cell() {
        let cell = RawCell::Scalar(ScalarValue::DateTime(45658.0));
        assert_eq!(normalize(&cell), "2025-01-01");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // どの表現に包んでも、元の文字列のトリム結果が得られる
            #[test]
            fn test_round_trip_over_shapes(s in "\\PC{0,24}") {
                let expected = s.trim().to_string();

                let scalar = RawCell::text(s.clone());
                let rich = RawCell::RichText(vec![RichTextRun::plain(s.clone())]);
                let link = RawCell::Hyperlink { text: s.clone(), target: "x".to_string() };
                let formula = RawCell::FormulaResult {
                    formula: "A1".to_string(),
                    cached: Some(ScalarValue::String(s.clone())),
                };

                prop_assert_eq!(normalize(&scalar), expected.clone());
                prop_assert_eq!(normalize(&rich), expected.clone());
                prop_assert_eq!(normalize(&link), expected.clone());
                prop_assert_eq!(normalize(&formula), expected);
            }

            #[test]
            fn test_date_conversion_monotonicity(
                serial1 in 61u32..80000,
                serial2 in 61u32..80000
            ) {
                let date1 = format_serial_date(serial1 as f64).unwrap();
                let date2 = format_serial_date(serial2 as f64).unwrap();
                prop_assert_eq!(serial1.cmp(&serial2), date1.cmp(&date2));
            }

            #[test]
            fn test_integral_numbers_have_no_fraction(n in -1_000_000i64..1_000_000) {
                prop_assert_eq!(format_number(n as f64), n.to_string());
            }
        }
    }
}
