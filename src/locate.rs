//! Record Locator Module
//!
//! キーによるレコード検索。

use crate::types::{Record, RecordBatch};

/// キーに一致するレコードを検索する
///
/// 照合は`record.key == query.trim()`の完全一致（大文字小文字を区別）で、
/// 行順で最初に一致したレコードを返します。キーが重複している場合も最初の出現が優先です。
///
/// # 引数
///
/// * `batch` - 検索対象のレコード集合
/// * `query` - 検索キー（前後の空白は無視）
///
/// # 戻り値
///
/// * `Some(&Record)` - 一致するレコードがある場合
/// * `None` - 一致するレコードがない場合
pub fn find_by_key<'a>(batch: &'a RecordBatch, query: &str) -> Option<&'a Record> {
    let query = query.trim();
    batch.records.iter().find(|record| record.key == query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldMap;
    use std::sync::Arc;

    fn batch(rows: &[(&str, &str)]) -> RecordBatch {
        let names: Arc<[String]> = Arc::from(Vec::<String>::new());
        RecordBatch {
            headers: vec!["RegNo".to_string(), "Name".to_string()],
            records: rows
                .iter()
                .map(|(key, name)| Record {
                    key: key.to_string(),
                    name: name.to_string(),
                    fields: FieldMap::new(Arc::clone(&names), Vec::new()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_exact_match_with_trimmed_query() {
        let batch = batch(&[("S1", "Alice"), ("S2", "Bob")]);
        assert_eq!(find_by_key(&batch, "  S2 ").map(|r| r.name.as_str()), Some("Bob"));
    }

    #[test]
    fn test_case_sensitive() {
        let batch = batch(&[("S1", "Alice")]);
        assert!(find_by_key(&batch, "s1").is_none());
    }

    #[test]
    fn test_first_duplicate_wins() {
        let batch = batch(&[("S1", "First"), ("S1", "Second")]);
        assert_eq!(find_by_key(&batch, "S1").map(|r| r.name.as_str()), Some("First"));
    }

    #[test]
    fn test_no_partial_match() {
        let batch = batch(&[("S10", "Alice")]);
        assert!(find_by_key(&batch, "S1").is_none());
    }
}
