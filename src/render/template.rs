//! Template Module
//!
//! `{placeholder}`形式の差し込み。

use std::collections::HashMap;

use crate::api::{Letterhead, TemplateParams};
use crate::types::Record;

/// 差し込み値の表
#[derive(Debug, Clone, Default)]
pub(crate) struct Placeholders<'a> {
    values: HashMap<&'static str, &'a str>,
}

impl<'a> Placeholders<'a> {
    /// レコード・パラメータ・レターヘッドから差し込み値を組み立てる
    pub fn for_certificate(
        record: &'a Record,
        params: &'a TemplateParams,
        letterhead: &'a Letterhead,
    ) -> Self {
        let values = HashMap::from([
            ("key", record.key.as_str()),
            ("name", record.name.as_str()),
            ("semester", params.semester.as_str()),
            ("academic_year", params.academic_year.as_str()),
            ("section", params.section.as_str()),
            ("purpose", params.purpose.as_str()),
            ("form_number", params.form_number.as_str()),
            ("year_of_study", params.year_of_study.as_str()),
            ("department", letterhead.department.as_str()),
        ]);
        Self { values }
    }

    /// テンプレートに値を差し込む
    ///
    /// 未知のプレースホルダと、閉じていない`{`はそのまま残ります。
    pub fn fill(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .map(|close| (&after[..close], close))
                .filter(|(name, _)| is_placeholder_name(name))
                .and_then(|(name, close)| self.values.get(name).map(|v| (*v, close)));

            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldMap;
    use std::sync::Arc;

    fn record() -> Record {
        Record {
            key: "S1".to_string(),
            name: "Alice".to_string(),
            fields: FieldMap::new(Arc::from(Vec::<String>::new()), Vec::new()),
        }
    }

    #[test]
    fn test_fill_known_placeholders() {
        let record = record();
        let params = TemplateParams {
            semester: "IV".to_string(),
            ..TemplateParams::default()
        };
        let letterhead = Letterhead::default();
        let placeholders = Placeholders::for_certificate(&record, &params, &letterhead);

        assert_eq!(
            placeholders.fill("{name} ({key}) semester {semester}"),
            "Alice (S1) semester IV"
        );
    }

    #[test]
    fn test_absent_values_are_empty() {
        let record = record();
        let params = TemplateParams::default();
        let letterhead = Letterhead::default();
        let placeholders = Placeholders::for_certificate(&record, &params, &letterhead);
        assert_eq!(placeholders.fill("Ref: {form_number}/BC/{key}"), "Ref: /BC/S1");
    }

    #[test]
    fn test_unknown_and_unbalanced_left_verbatim() {
        let record = record();
        let params = TemplateParams::default();
        let letterhead = Letterhead::default();
        let placeholders = Placeholders::for_certificate(&record, &params, &letterhead);
        assert_eq!(placeholders.fill("{unknown} {name"), "{unknown} {name");
        assert_eq!(placeholders.fill("{{name}}"), "{Alice}");
    }
}
