//! Public API Types
//!
//! 公開APIで使用する設定型を定義するモジュール。
//! いずれも`serde`でJSONから読み込めます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GradeDocError;

/// 証明書の差し込みパラメータ
///
/// すべて外部から与えられる文字列で、レコードからは導出しません。
/// 指定されなかった項目は空文字列として差し込まれます。
///
/// JSONのキーはcamelCaseです（`academicYear`, `formNumber`, `yearOfStudy`）。
///
/// # 使用例
///
/// ```rust
/// use gradesheet::TemplateParams;
///
/// let params: TemplateParams = serde_json::from_str(r#"{"semester":"IV"}"#).unwrap();
/// assert_eq!(params.semester, "IV");
/// assert_eq!(params.section, "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateParams {
    /// 学期（例: `IV`）
    pub semester: String,
    /// 学年度（例: `2024 - 2025`）
    pub academic_year: String,
    /// クラス（例: `A`）
    pub section: String,
    /// 発行目的（例: `Scholarship`）
    pub purpose: String,
    /// 参照番号の書式番号
    pub form_number: String,
    /// 学年（例: `III`）
    pub year_of_study: String,
}

/// 証明書のレターヘッドと文面テンプレート
///
/// 文面テンプレートでは次のプレースホルダを使用できます。
/// 未知のプレースホルダはそのまま残ります。
///
/// `{key}` `{name}` `{semester}` `{academic_year}` `{section}` `{purpose}`
/// `{form_number}` `{year_of_study}` `{department}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Letterhead {
    /// 機関名（太字16pt）
    pub institution: String,
    /// 機関名の下の1行（12pt）
    pub status_line: String,
    /// 認定・住所などの行（11pt、最大3行）
    pub detail_lines: Vec<String>,
    /// 左側に表示する校長名（太字11pt）
    pub principal_name: String,
    /// 校長名の下の肩書き
    pub principal_title: String,
    /// 右寄せの連絡先（最大2行）
    pub contact_lines: Vec<String>,
    /// 学科名
    pub department: String,
    /// 証明書の表題
    pub certificate_title: String,
    /// 参照番号行のテンプレート
    pub reference_template: String,
    /// 本文のテンプレート（両端揃え）
    pub narrative_template: String,
    /// 発行目的行のテンプレート
    pub purpose_template: String,
    /// 左下の署名欄
    pub left_signature: String,
    /// 右下の署名欄
    pub right_signature: String,
    /// ロゴ画像のアセット名
    pub logo_asset: String,
    /// 本文フォント（TrueType）のアセット名
    pub body_font_asset: String,
}

impl Default for Letterhead {
    fn default() -> Self {
        Self {
            institution: "COLLEGE OF ENGINEERING & TECHNOLOGY".to_string(),
            status_line: "(Autonomous)".to_string(),
            detail_lines: Vec::new(),
            principal_name: String::new(),
            principal_title: "Principal".to_string(),
            contact_lines: Vec::new(),
            department: "Computer Science and Engineering".to_string(),
            certificate_title: "BONAFIDE CERTIFICATE".to_string(),
            reference_template: "Ref: {form_number}/{academic_year}/BC/{key}".to_string(),
            narrative_template: "This is to certify that {name} (Roll No: {key}) of \
                {year_of_study} year B.E. '{section}' Section in the Department of \
                {department} is a bonafide student of our College during the academic \
                year {academic_year}. The university examination results for \
                {semester} Semester are as follows."
                .to_string(),
            purpose_template: "This certificate is issued for {purpose} purpose only."
                .to_string(),
            left_signature: "HOD".to_string(),
            right_signature: "PRINCIPAL".to_string(),
            logo_asset: "logo.png".to_string(),
            body_font_asset: "body.ttf".to_string(),
        }
    }
}

/// 一覧レポートの見出し
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportHeading {
    /// 表題（20pt、中央揃え）
    pub title: String,
    /// 副題の行（1行目14pt、以降12pt、中央揃え）
    pub subtitles: Vec<String>,
    /// フッターの日付の前に付けるラベル
    pub footer_label: String,
}

impl Default for ReportHeading {
    fn default() -> Self {
        Self {
            title: "Student Grade Report".to_string(),
            subtitles: vec![
                "College of Engineering and Technology".to_string(),
                "Department of Computer Science and Engineering".to_string(),
            ],
            footer_label: "Generated on".to_string(),
        }
    }
}

/// 描画設定（一覧レポートの見出しと証明書のレターヘッド）
///
/// # 使用例
///
/// ```rust
/// use gradesheet::RenderConfig;
///
/// let config = RenderConfig::from_json(r#"{"heading":{"title":"Grades"}}"#).unwrap();
/// assert_eq!(config.heading.title, "Grades");
/// assert_eq!(config.letterhead.right_signature, "PRINCIPAL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// 一覧レポートの見出し
    pub heading: ReportHeading,
    /// 証明書のレターヘッド
    pub letterhead: Letterhead,
}

impl RenderConfig {
    /// JSON文字列から読み込む
    pub fn from_json(json: &str) -> Result<Self, GradeDocError> {
        serde_json::from_str(json)
            .map_err(|e| GradeDocError::Config(format!("Invalid render config: {}", e)))
    }

    /// JSONファイルから読み込む
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GradeDocError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            GradeDocError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}
