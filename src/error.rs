//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// スプレッドシートの読み込みに失敗したことを表すエラー型
///
/// アップロードされたバイト列が読めない、破損している、またはサポート外の形式である
/// 場合に発生します。リクエストにとって致命的であり、再試行はしません。
///
/// # 使用例
///
/// ```rust,no_run
/// use gradesheet::{extract_from_reader, SourceReadError};
/// use std::fs::File;
///
/// fn load(path: &str) -> Result<usize, SourceReadError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(extract_from_reader(file)?.len())
/// }
/// ```
#[derive(Error, Debug)]
pub enum SourceReadError {
    /// I/O操作中に発生したエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー（calamine由来）
    ///
    /// ファイル形式が不正、破損したファイル、サポートされていない形式などが
    /// 原因となります。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// パッケージ内XMLの解析エラー
    #[error("XML error: {0}")]
    Xml(String),

    /// 数値の解析エラー
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// ワークシートが1枚も含まれていない
    #[error("Workbook contains no worksheets")]
    NoWorksheet,

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

/// パイプライン全体で使用するエラー型
///
/// # エラーの種類
///
/// - `SourceRead`: 入力スプレッドシートの読み込み失敗
/// - `RecordNotFound`: 指定キーのレコードが存在しない（通常の「見つからない」結果）
/// - `AssetMissing`: 描画に必要なアセット（ロゴ、フォント）が存在しない
/// - `Render`: アセットのデコードやPDF生成の失敗
///
/// # 使用例
///
/// ```rust,no_run
/// use gradesheet::GradeDocError;
///
/// fn describe(err: &GradeDocError) -> &'static str {
///     match err {
///         GradeDocError::RecordNotFound { .. } => "not found",
///         _ => "failure",
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum GradeDocError {
    /// 入力スプレッドシートの読み込み失敗
    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    /// 指定キーに一致するレコードが存在しない
    #[error("No record found for key '{key}'")]
    RecordNotFound {
        /// 検索したキー（トリム済み）
        key: String,
    },

    /// 描画に必要なアセットが存在しない
    #[error("Required asset '{name}' is missing")]
    AssetMissing {
        /// アセット名
        name: String,
    },

    /// 描画処理のエラー（アセットのデコード失敗など）
    #[error("Render error: {0}")]
    Render(String),

    /// 設定の検証に失敗したエラー
    ///
    /// `PipelineBuilder::build()`時や設定ファイルの読み込み時に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// アップロード済みのスプレッドシートが存在しない
    #[error("No source spreadsheet has been uploaded")]
    NoSource,

    /// 要求された生成済みドキュメントが存在しない
    #[error("Document '{0}' has not been generated")]
    DocumentNotFound(String),

    /// ストア操作中のI/Oエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GradeDocError {
    /// 利用者に「見つからない」として返すべきエラーかどうか
    ///
    /// これらはエラーログではなく通常の結果として扱います。
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GradeDocError::RecordNotFound { .. }
                | GradeDocError::DocumentNotFound(_)
                | GradeDocError::NoSource
        )
    }
}
