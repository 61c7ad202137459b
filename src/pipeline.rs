//! Pipeline Orchestrator Module
//!
//! 抽出 → 検索 → 描画 → 保存をつなぐファサード。

use std::io::Cursor;

use crate::api::{RenderConfig, TemplateParams};
use crate::assets::load_certificate_assets;
use crate::builder::PipelineConfig;
use crate::error::GradeDocError;
use crate::extract::extract_from_reader;
use crate::locate::find_by_key;
use crate::render::{Document, RenderRequest};
use crate::security::sanitize_file_component;
use crate::storage::SourceHandle;
use crate::types::{Record, RecordBatch};

/// 一覧レポートの保存名
pub const BULK_DOCUMENT_NAME: &str = "converted.pdf";

/// 生成文書のContent-Type
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// 生成された文書
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// PDFのバイト列
    pub bytes: Vec<u8>,
    /// Content-Type（常に`application/pdf`）
    pub content_type: &'static str,
    /// 保存名
    pub file_name: String,
}

/// 証明書の保存名（`{key}_grades.pdf`、キーは無害化される）
pub fn certificate_file_name(key: &str) -> String {
    format!("{}_grades.pdf", sanitize_file_component(key))
}

/// 文書生成パイプラインのファサード
///
/// `PipelineBuilder`で構築します。状態は読み取り専用の設定のみで、
/// 各操作は要求ごとに独立しています。
///
/// # 使用例
///
/// ```rust,no_run
/// use gradesheet::{PipelineBuilder, TemplateParams};
///
/// # fn main() -> Result<(), gradesheet::GradeDocError> {
/// let pipeline = PipelineBuilder::new()
///     .with_upload_dir("uploads")
///     .with_assets_dir("assets")
///     .build()?;
///
/// let source = pipeline.upload_source("grades.xlsx", &std::fs::read("grades.xlsx")?)?;
/// let report = pipeline.produce_bulk_document(&source)?;
/// assert_eq!(report.content_type, "application/pdf");
///
/// let params = TemplateParams { semester: "IV".to_string(), ..Default::default() };
/// let certificate = pipeline.produce_certificate(&source, "921722104001", &params)?;
/// println!("{}", certificate.file_name);
/// # Ok(())
/// # }
/// ```
pub struct ReportPipeline {
    config: PipelineConfig,
}

impl std::fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("render", &self.config.render)
            .finish_non_exhaustive()
    }
}

impl ReportPipeline {
    pub(crate) fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// スプレッドシートを保存する
    pub fn upload_source(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<SourceHandle, GradeDocError> {
        self.config.sources.upload_source(original_name, bytes)
    }

    /// 保存済みのスプレッドシート（アップロード順）
    pub fn list_sources(&self) -> Result<Vec<SourceHandle>, GradeDocError> {
        self.config.sources.list_sources()
    }

    /// 最新（最後にアップロードされた）スプレッドシート
    ///
    /// # 戻り値
    ///
    /// * `Ok(SourceHandle)` - 一覧の最後の要素
    /// * `Err(GradeDocError::NoSource)` - 1件も保存されていない場合
    pub fn latest_source(&self) -> Result<SourceHandle, GradeDocError> {
        self.list_sources()?.pop().ok_or(GradeDocError::NoSource)
    }

    /// 描画設定
    pub fn render_config(&self) -> &RenderConfig {
        &self.config.render
    }

    /// スプレッドシートからレコードを抽出する
    pub fn extract(&self, source: &SourceHandle) -> Result<RecordBatch, GradeDocError> {
        let bytes = self.config.sources.read_source(source)?;
        let batch = extract_from_reader(Cursor::new(bytes))?;
        tracing::debug!(source = %source, records = batch.len(), "source extracted");
        Ok(batch)
    }

    /// キーでレコードを検索する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Record)` - 一致するレコード
    /// * `Err(GradeDocError::RecordNotFound)` - 一致するレコードがない場合
    pub fn find_record(&self, source: &SourceHandle, key: &str) -> Result<Record, GradeDocError> {
        let batch = self.extract(source)?;
        locate(&batch, key).cloned()
    }

    /// 一覧レポートを生成し、`converted.pdf`として保存する
    ///
    /// # 引数
    ///
    /// * `source` - 対象のスプレッドシート
    ///
    /// # 戻り値
    ///
    /// * `Ok(RenderedDocument)` - 保存済みのPDF
    /// * `Err(GradeDocError)` - 読み込み・描画・保存のいずれかに失敗した場合
    pub fn produce_bulk_document(
        &self,
        source: &SourceHandle,
    ) -> Result<RenderedDocument, GradeDocError> {
        let _span = tracing::info_span!("produce_bulk_document", source = %source).entered();

        let batch = self.extract(source)?;
        let request = RenderRequest::Bulk {
            batch: &batch,
            heading: &self.config.render.heading,
        };
        self.finish(request, BULK_DOCUMENT_NAME.to_string())
    }

    /// 1件のレコードの証明書を生成し、`{key}_grades.pdf`として保存する
    ///
    /// # 引数
    ///
    /// * `source` - 対象のスプレッドシート
    /// * `key` - 検索キー（前後の空白は無視）
    /// * `params` - 差し込みパラメータ
    ///
    /// # 戻り値
    ///
    /// * `Ok(RenderedDocument)` - 保存済みのPDF
    /// * `Err(GradeDocError::RecordNotFound)` - キーに一致するレコードがない場合
    /// * `Err(GradeDocError::AssetMissing)` - ロゴまたは本文フォントがない場合
    pub fn produce_certificate(
        &self,
        source: &SourceHandle,
        key: &str,
        params: &TemplateParams,
    ) -> Result<RenderedDocument, GradeDocError> {
        let _span =
            tracing::info_span!("produce_certificate", source = %source, key = key.trim()).entered();

        let batch = self.extract(source)?;
        let record = locate(&batch, key)?;
        let letterhead = &self.config.render.letterhead;
        let assets = load_certificate_assets(self.config.assets.as_ref(), letterhead)?;

        let request = RenderRequest::Certificate {
            record,
            params,
            letterhead,
            assets: &assets,
        };
        self.finish(request, certificate_file_name(&record.key))
    }

    /// 最後に生成した一覧レポートを読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<u8>)` - PDFのバイト列
    /// * `Err(GradeDocError::DocumentNotFound)` - まだ生成されていない場合
    pub fn fetch_last_bulk_document(&self) -> Result<Vec<u8>, GradeDocError> {
        self.config.documents.read_document(BULK_DOCUMENT_NAME)
    }

    /// 最新のスプレッドシートから一覧レポートを生成する
    pub fn produce_bulk_document_from_latest(&self) -> Result<RenderedDocument, GradeDocError> {
        let source = self.latest_source()?;
        self.produce_bulk_document(&source)
    }

    /// 最新のスプレッドシートから証明書を生成する
    pub fn produce_certificate_from_latest(
        &self,
        key: &str,
        params: &TemplateParams,
    ) -> Result<RenderedDocument, GradeDocError> {
        let source = self.latest_source()?;
        self.produce_certificate(&source, key, params)
    }

    /// 描画要求を文書にする（PDF化はしない）
    pub fn render(&self, request: RenderRequest<'_>) -> Document {
        request.render((self.config.clock)())
    }

    /// 描画 → PDF化 → 保存
    fn finish(
        &self,
        request: RenderRequest<'_>,
        file_name: String,
    ) -> Result<RenderedDocument, GradeDocError> {
        let document = self.render(request);
        let bytes = document.to_pdf()?;
        self.config.documents.write_document(&file_name, &bytes)?;

        tracing::info!(
            mode = request.mode(),
            file = %file_name,
            pages = document.page_count(),
            bytes = bytes.len(),
            "document produced"
        );

        Ok(RenderedDocument {
            bytes,
            content_type: PDF_CONTENT_TYPE,
            file_name,
        })
    }
}

fn locate<'a>(batch: &'a RecordBatch, key: &str) -> Result<&'a Record, GradeDocError> {
    find_by_key(batch, key).ok_or_else(|| {
        let key = key.trim().to_string();
        tracing::info!(key = %key, "record not found");
        GradeDocError::RecordNotFound { key }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_file_name() {
        assert_eq!(certificate_file_name("921722104001"), "921722104001_grades.pdf");
        assert_eq!(certificate_file_name("../S1"), "_S1_grades.pdf");
        assert_eq!(certificate_file_name("CS/2024 01"), "CS_2024_01_grades.pdf");
    }
}
