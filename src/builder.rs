//! Builder Module
//!
//! Fluent Builder APIを提供し、`ReportPipeline`インスタンスを段階的に構築する。

use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{Letterhead, RenderConfig, ReportHeading};
use crate::assets::{AssetStore, FsAssetStore};
use crate::error::GradeDocError;
use crate::pipeline::ReportPipeline;
use crate::storage::{DocumentStore, SourceStore, UploadDir};

/// 日付欄・文書情報に使う現在時刻の取得元
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// 構築済みパイプラインの設定
#[derive(Clone)]
pub(crate) struct PipelineConfig {
    pub sources: Arc<dyn SourceStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub assets: Arc<dyn AssetStore>,
    pub render: RenderConfig,
    pub clock: Clock,
}

/// Fluent Builder APIを提供する構造体
///
/// 保存先（スプレッドシートと生成文書）は必須です。
/// `with_upload_dir`を使うと、1つのディレクトリを両方に使います。
///
/// # 使用例
///
/// ```rust,no_run
/// use gradesheet::PipelineBuilder;
///
/// # fn main() -> Result<(), gradesheet::GradeDocError> {
/// let pipeline = PipelineBuilder::new()
///     .with_upload_dir("uploads")
///     .with_assets_dir("assets")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    sources: Option<Arc<dyn SourceStore>>,
    documents: Option<Arc<dyn DocumentStore>>,
    assets: Option<Arc<dyn AssetStore>>,
    render: RenderConfig,
    clock: Option<Clock>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("has_sources", &self.sources.is_some())
            .field("has_documents", &self.documents.is_some())
            .field("has_assets", &self.assets.is_some())
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 保存先: 未設定（`build()`までに設定が必要）
    /// - アセット: `./assets`
    /// - 描画設定: `RenderConfig::default()`
    /// - 時刻: ローカル時刻
    pub fn new() -> Self {
        Self {
            sources: None,
            documents: None,
            assets: None,
            render: RenderConfig::default(),
            clock: None,
        }
    }

    /// 1つのディレクトリをアップロードと生成文書の保存先にする
    ///
    /// # 引数
    ///
    /// * `dir` - 保存先ディレクトリ（存在しない場合は最初の書き込み時に作成）
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let store = Arc::new(UploadDir::new(dir));
        self.sources = Some(store.clone());
        self.documents = Some(store);
        self
    }

    /// スプレッドシートの保存先を指定する
    pub fn with_source_store(mut self, store: Arc<dyn SourceStore>) -> Self {
        self.sources = Some(store);
        self
    }

    /// 生成文書の保存先を指定する
    pub fn with_document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(store);
        self
    }

    /// アセット（ロゴ・本文フォント）のディレクトリを指定する
    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets = Some(Arc::new(FsAssetStore::new(dir)));
        self
    }

    /// アセットの読み込み元を指定する
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.assets = Some(store);
        self
    }

    /// 描画設定（見出しとレターヘッド）をまとめて指定する
    pub fn with_render_config(mut self, config: RenderConfig) -> Self {
        self.render = config;
        self
    }

    /// 一覧レポートの見出しを指定する
    pub fn with_heading(mut self, heading: ReportHeading) -> Self {
        self.render.heading = heading;
        self
    }

    /// 証明書のレターヘッドを指定する
    pub fn with_letterhead(mut self, letterhead: Letterhead) -> Self {
        self.render.letterhead = letterhead;
        self
    }

    /// 現在時刻の取得元を指定する（日付を固定したい場合に使用）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use chrono::NaiveDate;
    /// use gradesheet::PipelineBuilder;
    /// use std::sync::Arc;
    ///
    /// let fixed = NaiveDate::from_ymd_opt(2025, 1, 1)
    ///     .and_then(|d| d.and_hms_opt(0, 0, 0))
    ///     .unwrap();
    /// let builder = PipelineBuilder::new().with_clock(Arc::new(move || fixed));
    /// ```
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 設定を検証し、`ReportPipeline`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(ReportPipeline)` - 設定が有効な場合
    /// * `Err(GradeDocError::Config)` - 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * 保存先が設定されていない
    /// * レターヘッドのロゴ・フォントのアセット名が空
    pub fn build(self) -> Result<ReportPipeline, GradeDocError> {
        // 1. 保存先の検証
        let sources = self
            .sources
            .ok_or_else(|| GradeDocError::Config("Source store is not configured".to_string()))?;
        let documents = self.documents.ok_or_else(|| {
            GradeDocError::Config("Document store is not configured".to_string())
        })?;

        // 2. レターヘッドの検証
        let letterhead = &self.render.letterhead;
        for (field, value) in [
            ("logoAsset", &letterhead.logo_asset),
            ("bodyFontAsset", &letterhead.body_font_asset),
        ] {
            if value.trim().is_empty() {
                return Err(GradeDocError::Config(format!(
                    "Letterhead {} must not be empty",
                    field
                )));
            }
        }

        // 3. ReportPipelineインスタンス生成
        let assets: Arc<dyn AssetStore> = match self.assets {
            Some(assets) => assets,
            None => Arc::new(FsAssetStore::new("assets")),
        };
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(|| chrono::Local::now().naive_local()),
        };

        Ok(ReportPipeline::new(PipelineConfig {
            sources,
            documents,
            assets,
            render: self.render,
            clock,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_build_requires_stores() {
        let result = PipelineBuilder::new().build();
        assert!(matches!(result, Err(GradeDocError::Config(_))));

        let store = Arc::new(MemoryStore::new());
        let result = PipelineBuilder::new().with_source_store(store).build();
        assert!(matches!(result, Err(GradeDocError::Config(msg)) if msg.contains("Document")));
    }

    #[test]
    fn test_build_rejects_empty_asset_names() {
        let letterhead = Letterhead {
            body_font_asset: "  ".to_string(),
            ..Letterhead::default()
        };
        let result = PipelineBuilder::new()
            .with_upload_dir("unused")
            .with_letterhead(letterhead)
            .build();
        assert!(matches!(result, Err(GradeDocError::Config(msg)) if msg.contains("bodyFontAsset")));
    }

    #[test]
    fn test_build_with_memory_stores() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = PipelineBuilder::new()
            .with_source_store(store.clone())
            .with_document_store(store)
            .build();
        assert!(pipeline.is_ok());
    }
}
