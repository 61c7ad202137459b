//! Document Renderer Module
//!
//! Strategy Patternによる文書レンダリングの抽象化を提供するモジュール。
//! 一覧レポート（流し込み）と証明書（固定座標＋流し込み）は
//! レイアウト方式が異なるため、別々のレンダラーとして実装しています。

mod bulk;
mod certificate;
mod fonts;
mod layout;
mod pdf;
mod table;
mod template;
mod text;

use chrono::NaiveDateTime;

use crate::api::{Letterhead, ReportHeading, TemplateParams};
use crate::types::{Record, RecordBatch};

pub use bulk::BulkReportRenderer;
pub use certificate::{CertificateAssets, CertificateRenderer};
pub use fonts::BodyFont;
pub use layout::{Document, Page, RasterImage, Region, TableSlice};

/// レンダリング要求（Strategy Pattern）
///
/// 各モードをenumとして表現し、対応するレンダラーへ振り分けます。
#[derive(Debug, Clone, Copy)]
pub enum RenderRequest<'a> {
    /// 全レコードの一覧レポート
    Bulk {
        batch: &'a RecordBatch,
        heading: &'a ReportHeading,
    },
    /// 1件のレコードの証明書
    Certificate {
        record: &'a Record,
        params: &'a TemplateParams,
        letterhead: &'a Letterhead,
        assets: &'a CertificateAssets,
    },
}

impl RenderRequest<'_> {
    /// 要求に応じたレンダラーで文書を描画する
    ///
    /// # 引数
    ///
    /// * `created` - 日付欄と文書情報に記録する日時
    ///
    /// # 戻り値
    ///
    /// ページごとの描画内容を持つ`Document`
    pub fn render(&self, created: NaiveDateTime) -> Document {
        match *self {
            RenderRequest::Bulk { batch, heading } => {
                BulkReportRenderer.render(batch, heading, created)
            }
            RenderRequest::Certificate {
                record,
                params,
                letterhead,
                assets,
            } => CertificateRenderer.render(record, params, letterhead, assets, created),
        }
    }

    /// 要求の種類（ログ用）
    pub fn mode(&self) -> &'static str {
        match self {
            RenderRequest::Bulk { .. } => "bulk",
            RenderRequest::Certificate { .. } => "certificate",
        }
    }
}
