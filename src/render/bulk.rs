//! Bulk Report Renderer
//!
//! 全レコードを1つの表にまとめたA4横の一覧レポート。
//! 見出し → 表 → フッターの順に流し込みます。

use chrono::NaiveDateTime;

use crate::api::ReportHeading;
use crate::render::fonts::{FontBook, FontFace};
use crate::render::layout::{text_op, Document, Flow, Region, A4_LANDSCAPE};
use crate::render::table::{draw_table, Table, TableStyle};
use crate::render::text::{draw_text, Align, TextStyle};
use crate::types::RecordBatch;

const MARGIN: f32 = 30.0;
const MAX_TABLE_WIDTH: f32 = 750.0;
const TITLE_SIZE: f32 = 20.0;
const SUBTITLE_SIZE: f32 = 14.0;
const SUBTITLE_FOLLOWING_SIZE: f32 = 12.0;
const FOOTER_SIZE: f32 = 10.0;
/// フッターの位置（ページ下端からの距離）
const FOOTER_OFFSET: f32 = 50.0;
/// 表の流し込みで確保するフッター領域
const FOOTER_BAND: f32 = 60.0;

const TABLE_STYLE: TableStyle = TableStyle {
    font_size: 10.0,
    padding: 5.0,
    header_rule: 2.0,
    row_rule: 0.5,
    border: 0.1,
};

/// 一覧レポートのレンダラー
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkReportRenderer;

impl BulkReportRenderer {
    /// レコード集合を一覧レポートとして描画する
    ///
    /// # 引数
    ///
    /// * `batch` - 抽出済みのレコード集合（見出しが表の見出し行になる）
    /// * `heading` - 表題・副題・フッターのラベル
    /// * `created` - フッターと文書情報に記録する日時
    pub fn render(
        &self,
        batch: &RecordBatch,
        heading: &ReportHeading,
        created: NaiveDateTime,
    ) -> Document {
        let fonts = FontBook::default();
        let (page_width, page_height) = A4_LANDSCAPE;
        let content_width = page_width - 2.0 * MARGIN;
        let mut flow = Flow::new(A4_LANDSCAPE, MARGIN, page_height - FOOTER_BAND);

        // Header
        flow.page().set_region(Region::Header);
        let title = TextStyle::new(FontFace::Helvetica, TITLE_SIZE).align(Align::Center);
        let y = flow.y;
        flow.y = draw_text(flow.page(), &fonts, title, (MARGIN, y), content_width, &heading.title);
        flow.y += title.advance(&fonts);

        let mut size = TITLE_SIZE;
        for (i, subtitle) in heading.subtitles.iter().enumerate() {
            size = if i == 0 { SUBTITLE_SIZE } else { SUBTITLE_FOLLOWING_SIZE };
            let style = TextStyle::new(FontFace::Helvetica, size).align(Align::Center);
            let y = flow.y;
            flow.y = draw_text(flow.page(), &fonts, style, (MARGIN, y), content_width, subtitle);
        }
        flow.y += fonts.line_height(FontFace::Helvetica, size);

        // Table
        flow.page().set_region(Region::Body);
        let table = Table {
            header: batch.headers.clone(),
            rows: batch
                .records
                .iter()
                .map(|record| {
                    let mut row = Vec::with_capacity(batch.headers.len());
                    row.push(record.key.clone());
                    row.push(record.name.clone());
                    row.extend(record.fields.values().iter().cloned());
                    row.truncate(batch.headers.len());
                    row
                })
                .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
                .collect(),
        };
        if table.header.is_empty() {
            tracing::debug!("no header row, table omitted");
        }
        draw_table(
            &mut flow,
            &fonts,
            &table,
            MARGIN,
            content_width.min(MAX_TABLE_WIDTH),
            TABLE_STYLE,
        );

        // Footer
        let footer = format!("{}: {}", heading.footer_label, created.format("%d/%m/%Y"));
        flow.page().set_region(Region::Footer);
        flow.page().push(text_op(
            MARGIN,
            page_height - FOOTER_OFFSET,
            FontFace::Helvetica,
            FOOTER_SIZE,
            &footer,
        ));

        let pages = flow.finish();
        tracing::debug!(
            pages = pages.len(),
            rows = table.rows.len(),
            "bulk report laid out"
        );

        Document {
            title: heading.title.clone(),
            pages,
            images: Vec::new(),
            fonts,
            created,
        }
    }
}
