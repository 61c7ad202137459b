//! Certificate Renderer
//!
//! 1件のレコードを、レターヘッド付きの成績証明書（A4縦）として描画します。
//! レターヘッドから表題までは固定座標、本文以降は流し込みです。

use chrono::NaiveDateTime;

use crate::api::{Letterhead, TemplateParams};
use crate::render::fonts::{BodyFont, FontBook, FontFace};
use crate::render::layout::{text_op, Document, DrawOp, Flow, RasterImage, Region, A4_PORTRAIT};
use crate::render::table::{draw_table, Table, TableStyle};
use crate::render::template::Placeholders;
use crate::render::text::{draw_text, wrap, Align, TextStyle};
use crate::types::Record;

const MARGIN: f32 = 50.0;

const LOGO_X: f32 = 50.0;
const LOGO_Y: f32 = 45.0;
const LOGO_WIDTH: f32 = 60.0;

/// 機関名の帯（左端とページ幅からの差し引き）
const BAND_X: f32 = 120.0;
const BAND_INSET: f32 = 140.0;
const INSTITUTION_Y: f32 = 50.0;
const STATUS_Y: f32 = 75.0;
const DETAIL_YS: [f32; 3] = [95.0, 110.0, 125.0];
const PRINCIPAL_YS: [f32; 2] = [160.0, 175.0];
const RULE_Y: f32 = 195.0;
const RULE_END_X: f32 = 545.0;
const REFERENCE_Y: f32 = 215.0;
const TITLE_Y: f32 = 255.0;
const NARRATIVE_Y: f32 = 290.0;
const NARRATIVE_LINE_GAP: f32 = 5.0;
const TABLE_Y: f32 = 360.0;
const TABLE_WIDTH: f32 = 495.0;
/// 本文が長い場合の、本文と表の間隔
const TABLE_GAP: f32 = 15.0;
const PURPOSE_GAP: f32 = 20.0;
const SIGNATURE_GAP: f32 = 40.0;
/// 表・目的行・署名の前に送る行数
const MOVE_DOWN_LINES: f32 = 4.0;

const BODY_SIZE: f32 = 11.0;

const TABLE_STYLE: TableStyle = TableStyle {
    font_size: 11.0,
    padding: 8.0,
    header_rule: 1.0,
    row_rule: 0.5,
    border: 0.5,
};

const GRADE_HEADER: [&str; 3] = ["SUBJECT CODE", "GRADE", "RESULT"];
const RESULT_LITERAL: &str = "PASS";

/// 証明書の描画に必要なアセット（デコード済み）
#[derive(Debug, Clone)]
pub struct CertificateAssets {
    /// ロゴ画像
    pub logo: RasterImage,
    /// 本文用の埋め込みフォント
    pub body_font: BodyFont,
}

/// 証明書のレンダラー
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateRenderer;

impl CertificateRenderer {
    /// 1件のレコードを証明書として描画する
    ///
    /// 同じレコード・パラメータ・日時からは、常に同じ内容の文書が得られます。
    ///
    /// # 引数
    ///
    /// * `record` - 対象のレコード
    /// * `params` - 差し込みパラメータ
    /// * `letterhead` - レターヘッドと文面テンプレート
    /// * `assets` - ロゴと本文フォント
    /// * `created` - 日付欄と文書情報に記録する日時
    pub fn render(
        &self,
        record: &Record,
        params: &TemplateParams,
        letterhead: &Letterhead,
        assets: &CertificateAssets,
        created: NaiveDateTime,
    ) -> Document {
        let fonts = FontBook::with_body(assets.body_font.clone());
        let placeholders = Placeholders::for_certificate(record, params, letterhead);
        let (page_width, page_height) = A4_PORTRAIT;
        let content_width = page_width - 2.0 * MARGIN;
        let band_width = page_width - BAND_INSET;
        let mut flow = Flow::new(A4_PORTRAIT, MARGIN, page_height - MARGIN);

        let regular = TextStyle::new(FontFace::Helvetica, BODY_SIZE);

        // Letterhead
        {
            let page = flow.page();
            page.set_region(Region::Header);
            let (logo_w, logo_h) = assets.logo.dimensions();
            page.push(DrawOp::Image {
                index: 0,
                x: LOGO_X,
                y: LOGO_Y,
                width: LOGO_WIDTH,
                height: LOGO_WIDTH * logo_h as f32 / logo_w.max(1) as f32,
            });

            let centered = |face, size| TextStyle::new(face, size).align(Align::Center);
            draw_text(
                page,
                &fonts,
                centered(FontFace::HelveticaBold, 16.0),
                (BAND_X, INSTITUTION_Y),
                band_width,
                &letterhead.institution,
            );
            draw_text(
                page,
                &fonts,
                centered(FontFace::Helvetica, 12.0),
                (BAND_X, STATUS_Y),
                band_width,
                &letterhead.status_line,
            );
            for (line, y) in letterhead.detail_lines.iter().zip(DETAIL_YS) {
                let style = centered(FontFace::Helvetica, BODY_SIZE);
                draw_text(page, &fonts, style, (BAND_X, y), band_width, line);
            }

            let [name_y, title_y] = PRINCIPAL_YS;
            let principal = TextStyle::new(FontFace::HelveticaBold, BODY_SIZE);
            let name = &letterhead.principal_name;
            draw_text(page, &fonts, principal, (MARGIN, name_y), content_width, name);
            let title = &letterhead.principal_title;
            draw_text(page, &fonts, regular, (MARGIN, title_y), content_width, title);
            for (line, y) in letterhead.contact_lines.iter().zip(PRINCIPAL_YS) {
                let style = regular.align(Align::Right);
                draw_text(page, &fonts, style, (MARGIN, y), content_width, line);
            }

            page.push(DrawOp::Line {
                from: (MARGIN, RULE_Y),
                to: (RULE_END_X, RULE_Y),
                width: 1.0,
                gray: 0.0,
            });

            // ReferenceLine
            let reference = placeholders.fill(&letterhead.reference_template);
            let origin = (MARGIN, REFERENCE_Y);
            draw_text(page, &fonts, regular, origin, content_width, &reference);
            let date = format!("Date: {}", created.format("%d/%m/%Y"));
            let style = regular.align(Align::Right);
            draw_text(page, &fonts, style, origin, content_width, &date);

            // Title
            draw_text(
                page,
                &fonts,
                centered(FontFace::HelveticaBold, 14.0),
                (MARGIN, TITLE_Y),
                content_width,
                &letterhead.certificate_title,
            );
        }

        // Narrative
        flow.page().set_region(Region::Body);
        let narrative_style = TextStyle::new(FontFace::Body, BODY_SIZE)
            .align(Align::Justify)
            .line_gap(NARRATIVE_LINE_GAP);
        let narrative = placeholders.fill(&letterhead.narrative_template);
        let narrative_end = draw_text(
            flow.page(),
            &fonts,
            narrative_style,
            (MARGIN, NARRATIVE_Y),
            content_width,
            &narrative,
        );

        // GradeTable
        flow.y = TABLE_Y.max(narrative_end + TABLE_GAP);
        let table = Table {
            header: GRADE_HEADER.iter().map(|h| h.to_string()).collect(),
            rows: record
                .fields
                .iter()
                .map(|(code, grade)| {
                    vec![code.to_string(), grade.to_string(), RESULT_LITERAL.to_string()]
                })
                .collect(),
        };
        draw_table(&mut flow, &fonts, &table, MARGIN, TABLE_WIDTH, TABLE_STYLE);

        // Purpose
        let line = regular.advance(&fonts);
        let purpose = placeholders.fill(&letterhead.purpose_template);
        let purpose_lines = wrap(&fonts, FontFace::Helvetica, BODY_SIZE, &purpose, content_width).len();
        flow.y += MOVE_DOWN_LINES * line + PURPOSE_GAP;
        flow.ensure(purpose_lines as f32 * line);
        let y = flow.y;
        flow.y = draw_text(flow.page(), &fonts, regular, (MARGIN, y), content_width, &purpose);

        // Signatures
        flow.y += MOVE_DOWN_LINES * line + SIGNATURE_GAP;
        flow.ensure(line);
        let y = flow.y;
        let page = flow.page();
        let left = &letterhead.left_signature;
        page.push(text_op(MARGIN, y, FontFace::Helvetica, BODY_SIZE, left));
        let style = regular.align(Align::Right);
        draw_text(page, &fonts, style, (MARGIN, y), content_width, &letterhead.right_signature);

        let pages = flow.finish();
        tracing::debug!(
            key = %record.key,
            pages = pages.len(),
            grades = table.rows.len(),
            "certificate laid out"
        );

        Document {
            title: letterhead.certificate_title.clone(),
            pages,
            images: vec![assets.logo.clone()],
            fonts,
            created,
        }
    }
}
