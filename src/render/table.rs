//! Table Layout Module
//!
//! ページをまたいで流し込む表。列幅は均等で、セルは単語単位で折り返します。
//! 改ページ時は新しいページの先頭に見出し行を再描画します。

use crate::render::fonts::{FontBook, FontFace};
use crate::render::layout::{DrawOp, Flow, TableSlice};
use crate::render::text::{draw_text, wrap, TextStyle};

/// 表の書式
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableStyle {
    pub font_size: f32,
    /// セル内の上下左右の余白
    pub padding: f32,
    /// 見出し行の下の罫線の太さ
    pub header_rule: f32,
    /// 本体行の間の罫線の太さ
    pub row_rule: f32,
    /// 外枠の太さ
    pub border: f32,
}

/// 表の内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// 本体行の罫線の濃さ（不透明度0.5相当）
const ROW_RULE_GRAY: f32 = 0.5;

/// 表を`flow`の現在位置から描画する
///
/// 見出しが空の場合は何も描画しません。1行がページの高さを超える場合は
/// そのまま描画します（それ以上は分割しません）。
///
/// # 引数
///
/// * `flow` - 描画先（描画後の`flow.y`は表の直下）
/// * `fonts` - 計測に使うフォント
/// * `table` - 見出しと本体行
/// * `x` - 表の左端
/// * `width` - 表の幅
/// * `style` - 表の書式
pub(crate) fn draw_table(
    flow: &mut Flow,
    fonts: &FontBook,
    table: &Table,
    x: f32,
    width: f32,
    style: TableStyle,
) {
    let columns = table.header.len();
    if columns == 0 {
        return;
    }
    let col_width = width / columns as f32;

    let header_height = row_height(fonts, FontFace::HelveticaBold, &table.header, col_width, style);
    flow.ensure(header_height);
    let mut top = flow.y;
    draw_header(flow, fonts, table, x, width, col_width, header_height, style);

    for row in &table.rows {
        let height = row_height(fonts, FontFace::Helvetica, row, col_width, style);
        let page_has_rows = flow
            .page()
            .tables
            .last()
            .is_some_and(|slice| !slice.rows.is_empty());
        if !flow.fits(height) && page_has_rows {
            draw_border(flow, x, top, width, style);
            flow.break_page();
            top = flow.y;
            draw_header(flow, fonts, table, x, width, col_width, header_height, style);
        }

        draw_row(flow, fonts, FontFace::Helvetica, row, x, col_width, style);
        flow.y += height;
        let y = flow.y;
        flow.page().push(DrawOp::Line {
            from: (x, y),
            to: (x + width, y),
            width: style.row_rule,
            gray: ROW_RULE_GRAY,
        });
        if let Some(slice) = flow.page().tables.last_mut() {
            slice.rows.push(row.clone());
        }
    }

    draw_border(flow, x, top, width, style);
}

#[allow(clippy::too_many_arguments)]
fn draw_header(
    flow: &mut Flow,
    fonts: &FontBook,
    table: &Table,
    x: f32,
    width: f32,
    col_width: f32,
    height: f32,
    style: TableStyle,
) {
    draw_row(flow, fonts, FontFace::HelveticaBold, &table.header, x, col_width, style);
    flow.y += height;
    let y = flow.y;
    let page = flow.page();
    page.push(DrawOp::Line {
        from: (x, y),
        to: (x + width, y),
        width: style.header_rule,
        gray: 0.0,
    });
    page.tables.push(TableSlice {
        header: table.header.clone(),
        rows: Vec::new(),
    });
}

fn draw_row(
    flow: &mut Flow,
    fonts: &FontBook,
    face: FontFace,
    cells: &[String],
    x: f32,
    col_width: f32,
    style: TableStyle,
) {
    let y = flow.y + style.padding;
    let text_style = TextStyle::new(face, style.font_size);
    let inner = (col_width - 2.0 * style.padding).max(1.0);
    for (i, cell) in cells.iter().enumerate() {
        let cell_x = x + i as f32 * col_width + style.padding;
        draw_text(flow.page(), fonts, text_style, (cell_x, y), inner, cell);
    }
}

fn draw_border(flow: &mut Flow, x: f32, top: f32, width: f32, style: TableStyle) {
    let height = flow.y - top;
    flow.page().push(DrawOp::Rect {
        x,
        y: top,
        width,
        height,
        line_width: style.border,
    });
}

fn row_height(fonts: &FontBook, face: FontFace, cells: &[String], col_width: f32, style: TableStyle) -> f32 {
    let inner = (col_width - 2.0 * style.padding).max(1.0);
    let lines = cells
        .iter()
        .map(|cell| wrap(fonts, face, style.font_size, cell, inner).len())
        .max()
        .unwrap_or(1)
        .max(1);
    lines as f32 * fonts.line_height(face, style.font_size) + 2.0 * style.padding
}
