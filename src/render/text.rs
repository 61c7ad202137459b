//! Text Layout Module
//!
//! 単語単位の折り返しと行揃え（左・中央・右・両端）。

use crate::render::fonts::{to_win_ansi, FontBook, FontFace};
use crate::render::layout::{DrawOp, Page};

/// 行揃え
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
    Right,
    /// 段落の最終行以外をワードスペーシングで両端に揃える
    Justify,
}

/// テキストブロックの書式
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextStyle {
    pub face: FontFace,
    pub size: f32,
    pub align: Align,
    /// 行間に追加する余白（pt）
    pub line_gap: f32,
}

impl TextStyle {
    pub fn new(face: FontFace, size: f32) -> Self {
        Self {
            face,
            size,
            align: Align::Left,
            line_gap: 0.0,
        }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn line_gap(mut self, gap: f32) -> Self {
        self.line_gap = gap;
        self
    }

    /// 1行の送り量
    pub fn advance(&self, fonts: &FontBook) -> f32 {
        fonts.line_height(self.face, self.size) + self.line_gap
    }
}

/// 折り返し後の1行
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub text: String,
    /// 段落の最終行か（両端揃えの対象外）
    pub last_in_paragraph: bool,
}

/// テキストを`max_width`に収まるよう折り返す
///
/// 改行で段落を分け、段落内の連続する空白は1つにまとめます。
/// 1単語が`max_width`を超える場合は文字単位で分割します。
/// 空の段落は空行として残ります。
pub(crate) fn wrap(
    fonts: &FontBook,
    face: FontFace,
    size: f32,
    text: &str,
    max_width: f32,
) -> Vec<Line> {
    let text = text.replace("\r\n", "\n").replace(['\r', '\t'], " ");
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = to_win_ansi(paragraph);
        let mut current = String::new();
        let mut paragraph_lines: Vec<String> = Vec::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if fonts.text_width(face, &candidate, size) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                paragraph_lines.push(std::mem::take(&mut current));
            }
            if fonts.text_width(face, word, size) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = break_word(fonts, face, size, word, max_width);
                current = pieces.pop().unwrap_or_default();
                paragraph_lines.extend(pieces);
            }
        }
        paragraph_lines.push(current);

        let count = paragraph_lines.len();
        lines.extend(paragraph_lines.into_iter().enumerate().map(|(i, text)| Line {
            text,
            last_in_paragraph: i + 1 == count,
        }));
    }

    lines
}

/// 1単語を文字単位で分割する（各断片は最低1文字）
fn break_word(fonts: &FontBook, face: FontFace, size: f32, word: &str, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        current.push(c);
        if current.chars().count() > 1 && fonts.text_width(face, &current, size) > max_width {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(c);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// 折り返したテキストをページに描画し、描画後のyを返す
///
/// # 引数
///
/// * `page` - 描画先のページ
/// * `fonts` - 計測に使うフォント
/// * `style` - 書体・サイズ・揃え・行間
/// * `(x, y)` - ブロックの左上
/// * `width` - ブロックの幅
/// * `text` - 描画するテキスト
pub(crate) fn draw_text(
    page: &mut Page,
    fonts: &FontBook,
    style: TextStyle,
    (x, y): (f32, f32),
    width: f32,
    text: &str,
) -> f32 {
    let advance = style.advance(fonts);
    let lines = wrap(fonts, style.face, style.size, text, width);
    let mut cursor = y;

    for line in lines {
        let line_width = fonts.text_width(style.face, &line.text, style.size);
        let mut word_spacing = 0.0;
        let line_x = match style.align {
            Align::Left => x,
            Align::Center => x + (width - line_width) / 2.0,
            Align::Right => x + width - line_width,
            Align::Justify => {
                let spaces = line.text.matches(' ').count();
                if !line.last_in_paragraph && spaces > 0 {
                    word_spacing = (width - line_width) / spaces as f32;
                }
                x
            }
        };

        if !line.text.is_empty() {
            page.push(DrawOp::Text {
                x: line_x,
                y: cursor,
                face: style.face,
                size: style.size,
                word_spacing,
                text: line.text,
            });
        }
        cursor += advance;
    }

    cursor
}
