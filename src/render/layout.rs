//! Page Layout Module
//!
//! 描画命令とページ、レンダリング結果の`Document`を定義するモジュール。
//! 座標はページ左上を原点とし、yは下向きに増加します（単位はpt）。
//! PDFの座標系への変換は`pdf`モジュールが行います。

use chrono::NaiveDateTime;

use crate::error::GradeDocError;
use crate::render::fonts::{FontBook, FontFace};

/// A4縦（pt）
pub(crate) const A4_PORTRAIT: (f32, f32) = (595.28, 841.89);
/// A4横（pt）
pub(crate) const A4_LANDSCAPE: (f32, f32) = (841.89, 595.28);

/// 描画命令
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrawOp {
    /// 1行のテキスト。`y`は行の上端
    Text {
        x: f32,
        y: f32,
        face: FontFace,
        size: f32,
        word_spacing: f32,
        text: String,
    },
    /// 直線
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        gray: f32,
    },
    /// 矩形の枠線
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
    },
    /// `Document::images`のインデックスで参照する画像
    Image {
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// 1ページに描画された表の断片
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSlice {
    /// このページで描画された見出し行
    pub header: Vec<String>,
    /// このページで描画された本体行
    pub rows: Vec<Vec<String>>,
}

/// ページ内の領域
///
/// 描画命令はそれぞれ1つの領域に属します。新しいページは`Body`から始まります。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Region {
    /// 見出し（一覧レポートの表題、証明書のレターヘッド）
    Header,
    /// 本文と表
    #[default]
    Body,
    /// フッター
    Footer,
}

/// 1ページ分の描画内容
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub(crate) width: f32,
    pub(crate) height: f32,
    region: Region,
    ops: Vec<(Region, DrawOp)>,
    pub(crate) tables: Vec<TableSlice>,
}

impl Page {
    pub(crate) fn new((width, height): (f32, f32)) -> Self {
        Self {
            width,
            height,
            region: Region::default(),
            ops: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// ページの幅と高さ（pt）
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// 描画順のテキスト行
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops().filter_map(text_of)
    }

    /// 指定した領域のテキスト行（描画順）
    pub fn region_texts(&self, region: Region) -> impl Iterator<Item = &str> {
        self.ops
            .iter()
            .filter(move |(r, _)| *r == region)
            .filter_map(|(_, op)| text_of(op))
    }

    /// このページに描画された表の断片
    pub fn tables(&self) -> &[TableSlice] {
        &self.tables
    }

    /// テキスト行の位置（x, 上端y）
    pub fn text_position(&self, needle: &str) -> Option<(f32, f32)> {
        self.ops().find_map(|op| match op {
            DrawOp::Text { x, y, text, .. } if text == needle => Some((*x, *y)),
            _ => None,
        })
    }

    /// 以降の描画命令を`region`に割り当てる
    pub(crate) fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    pub(crate) fn push(&mut self, op: DrawOp) {
        self.ops.push((self.region, op));
    }

    /// 全領域の描画命令（描画順）
    pub(crate) fn ops(&self) -> impl Iterator<Item = &DrawOp> {
        self.ops.iter().map(|(_, op)| op)
    }
}

fn text_of(op: &DrawOp) -> Option<&str> {
    match op {
        DrawOp::Text { text, .. } => Some(text.as_str()),
        _ => None,
    }
}

/// RGB画像（アルファは任意）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// 行優先のRGB（各8bit）
    pub(crate) rgb: Vec<u8>,
    /// 不透明でない場合のみ、8bitのアルファ
    pub(crate) alpha: Option<Vec<u8>>,
}

impl RasterImage {
    /// 画像の幅と高さ（px）
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// レンダリング結果
///
/// ページごとの描画命令を保持し、`to_pdf`でPDFに変換します。
/// テキストと表の内容を検査できるため、PDFを解析せずにレイアウトを検証できます。
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) title: String,
    pub(crate) pages: Vec<Page>,
    pub(crate) images: Vec<RasterImage>,
    pub(crate) fonts: FontBook,
    pub(crate) created: NaiveDateTime,
}

impl Document {
    /// 文書のタイトル
    pub fn title(&self) -> &str {
        &self.title
    }

    /// ページ一覧
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// ページ数
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 全ページのテキスト行（描画順）
    pub fn text_content(&self) -> Vec<String> {
        self.pages
            .iter()
            .flat_map(|page| page.texts().map(str::to_string))
            .collect()
    }

    /// 全ページの表の本体行（繰り返された見出し行は含まない）
    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.pages
            .iter()
            .flat_map(|page| page.tables.iter())
            .flat_map(|slice| slice.rows.iter().cloned())
            .collect()
    }

    /// PDFへ変換する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Vec<u8>)` - PDFのバイト列
    /// * `Err(GradeDocError::Render)` - 埋め込みデータの圧縮に失敗した場合
    pub fn to_pdf(&self) -> Result<Vec<u8>, GradeDocError> {
        crate::render::pdf::write_pdf(self)
    }
}

/// ページをまたいで下方向に流し込むためのカーソル
///
/// `y`が`bottom`を超える場合は`break_page`で新しいページへ移り、
/// `y`は`top`に戻ります。
pub(crate) struct Flow {
    size: (f32, f32),
    done: Vec<Page>,
    current: Page,
    pub y: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Flow {
    pub fn new(size: (f32, f32), top: f32, bottom: f32) -> Self {
        Self {
            size,
            done: Vec::new(),
            current: Page::new(size),
            y: top,
            top,
            bottom,
        }
    }

    pub fn page(&mut self) -> &mut Page {
        &mut self.current
    }

    /// 現在のページに`height`分の余白が残っているか
    pub fn fits(&self, height: f32) -> bool {
        self.y + height <= self.bottom
    }

    pub fn break_page(&mut self) {
        let finished = std::mem::replace(&mut self.current, Page::new(self.size));
        self.done.push(finished);
        self.y = self.top;
    }

    /// 残りが足りなければ改ページする
    pub fn ensure(&mut self, height: f32) {
        if !self.fits(height) {
            self.break_page();
        }
    }

    pub fn finish(mut self) -> Vec<Page> {
        self.done.push(self.current);
        self.done
    }
}

/// 1行のテキストを描画命令として追加する
pub(crate) fn text_op(x: f32, y: f32, face: FontFace, size: f32, text: &str) -> DrawOp {
    DrawOp::Text {
        x,
        y,
        face,
        size,
        word_spacing: 0.0,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_breaks_pages() {
        let mut flow = Flow::new(A4_PORTRAIT, 50.0, 100.0);
        flow.y = 90.0;
        assert!(flow.fits(10.0));
        assert!(!flow.fits(10.5));

        flow.ensure(20.0);
        assert_eq!(flow.y, 50.0);
        flow.page().push(text_op(0.0, 50.0, FontFace::Helvetica, 10.0, "second"));

        let pages = flow.finish();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].texts().collect::<Vec<_>>(), vec!["second"]);
    }

    #[test]
    fn test_region_texts() {
        let mut page = Page::new(A4_LANDSCAPE);
        page.set_region(Region::Header);
        page.push(text_op(30.0, 30.0, FontFace::Helvetica, 20.0, "title"));
        page.set_region(Region::Body);
        page.push(text_op(30.0, 80.0, FontFace::Helvetica, 10.0, "cell"));
        page.set_region(Region::Footer);
        page.push(text_op(30.0, 545.0, FontFace::Helvetica, 10.0, "footer"));

        assert_eq!(page.region_texts(Region::Header).collect::<Vec<_>>(), vec!["title"]);
        assert_eq!(page.region_texts(Region::Body).collect::<Vec<_>>(), vec!["cell"]);
        assert_eq!(page.region_texts(Region::Footer).collect::<Vec<_>>(), vec!["footer"]);
        assert_eq!(page.texts().count(), 3);
    }

    #[test]
    fn test_new_page_starts_in_body() {
        let mut flow = Flow::new(A4_PORTRAIT, 50.0, 100.0);
        flow.page().set_region(Region::Header);
        flow.break_page();
        flow.page().push(text_op(0.0, 50.0, FontFace::Helvetica, 10.0, "row"));

        let pages = flow.finish();
        assert_eq!(pages[1].region_texts(Region::Body).collect::<Vec<_>>(), vec!["row"]);
    }

    #[test]
    fn test_text_position() {
        let mut page = Page::new(A4_LANDSCAPE);
        page.push(text_op(30.0, 40.0, FontFace::Helvetica, 10.0, "hello"));
        assert_eq!(page.text_position("hello"), Some((30.0, 40.0)));
        assert_eq!(page.text_position("absent"), None);
        assert_eq!(page.size(), (841.89, 595.28));
    }
}
