//! Font Metrics Module
//!
//! 標準14フォント（Helvetica, Helvetica-Bold）のAFMメトリクスと、
//! 埋め込み用TrueTypeフォントのメトリクスを提供するモジュール。
//! 文字列はすべてWinAnsiEncodingの1バイト符号として扱います。

use crate::error::GradeDocError;

/// 描画に使用する書体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontFace {
    Helvetica,
    HelveticaBold,
    /// 埋め込みTrueTypeフォント（証明書の本文）
    Body,
}

/// Helveticaの文字幅（コード32..=126、1000単位）
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Helvetica-Boldの文字幅（コード32..=126、1000単位）
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 48-63
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 80-95
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 96-111
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 112-126
];

/// ASCII外の文字に使う平均的な幅
const FALLBACK_WIDTH: f32 = 556.0;

/// Helveticaのascender（AFMの`Ascender`）
const HELVETICA_ASCENT: f32 = 718.0;

/// 行の高さ（ascender - descender + lineGap）。AFMのFontBBoxから算出
const HELVETICA_LINE_HEIGHT: f32 = 1156.0;
const HELVETICA_BOLD_LINE_HEIGHT: f32 = 1190.0;

/// WinAnsiEncodingの0x80..=0x9F領域
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

/// 文字をWinAnsiEncodingの符号に変換する（表現できない場合は`None`）
pub(crate) fn win_ansi_code(c: char) -> Option<u8> {
    let cp = c as u32;
    match cp {
        0x20..=0x7E | 0xA0..=0xFF => Some(cp as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(_, ch)| *ch == c)
            .map(|(code, _)| *code),
    }
}

/// WinAnsiEncodingの符号を文字に戻す
fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(code)),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ch)| *ch),
    }
}

/// WinAnsiEncodingで表現できない文字を`?`に置き換える
///
/// 制御文字も`?`になります。改行の扱いは呼び出し側（折り返し処理）の責務です。
pub(crate) fn to_win_ansi(text: &str) -> String {
    text.chars()
        .map(|c| if win_ansi_code(c).is_some() { c } else { '?' })
        .collect()
}

/// WinAnsiEncodingのバイト列へ符号化する
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_code(c).unwrap_or(b'?')).collect()
}

/// 埋め込み用のTrueTypeフォント
///
/// `ttf-parser`で一度だけ解析し、WinAnsiの各符号（32..=255）の幅と
/// FontDescriptorに必要な値を保持します。
#[derive(Debug, Clone)]
pub struct BodyFont {
    /// PostScript名（PDFの`BaseFont`）
    pub(crate) name: String,
    /// フォントファイル本体
    pub(crate) data: Vec<u8>,
    /// 符号32..=255の幅（1000単位）
    pub(crate) widths: Vec<f32>,
    pub(crate) ascent: f32,
    pub(crate) descent: f32,
    pub(crate) line_gap: f32,
    pub(crate) cap_height: f32,
    pub(crate) italic_angle: f32,
    /// `[x_min, y_min, x_max, y_max]`（1000単位）
    pub(crate) bbox: [f32; 4],
}

impl BodyFont {
    /// TrueTypeフォントを解析する
    ///
    /// # 引数
    ///
    /// * `asset_name` - アセット名（PostScript名が取れない場合の名前に使用）
    /// * `data` - フォントファイルのバイト列
    ///
    /// # 戻り値
    ///
    /// * `Ok(BodyFont)` - 解析に成功した場合
    /// * `Err(GradeDocError::Render)` - TrueTypeとして解析できない場合
    pub fn parse(asset_name: &str, data: Vec<u8>) -> Result<Self, GradeDocError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| {
            GradeDocError::Render(format!("Cannot parse font '{}': {}", asset_name, e))
        })?;

        let upem = f32::from(face.units_per_em().max(1));
        let scale = |v: f32| v * 1000.0 / upem;

        let notdef = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(f32::from)
            .unwrap_or(0.0);
        let widths = (32u8..=255)
            .map(|code| {
                let advance = win_ansi_char(code)
                    .and_then(|c| face.glyph_index(c))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(f32::from)
                    .unwrap_or(notdef);
                scale(advance)
            })
            .collect();

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| pdf_name(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| pdf_name(asset_stem(asset_name)));

        let ascent = scale(f32::from(face.ascender()));
        let bbox = face.global_bounding_box();

        Ok(Self {
            name,
            widths,
            ascent,
            descent: scale(f32::from(face.descender())),
            line_gap: scale(f32::from(face.line_gap())),
            cap_height: face
                .capital_height()
                .map(|h| scale(f32::from(h)))
                .unwrap_or(ascent),
            italic_angle: face.italic_angle(),
            bbox: [
                scale(f32::from(bbox.x_min)),
                scale(f32::from(bbox.y_min)),
                scale(f32::from(bbox.x_max)),
                scale(f32::from(bbox.y_max)),
            ],
            data,
        })
    }

    /// PostScript名
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn asset_stem(asset_name: &str) -> &str {
    let file = asset_name.rsplit(['/', '\\']).next().unwrap_or(asset_name);
    file.split('.').next().unwrap_or(file)
}

/// PDFの名前オブジェクトに使える文字だけを残す
fn pdf_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+'))
        .collect()
}

/// 書体ごとのメトリクス
///
/// 標準14フォントは常に利用でき、本文フォントは証明書の描画時のみ設定されます。
/// 本文フォントが無い場合、`FontFace::Body`はHelveticaとして計測されます。
#[derive(Debug, Clone, Default)]
pub(crate) struct FontBook {
    body: Option<BodyFont>,
}

impl FontBook {
    pub fn with_body(body: BodyFont) -> Self {
        Self { body: Some(body) }
    }

    pub fn body(&self) -> Option<&BodyFont> {
        self.body.as_ref()
    }

    /// 実際に使われる書体（本文フォント未設定時はHelveticaへ）
    pub fn resolve(&self, face: FontFace) -> FontFace {
        match face {
            FontFace::Body if self.body.is_none() => FontFace::Helvetica,
            other => other,
        }
    }

    fn char_width(&self, face: FontFace, code: u8) -> f32 {
        match self.resolve(face) {
            FontFace::Helvetica => afm_width(&HELVETICA_WIDTHS, code),
            FontFace::HelveticaBold => afm_width(&HELVETICA_BOLD_WIDTHS, code),
            FontFace::Body => self
                .body
                .as_ref()
                .and_then(|b| b.widths.get(usize::from(code.saturating_sub(32))))
                .copied()
                .unwrap_or(FALLBACK_WIDTH),
        }
    }

    /// 文字列の幅（pt）
    pub fn text_width(&self, face: FontFace, text: &str, size: f32) -> f32 {
        let units: f32 = encode_win_ansi(text)
            .into_iter()
            .map(|code| self.char_width(face, code))
            .sum();
        units * size / 1000.0
    }

    /// ascender（1000単位）
    pub fn ascent(&self, face: FontFace) -> f32 {
        match (self.resolve(face), &self.body) {
            (FontFace::Body, Some(body)) => body.ascent,
            _ => HELVETICA_ASCENT,
        }
    }

    /// 1行分の高さ（pt、行間を含む）
    pub fn line_height(&self, face: FontFace, size: f32) -> f32 {
        let units = match (self.resolve(face), &self.body) {
            (FontFace::Body, Some(body)) => body.ascent - body.descent + body.line_gap,
            (FontFace::HelveticaBold, _) => HELVETICA_BOLD_LINE_HEIGHT,
            _ => HELVETICA_LINE_HEIGHT,
        };
        units * size / 1000.0
    }
}

fn afm_width(table: &[u16; 95], code: u8) -> f32 {
    match code {
        32..=126 => f32::from(table[usize::from(code - 32)]),
        _ => FALLBACK_WIDTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEJAVU: &[u8] = include_bytes!("../../tests/fixtures/assets/DejaVuSerif.ttf");

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi_code('A'), Some(b'A'));
        assert_eq!(win_ansi_code('é'), Some(0xE9));
        assert_eq!(win_ansi_code('€'), Some(0x80));
        assert_eq!(win_ansi_code('\u{2019}'), Some(0x92));
        assert_eq!(win_ansi_code('漢'), None);
        assert_eq!(win_ansi_code('\t'), None);
    }

    #[test]
    fn test_to_win_ansi_replaces_unrepresentable() {
        assert_eq!(to_win_ansi("Café 漢字"), "Café ??");
        assert_eq!(encode_win_ansi("A€"), vec![b'A', 0x80]);
    }

    #[test]
    fn test_helvetica_widths() {
        let fonts = FontBook::default();
        // "Hi" = 722 + 222
        let width = fonts.text_width(FontFace::Helvetica, "Hi", 10.0);
        assert!((width - 9.44).abs() < 1e-4);
        let bold = fonts.text_width(FontFace::HelveticaBold, "Hi", 10.0);
        assert!((bold - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_line_heights() {
        let fonts = FontBook::default();
        assert!((fonts.line_height(FontFace::Helvetica, 10.0) - 11.56).abs() < 1e-4);
        assert!((fonts.line_height(FontFace::HelveticaBold, 10.0) - 11.9).abs() < 1e-4);
    }

    #[test]
    fn test_body_falls_back_to_helvetica() {
        let fonts = FontBook::default();
        assert_eq!(fonts.resolve(FontFace::Body), FontFace::Helvetica);
        assert_eq!(
            fonts.text_width(FontFace::Body, "abc", 12.0),
            fonts.text_width(FontFace::Helvetica, "abc", 12.0)
        );
    }

    #[test]
    fn test_parse_body_font() {
        let font = BodyFont::parse("fonts/DejaVuSerif.ttf", DEJAVU.to_vec()).unwrap();
        assert!(!font.name().is_empty());
        assert!(!font.name().contains(' '));
        assert_eq!(font.widths.len(), 224);
        assert!(font.ascent > 0.0);
        assert!(font.descent < 0.0);

        let fonts = FontBook::with_body(font);
        assert_eq!(fonts.resolve(FontFace::Body), FontFace::Body);
        assert!(fonts.text_width(FontFace::Body, "W", 10.0) > 0.0);
    }

    #[test]
    fn test_parse_rejects_non_font() {
        let result = BodyFont::parse("body.ttf", b"not a font".to_vec());
        assert!(matches!(result, Err(GradeDocError::Render(_))));
    }

    #[test]
    fn test_asset_stem() {
        assert_eq!(asset_stem("fonts/DejaVu Serif.ttf"), "DejaVu Serif");
        assert_eq!(pdf_name("DejaVu Serif"), "DejaVuSerif");
    }
}
