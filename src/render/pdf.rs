//! PDF Backend Module
//!
//! `Document`を`pdf-writer`でPDFへ直列化するモジュール。
//!
//! - Helvetica / Helvetica-Bold: 標準14フォント（WinAnsiEncoding、埋め込みなし）
//! - 本文フォント: TrueTypeの単純フォントとして埋め込み（`FontFile2`、Flate圧縮）
//! - 画像: Flate圧縮したRGBのImage XObject（アルファがあればSMask付き）
//!
//! ページ内の座標は左上原点から、PDFの左下原点へ変換します。

use std::io::Write;

use chrono::{Datelike, Timelike};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::types::FontFlags;
use pdf_writer::{Content, Date, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::error::GradeDocError;
use crate::render::fonts::{encode_win_ansi, BodyFont, FontFace};
use crate::render::layout::{Document, DrawOp, Page, RasterImage};

const PRODUCER: &str = concat!("gradesheet ", env!("CARGO_PKG_VERSION"));

/// 本文フォントのFontDescriptorに記録するステム幅（概算値）
const STEM_V: f32 = 80.0;

/// `Document`をPDFのバイト列に変換する
pub(crate) fn write_pdf(doc: &Document) -> Result<Vec<u8>, GradeDocError> {
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let tree_id = alloc.bump();
    let helvetica_id = alloc.bump();
    let bold_id = alloc.bump();
    let info_id = alloc.bump();

    let mut pdf = Pdf::new();
    pdf.type1_font(helvetica_id)
        .base_font(Name(b"Helvetica"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    pdf.type1_font(bold_id)
        .base_font(Name(b"Helvetica-Bold"))
        .encoding_predefined(Name(b"WinAnsiEncoding"));

    let body_id = match doc.fonts.body() {
        Some(font) => Some(write_body_font(&mut pdf, &mut alloc, font)?),
        None => None,
    };

    let image_ids = doc
        .images
        .iter()
        .map(|image| write_image(&mut pdf, &mut alloc, image))
        .collect::<Result<Vec<_>, _>>()?;

    let mut page_ids = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let page_id = alloc.bump();
        let content_id = alloc.bump();
        page_ids.push(page_id);

        let content = page_content(doc, page);
        pdf.stream(content_id, &content);

        let mut writer = pdf.page(page_id);
        writer
            .media_box(Rect::new(0.0, 0.0, page.width, page.height))
            .parent(tree_id)
            .contents(content_id);
        let mut resources = writer.resources();
        {
            let mut fonts = resources.fonts();
            fonts.pair(Name(b"F1"), helvetica_id);
            fonts.pair(Name(b"F2"), bold_id);
            if let Some(id) = body_id {
                fonts.pair(Name(b"F3"), id);
            }
        }
        if !image_ids.is_empty() {
            let mut x_objects = resources.x_objects();
            for (index, id) in image_ids.iter().enumerate() {
                x_objects.pair(Name(image_name(index).as_bytes()), *id);
            }
        }
    }

    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    let created = doc.created;
    let date = Date::new(created.year().clamp(0, 9999) as u16)
        .month(created.month() as u8)
        .day(created.day() as u8)
        .hour(created.hour() as u8)
        .minute(created.minute() as u8)
        .second(created.second() as u8);
    pdf.document_info(info_id)
        .title(TextStr(&doc.title))
        .producer(TextStr(PRODUCER))
        .creation_date(date);

    let bytes = pdf.finish();
    tracing::debug!(
        pages = page_ids.len(),
        bytes = bytes.len(),
        embedded_font = body_id.is_some(),
        "pdf written"
    );
    Ok(bytes)
}

fn font_resource(face: FontFace) -> Name<'static> {
    match face {
        FontFace::Helvetica => Name(b"F1"),
        FontFace::HelveticaBold => Name(b"F2"),
        FontFace::Body => Name(b"F3"),
    }
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

fn page_content(doc: &Document, page: &Page) -> Vec<u8> {
    let height = page.height;
    let mut content = Content::new();

    for op in page.ops() {
        match op {
            DrawOp::Text {
                x,
                y,
                face,
                size,
                word_spacing,
                text,
            } => {
                let face = doc.fonts.resolve(*face);
                let baseline = y + doc.fonts.ascent(face) * size / 1000.0;
                content.begin_text();
                content.set_font(font_resource(face), *size);
                content.set_word_spacing(*word_spacing);
                content.set_text_matrix([1.0, 0.0, 0.0, 1.0, *x, height - baseline]);
                content.show(Str(&encode_win_ansi(text)));
                content.end_text();
            }
            DrawOp::Line {
                from,
                to,
                width,
                gray,
            } => {
                content.set_line_width(*width);
                content.set_stroke_gray(*gray);
                content.move_to(from.0, height - from.1);
                content.line_to(to.0, height - to.1);
                content.stroke();
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height: rect_height,
                line_width,
            } => {
                content.set_line_width(*line_width);
                content.set_stroke_gray(0.0);
                content.rect(*x, height - y - rect_height, *width, *rect_height);
                content.stroke();
            }
            DrawOp::Image {
                index,
                x,
                y,
                width,
                height: image_height,
            } => {
                content.save_state();
                content.transform([
                    *width,
                    0.0,
                    0.0,
                    *image_height,
                    *x,
                    height - y - image_height,
                ]);
                content.x_object(Name(image_name(*index).as_bytes()));
                content.restore_state();
            }
        }
    }

    content.finish()
}

fn write_body_font(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    font: &BodyFont,
) -> Result<Ref, GradeDocError> {
    let font_id = alloc.bump();
    let descriptor_id = alloc.bump();
    let file_id = alloc.bump();

    // pdf-writerのType1Fontは/Subtypeが固定のため、TrueTypeの辞書は直接書く
    {
        let mut dict = pdf.indirect(font_id).dict();
        dict.pair(Name(b"Type"), Name(b"Font"));
        dict.pair(Name(b"Subtype"), Name(b"TrueType"));
        dict.pair(Name(b"BaseFont"), Name(font.name.as_bytes()));
        dict.pair(Name(b"FirstChar"), 32);
        dict.pair(Name(b"LastChar"), 255);
        dict.pair(Name(b"Encoding"), Name(b"WinAnsiEncoding"));
        dict.insert(Name(b"Widths"))
            .array()
            .items(font.widths.iter().copied());
        dict.pair(Name(b"FontDescriptor"), descriptor_id);
    }

    let [x_min, y_min, x_max, y_max] = font.bbox;
    pdf.font_descriptor(descriptor_id)
        .name(Name(font.name.as_bytes()))
        .flags(FontFlags::NON_SYMBOLIC)
        .bbox(Rect::new(x_min, y_min, x_max, y_max))
        .italic_angle(font.italic_angle)
        .ascent(font.ascent)
        .descent(font.descent)
        .cap_height(font.cap_height)
        .stem_v(STEM_V)
        .font_file2(file_id);

    let compressed = deflate(&font.data)?;
    pdf.stream(file_id, &compressed)
        .filter(Filter::FlateDecode)
        .pair(Name(b"Length1"), font.data.len() as i32);

    Ok(font_id)
}

fn write_image(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    image: &RasterImage,
) -> Result<Ref, GradeDocError> {
    let image_id = alloc.bump();
    let width = image.width as i32;
    let height = image.height as i32;

    let mask_id = match &image.alpha {
        Some(alpha) => {
            let mask_id = alloc.bump();
            let data = deflate(alpha)?;
            let mut mask = pdf.image_xobject(mask_id, &data);
            mask.filter(Filter::FlateDecode);
            mask.width(width)
                .height(height)
                .color_space_name(Name(b"DeviceGray"))
                .bits_per_component(8);
            Some(mask_id)
        }
        None => None,
    };

    let data = deflate(&image.rgb)?;
    let mut xobject = pdf.image_xobject(image_id, &data);
    xobject.filter(Filter::FlateDecode);
    xobject
        .width(width)
        .height(height)
        .color_space_name(Name(b"DeviceRGB"))
        .bits_per_component(8);
    if let Some(mask_id) = mask_id {
        xobject.s_mask(mask_id);
    }

    Ok(image_id)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, GradeDocError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| GradeDocError::Render(format!("Compression failed: {}", e)))
}
