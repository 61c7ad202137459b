//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得できない情報を抽出するモジュール。
//! 先頭ワークシートのリッチテキストのラン構成、ハイパーリンクのリンク先、
//! 1904年エポック判定を提供します。

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::SourceReadError;
use crate::security::{validate_zip_path, SecurityConfig};
use crate::types::RichTextRun;

/// 先頭ワークシートのXMLメタデータ
#[derive(Debug, Clone, Default)]
pub(crate) struct XlsxMetadata {
    /// 1904年エポックを使用するかどうか
    pub is_1904: bool,
    /// セル座標 -> リッチテキストのラン（`<r>`要素を持つ共有文字列のみ）
    pub rich_text: HashMap<(u32, u32), Vec<RichTextRun>>,
    /// セル座標 -> ハイパーリンクのリンク先
    pub hyperlinks: HashMap<(u32, u32), String>,
}

/// ワークシートXMLから読み取ったセル情報
#[derive(Debug, Default)]
struct WorksheetScan {
    /// セル座標 -> 共有文字列インデックス
    string_indices: HashMap<(u32, u32), u32>,
    /// セル座標 -> リレーションシップID、または`#location`形式の内部リンク
    hyperlink_refs: Vec<((u32, u32), HyperlinkRef)>,
}

#[derive(Debug)]
enum HyperlinkRef {
    Relationship(String),
    Location(String),
}

impl XlsxMetadata {
    /// XLSXファイル（ZIPアーカイブ）から先頭ワークシートのメタデータを解析
    ///
    /// # 引数
    ///
    /// * `xlsx_reader` - XLSXファイルを読み込むためのリーダー（Read + Seekトレイトを実装）
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxMetadata)` - メタデータの解析に成功した場合
    /// * `Err(SourceReadError)` - ZIP/XMLの解析エラー、またはセキュリティ制限違反
    pub fn parse<R: Read + Seek>(xlsx_reader: R) -> Result<Self, SourceReadError> {
        let security_config = SecurityConfig::default();

        let mut archive =
            ZipArchive::new(xlsx_reader).map_err(|e| SourceReadError::Zip(e.to_string()))?;
        Self::check_archive(&mut archive, &security_config)?;

        // 1. xl/workbook.xml: エポックと先頭シートのリレーションシップID
        let workbook = read_part(&mut archive, "xl/workbook.xml")?;
        let (is_1904, first_sheet_rel) = match workbook {
            Some(xml) => parse_workbook(&xml)?,
            None => (false, None),
        };

        // 2. xl/_rels/workbook.xml.rels: 先頭シートのパス
        let sheet_path = match first_sheet_rel {
            Some(rel_id) => {
                let rels = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
                    Some(xml) => parse_relationships(&xml)?,
                    None => HashMap::new(),
                };
                rels.get(&rel_id).map(|target| resolve_part_path("xl", target))
            }
            None => None,
        };
        let Some(sheet_path) = sheet_path else {
            tracing::warn!("first worksheet part could not be resolved; skipping rich metadata");
            return Ok(Self {
                is_1904,
                ..Default::default()
            });
        };

        // 3. ワークシートXML
        let scan = match read_part(&mut archive, &sheet_path)? {
            Some(xml) => parse_worksheet(&xml)?,
            None => WorksheetScan::default(),
        };

        // 4. xl/sharedStrings.xml（インデックスが参照されている場合のみ）
        let shared_strings = if scan.string_indices.is_empty() {
            HashMap::new()
        } else {
            match read_part(&mut archive, "xl/sharedStrings.xml")? {
                Some(xml) => parse_shared_strings(&xml)?,
                None => HashMap::new(),
            }
        };

        let rich_text = scan
            .string_indices
            .iter()
            .filter_map(|(coord, index)| {
                shared_strings
                    .get(index)
                    .map(|runs| (*coord, runs.clone()))
            })
            .collect();

        // 5. ワークシートのリレーションシップからハイパーリンクのリンク先を解決
        let mut hyperlinks = HashMap::new();
        if !scan.hyperlink_refs.is_empty() {
            let sheet_rels = match read_part(&mut archive, &sheet_rels_path(&sheet_path))? {
                Some(xml) => parse_relationships(&xml)?,
                None => HashMap::new(),
            };
            for (coord, link) in scan.hyperlink_refs {
                let target = match link {
                    HyperlinkRef::Relationship(id) => sheet_rels.get(&id).cloned(),
                    HyperlinkRef::Location(location) => Some(format!("#{}", location)),
                };
                if let Some(target) = target {
                    hyperlinks.insert(coord, target);
                }
            }
        }

        Ok(Self {
            is_1904,
            rich_text,
            hyperlinks,
        })
    }

    /// アーカイブ全体のセキュリティチェック
    fn check_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        security_config: &SecurityConfig,
    ) -> Result<(), SourceReadError> {
        if archive.len() > security_config.max_file_count {
            return Err(SourceReadError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                security_config.max_file_count
            )));
        }

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| SourceReadError::Zip(e.to_string()))?;

            let file_name = file.name();
            validate_zip_path(file_name).map_err(|e| {
                SourceReadError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;

            let file_size = file.size();
            if file_size > security_config.max_file_size {
                return Err(SourceReadError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, security_config.max_file_size
                )));
            }

            total_decompressed_size = total_decompressed_size
                .checked_add(file_size)
                .ok_or_else(|| {
                    SourceReadError::SecurityViolation(
                        "Total decompressed size calculation overflow".to_string(),
                    )
                })?;

            if total_decompressed_size > security_config.max_decompressed_size {
                return Err(SourceReadError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, security_config.max_decompressed_size
                )));
            }
        }

        Ok(())
    }
}

/// パッケージ内のパートを読み込む（存在しない場合は`None`）
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, SourceReadError> {
    validate_zip_path(name)
        .map_err(|e| SourceReadError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(SourceReadError::Zip(e.to_string())),
    };

    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

fn xml_error(e: quick_xml::Error) -> SourceReadError {
    SourceReadError::Xml(e.to_string())
}

fn attr_value(attr: &Attribute<'_>) -> Result<String, SourceReadError> {
    let raw = std::str::from_utf8(&attr.value)?;
    quick_xml::escape::unescape(raw)
        .map(|v| v.into_owned())
        .map_err(|e| SourceReadError::Xml(format!("XML escape error: {}", e)))
}

/// 要素の属性を`(ローカル名, プレフィックス有無, 値)`の並びで取得
fn attributes(e: &BytesStart<'_>) -> Result<Vec<(Vec<u8>, bool, String)>, SourceReadError> {
    let mut result = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SourceReadError::Xml(format!("XML attribute error: {}", e)))?;
        let local = attr.key.local_name().as_ref().to_vec();
        let prefixed = attr.key.prefix().is_some();
        result.push((local, prefixed, attr_value(&attr)?));
    }
    Ok(result)
}

/// xl/workbook.xml の解析
///
/// `<workbookPr date1904="1"/>`と、最初の`<sheet r:id="..."/>`を取得します。
fn parse_workbook(xml: &[u8]) -> Result<(bool, Option<String>), SourceReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut is_1904 = false;
    let mut first_sheet = None;

    loop {
        match reader.read_event_into(&mut buf) {
            // workbookPrとsheetは通常、自己終了タグ
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    for (key, _, value) in attributes(&e)? {
                        if key == b"date1904" {
                            is_1904 = value == "1" || value == "true";
                        }
                    }
                }
                b"sheet" if first_sheet.is_none() => {
                    first_sheet = attributes(&e)?
                        .into_iter()
                        .find(|(key, prefixed, _)| key == b"id" && *prefixed)
                        .map(|(_, _, value)| value);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok((is_1904, first_sheet))
}

/// リレーションシップファイルの解析（Id -> Target）
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, SourceReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut id = None;
                    let mut target = None;
                    for (key, _, value) in attributes(&e)? {
                        match key.as_slice() {
                            b"Id" => id = Some(value),
                            b"Target" => target = Some(value),
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(target)) = (id, target) {
                        relationships.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// xl/sharedStrings.xml の解析
///
/// `<r>`要素を持つ`<si>`だけをラン列として返します。
/// ランの前後の空白を保つため、テキストのトリムは行いません。
fn parse_shared_strings(xml: &[u8]) -> Result<HashMap<u32, Vec<RichTextRun>>, SourceReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut shared_strings = HashMap::new();
    let mut index: u32 = 0;
    let mut in_si = false;
    let mut in_r = false;
    let mut in_rpr = false;
    let mut in_t = false;
    let mut runs: Vec<RichTextRun> = Vec::new();
    let mut current = RichTextRun::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    runs.clear();
                }
                b"r" if in_si => {
                    in_r = true;
                    current = RichTextRun::default();
                }
                b"rPr" if in_r => in_rpr = true,
                b"t" if in_r => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                // 空の<si/>も共有文字列の1件として数える
                b"si" => index += 1,
                b"b" if in_rpr => current.bold = !has_false_val(&e)?,
                b"i" if in_rpr => current.italic = !has_false_val(&e)?,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_t {
                    let text = e.unescape().map_err(xml_error)?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPr" => in_rpr = false,
                b"r" if in_r => {
                    in_r = false;
                    runs.push(std::mem::take(&mut current));
                }
                b"si" => {
                    if !runs.is_empty() {
                        shared_strings.insert(index, std::mem::take(&mut runs));
                    }
                    index += 1;
                    in_si = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(shared_strings)
}

/// `<b val="0"/>`のような明示的な無効指定かどうか
fn has_false_val(e: &BytesStart<'_>) -> Result<bool, SourceReadError> {
    Ok(attributes(e)?
        .iter()
        .any(|(key, _, value)| key == b"val" && (value == "0" || value == "false")))
}

/// ワークシートXMLの解析
///
/// 共有文字列を参照するセル（`t="s"`）のインデックスと、`<hyperlink>`要素を収集します。
fn parse_worksheet(xml: &[u8]) -> Result<WorksheetScan, SourceReadError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut scan = WorksheetScan::default();
    let mut current_cell: Option<(u32, u32)> = None;
    let mut is_shared_string = false;
    let mut in_v = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    current_cell = None;
                    is_shared_string = false;
                    for (key, _, value) in attributes(&e)? {
                        match key.as_slice() {
                            b"r" => current_cell = parse_cell_ref(&value),
                            b"t" => is_shared_string = value == "s",
                            _ => {}
                        }
                    }
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"hyperlink" {
                    collect_hyperlink(&e, &mut scan)?;
                }
            }
            Ok(Event::Text(e)) => {
                if in_v && is_shared_string {
                    if let Some(coord) = current_cell {
                        let text = e.unescape().map_err(xml_error)?;
                        let index = text.trim().parse::<u32>()?;
                        scan.string_indices.insert(coord, index);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => {
                    current_cell = None;
                    is_shared_string = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(scan)
}

fn collect_hyperlink(e: &BytesStart<'_>, scan: &mut WorksheetScan) -> Result<(), SourceReadError> {
    let mut coord = None;
    let mut rel_id = None;
    let mut location = None;

    for (key, prefixed, value) in attributes(e)? {
        match key.as_slice() {
            // 範囲指定（"A1:B2"）の場合は左上セルに対応付ける
            b"ref" => coord = value.split(':').next().and_then(parse_cell_ref),
            b"id" if prefixed => rel_id = Some(value),
            b"location" => location = Some(value),
            _ => {}
        }
    }

    let link = match (rel_id, location) {
        (Some(id), _) => HyperlinkRef::Relationship(id),
        (None, Some(location)) => HyperlinkRef::Location(location),
        (None, None) => return Ok(()),
    };
    if let Some(coord) = coord {
        scan.hyperlink_refs.push((coord, link));
    }
    Ok(())
}

/// セル参照文字列を座標に変換（例: "A1" -> (0, 0)、"$B$3" -> (2, 1)）
fn parse_cell_ref(ref_str: &str) -> Option<(u32, u32)> {
    let ref_str = ref_str.replace('$', "");
    let split = ref_str.find(|c: char| c.is_ascii_digit())?;
    let (col_str, row_str) = ref_str.split_at(split);
    if col_str.is_empty() || !col_str.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    // 列を数値に変換（A=0, B=1, ..., Z=25, AA=26, ...）
    let mut col: u32 = 0;
    for ch in col_str.chars() {
        let digit = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }

    let row = row_str.parse::<u32>().ok()?.checked_sub(1)?;
    Some((row, col - 1))
}

/// リレーションシップのTargetをパッケージ内の絶対パスへ解決
///
/// `"worksheets/sheet1.xml"`（`base`からの相対）と`"/xl/worksheets/sheet1.xml"`（絶対）の
/// 両方の表記に対応します。
fn resolve_part_path(base: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("{}/{}", base, target)
    }
}

/// ワークシートパートに対応するリレーションシップファイルのパス
fn sheet_rels_path(sheet_path: &str) -> String {
    match sheet_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", sheet_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("C2"), Some((1, 2)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("$B$3"), Some((2, 1)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("B"), None);
    }

    #[test]
    fn test_resolve_part_path() {
        assert_eq!(
            resolve_part_path("xl", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_part_path("xl", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(
            sheet_rels_path("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }

    #[test]
    fn test_parse_workbook_empty_workbook_pr() {
        let xml = br#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="1"/>
<sheets>
<sheet name="Grades" sheetId="7" r:id="rId3"/>
<sheet name="Other" sheetId="1" r:id="rId1"/>
</sheets>
</workbook>"#;
        let (is_1904, first) = parse_workbook(xml).unwrap();
        assert!(is_1904);
        assert_eq!(first.as_deref(), Some("rId3"));
    }

    #[test]
    fn test_parse_shared_strings_runs() {
        let xml = br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>Plain</t></si>
<si><r><rPr><b/></rPr><t>Al</t></r><r><t xml:space="preserve"> ice</t></r></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        assert!(!strings.contains_key(&0));
        let runs = &strings[&1];
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Al");
        assert!(runs[0].bold);
        assert_eq!(runs[1].text, " ice");
        assert!(!runs[1].bold);
    }

    #[test]
    fn test_parse_shared_strings_empty_si_keeps_indices() {
        let xml = br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si/>
<si><r><t>Al</t></r><r><t>ice</t></r></si>
<si/>
<si><r><rPr><i/></rPr><t>A+</t></r></si>
</sst>"#;
        let strings = parse_shared_strings(xml).unwrap();
        let mut indices: Vec<_> = strings.keys().copied().collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(strings[&1][0].text, "Al");
        assert_eq!(strings[&1][1].text, "ice");
        assert_eq!(strings[&3][0].text, "A+");
        assert!(strings[&3][0].italic);
    }

    #[test]
    fn test_parse_worksheet_indices_and_links() {
        let xml = br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
 xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheetData>
<row r="1"><c r="A1" t="s"><v>4</v></c><c r="B1"><f>1+1</f><v>2</v></c></row>
</sheetData>
<hyperlinks>
<hyperlink ref="B2" r:id="rId1"/>
<hyperlink ref="C3:D4" location="Sheet2!A1"/>
</hyperlinks>
</worksheet>"#;
        let scan = parse_worksheet(xml).unwrap();
        assert_eq!(scan.string_indices.get(&(0, 0)), Some(&4));
        assert!(!scan.string_indices.contains_key(&(0, 1)));
        assert_eq!(scan.hyperlink_refs.len(), 2);
        assert_eq!(scan.hyperlink_refs[1].0, (2, 2));
    }

    #[test]
    fn test_parse_relationships() {
        let xml = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels["rId1"], "https://example.com/?a=1&b=2");
    }
}
