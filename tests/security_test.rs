//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! ZIP bomb攻撃、パストラバーサル攻撃（ZIP内パス・アップロード名・レコードのキー）
//! への対策を検証します。

use gradesheet::{
    extract_from_reader, FsAssetStore, AssetStore, GradeDocError, MemoryAssetStore,
    PipelineBuilder, SourceHandle, SourceReadError, SourceStore, TemplateParams, UploadDir,
};
use rust_xlsxwriter::Workbook;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

fn zip_with_entries(entries: &[&str]) -> Vec<u8> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for name in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(b"test").unwrap();
        }

        zip.finish().unwrap();
    }
    zip_data
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let names: Vec<String> = (0..10_001).map(|i| format!("xl/file{}.xml", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let zip_data = zip_with_entries(&names);

    let result = extract_from_reader(Cursor::new(zip_data));

    match result {
        Err(SourceReadError::SecurityViolation(msg)) => {
            assert!(msg.contains("too many files"));
        }
        e => panic!("Expected SecurityViolation error, got {:?}", e),
    }
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let zip_data = zip_with_entries(&["../etc/passwd"]);
    let result = extract_from_reader(Cursor::new(zip_data));

    assert!(result.is_err());
    // ZIPライブラリがパスを正規化した場合は、XLSXとして認識されずパースエラーになる
    match result {
        Err(SourceReadError::SecurityViolation(msg)) => {
            assert!(msg.contains("Path traversal") || msg.contains("Invalid ZIP path"));
        }
        Err(SourceReadError::Parse(_)) | Err(SourceReadError::Zip(_)) => {}
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute_path() {
    let zip_data = zip_with_entries(&["/etc/passwd"]);
    let result = extract_from_reader(Cursor::new(zip_data));

    assert!(result.is_err());
    match result {
        Err(SourceReadError::SecurityViolation(msg)) => {
            assert!(msg.contains("Absolute path") || msg.contains("Invalid ZIP path"));
        }
        Err(SourceReadError::Parse(_)) | Err(SourceReadError::Zip(_)) => {}
        e => panic!("Unexpected error: {:?}", e),
    }
}

/// ファイルサイズ制限のテスト: 入力ファイルが大きすぎる場合
#[test]
#[ignore] // 大きなファイルを作成するため、通常のテストではスキップ
fn test_input_file_size_limit() {
    // 2GB + 1バイトの大きなファイルを作成
    let large_data = vec![0u8; 2_147_483_649];

    match extract_from_reader(Cursor::new(large_data)) {
        Err(SourceReadError::SecurityViolation(msg)) => {
            assert!(msg.contains("Input file size"));
        }
        _ => panic!("Expected SecurityViolation error"),
    }
}

/// 正常な構造のZIPはセキュリティエラーにならない
#[test]
fn test_valid_structure_is_not_a_security_violation() {
    let zip_data = zip_with_entries(&["xl/workbook.xml", "xl/worksheets/sheet1.xml"]);

    // XLSXとしては不完全なため、パースエラーは許容
    if let Err(SourceReadError::SecurityViolation(msg)) =
        extract_from_reader(Cursor::new(zip_data))
    {
        panic!("Should not trigger security violation: {}", msg);
    }
}

/// アップロード名にパスを含めても保存先ディレクトリの外には書き込まない
#[test]
fn test_upload_name_cannot_escape_directory() {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let store = UploadDir::new(&uploads);

    let handle = store
        .upload_source("../../outside.xlsx", b"bytes")
        .unwrap();

    assert!(!handle.id().contains('/'));
    assert!(!handle.id().contains(".."));
    assert!(!dir.path().join("outside.xlsx").exists());
    assert_eq!(store.list_sources().unwrap(), vec![handle.clone()]);
    assert_eq!(store.read_source(&handle).unwrap(), b"bytes");

    // 直下のファイル名以外を指す識別子は存在しないものとして扱う
    std::fs::write(dir.path().join("secret.xlsx"), b"secret").unwrap();
    assert!(matches!(
        store.read_source(&SourceHandle::new("../secret.xlsx")),
        Err(GradeDocError::NoSource)
    ));
}

/// レコードのキーにパスを含めても、証明書は保存先ディレクトリの直下に書き込まれる
#[test]
fn test_record_key_cannot_escape_directory() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 0, "RegNo").unwrap();
    worksheet.write_string(0, 1, "Name").unwrap();
    worksheet.write_string(0, 2, "101").unwrap();
    worksheet.write_string(1, 0, "../../evil").unwrap();
    worksheet.write_string(1, 1, "Mallory").unwrap();
    worksheet.write_string(1, 2, "A").unwrap();
    let excel = workbook.save_to_buffer().unwrap();

    let logo = {
        let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    };
    let assets = MemoryAssetStore::new()
        .with_asset("logo.png", logo)
        .with_asset(
            "body.ttf",
            include_bytes!("fixtures/assets/DejaVuSerif.ttf").to_vec(),
        );

    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    let pipeline = PipelineBuilder::new()
        .with_upload_dir(&uploads)
        .with_asset_store(Arc::new(assets))
        .build()
        .unwrap();

    let source = pipeline.upload_source("grades.xlsx", &excel).unwrap();
    let produced = pipeline
        .produce_certificate(&source, "../../evil", &TemplateParams::default())
        .unwrap();

    // 区切り文字は`_`に置き換わり、`..`は`.`にまとめられる
    assert_eq!(produced.file_name, "_._evil_grades.pdf");
    assert!(!produced.file_name.contains('/'));
    assert!(!produced.file_name.contains(".."));
    assert!(uploads.join("_._evil_grades.pdf").is_file());
    assert!(!dir.path().join("evil_grades.pdf").exists());
    assert!(!dir.path().join("_evil_grades.pdf").exists());
}

/// アセット名でアセットディレクトリの外を読むことはできない
#[test]
fn test_asset_name_cannot_escape_directory() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(dir.path().join("secret.png"), b"secret").unwrap();

    let store = FsAssetStore::new(&assets);
    for name in ["../secret.png", "/etc/passwd", ""] {
        assert!(matches!(
            store.load_asset(name),
            Err(GradeDocError::AssetMissing { .. })
        ));
    }
}
