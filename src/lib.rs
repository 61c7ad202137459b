//! gradesheet - Spreadsheet grade records to PDF reports and bonafide certificates
//!
//! This crate reads the first worksheet of an uploaded spreadsheet as a table of
//! student grade records (key column, name column, one column per subject) and
//! produces two kinds of PDF documents:
//!
//! - a landscape **bulk report** listing every record in a paginated table
//! - a portrait **certificate** for a single record, with a letterhead,
//!   a templated narrative and the record's grades
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gradesheet::{PipelineBuilder, TemplateParams};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Uploads and generated documents share one directory
//!     let pipeline = PipelineBuilder::new()
//!         .with_upload_dir("uploads")
//!         .with_assets_dir("assets")
//!         .build()?;
//!
//!     let source = pipeline.upload_source("grades.xlsx", &std::fs::read("grades.xlsx")?)?;
//!
//!     // Bulk report, persisted as uploads/converted.pdf
//!     pipeline.produce_bulk_document(&source)?;
//!
//!     // Certificate for one record, persisted as uploads/{key}_grades.pdf
//!     let params = TemplateParams {
//!         semester: "IV".to_string(),
//!         academic_year: "2024 - 2025".to_string(),
//!         ..Default::default()
//!     };
//!     let certificate = pipeline.produce_certificate(&source, "921722104001", &params)?;
//!     println!("{} ({} bytes)", certificate.file_name, certificate.bytes.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Extraction Only
//!
//! ```rust,no_run
//! use std::fs::File;
//! use gradesheet::{extract_from_reader, find_by_key};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let batch = extract_from_reader(File::open("grades.xlsx")?)?;
//!     if let Some(record) = find_by_key(&batch, " 921722104001 ") {
//!         for (subject, grade) in record.fields.iter() {
//!             println!("{}: {}", subject, grade);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod api;
mod assets;
mod builder;
mod error;
mod extract;
mod locate;
mod normalize;
mod parser;
mod pipeline;
pub mod render;
mod security;
mod storage;
mod types;

// 公開API
pub use api::{Letterhead, RenderConfig, ReportHeading, TemplateParams};
pub use assets::{load_certificate_assets, AssetStore, FsAssetStore, MemoryAssetStore};
pub use builder::{Clock, PipelineBuilder};
pub use error::{GradeDocError, SourceReadError};
pub use extract::{extract, extract_from_reader};
pub use locate::find_by_key;
pub use normalize::normalize;
pub use pipeline::{
    certificate_file_name, RenderedDocument, ReportPipeline, BULK_DOCUMENT_NAME, PDF_CONTENT_TYPE,
};
pub use storage::{
    DocumentStore, MemoryStore, SourceHandle, SourceStore, UploadDir, SOURCE_EXTENSIONS,
};
pub use types::{FieldMap, RawCell, Record, RecordBatch, RichTextRun, ScalarValue, SheetCells};
