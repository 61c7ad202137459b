//! Parser Module
//!
//! calamineを使用したスプレッドシート解析と、XLSXパッケージのXMLメタデータ解析。

mod metadata;
mod workbook;

pub(crate) use metadata::XlsxMetadata;
pub(crate) use workbook::WorkbookParser;
