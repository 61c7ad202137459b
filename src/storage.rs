//! Storage Module
//!
//! アップロードされたスプレッドシートと、生成した文書の保存先。
//! ファイルシステム実装（`UploadDir`）とメモリ実装（`MemoryStore`）を提供します。

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::GradeDocError;
use crate::security::sanitize_file_component;

/// 一覧に含めるスプレッドシートの拡張子
pub const SOURCE_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// アップロード済みスプレッドシートの識別子
///
/// 識別子は`{13桁のミリ秒}-{元のファイル名}`で、文字列順がアップロード順になります。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceHandle {
    id: String,
}

impl SourceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// 保存名
    pub fn id(&self) -> &str {
        &self.id
    }

    /// タイムスタンプを除いた元のファイル名
    pub fn original_name(&self) -> &str {
        match self.id.split_once('-') {
            Some((stamp, rest)) if stamp.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => &self.id,
        }
    }
}

impl std::fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// スプレッドシートの保存先
pub trait SourceStore: Send + Sync {
    /// スプレッドシートを保存し、識別子を返す
    fn upload_source(&self, original_name: &str, bytes: &[u8])
        -> Result<SourceHandle, GradeDocError>;

    /// 保存済みのスプレッドシートをアップロード順に列挙する
    fn list_sources(&self) -> Result<Vec<SourceHandle>, GradeDocError>;

    /// スプレッドシートを読み込む
    fn read_source(&self, handle: &SourceHandle) -> Result<Vec<u8>, GradeDocError>;
}

/// 生成した文書の保存先
pub trait DocumentStore: Send + Sync {
    /// 文書を書き込む。戻った時点で内容は永続化されている
    fn write_document(&self, name: &str, bytes: &[u8]) -> Result<(), GradeDocError>;

    /// 文書を読み込む（存在しない場合は`GradeDocError::DocumentNotFound`）
    fn read_document(&self, name: &str) -> Result<Vec<u8>, GradeDocError>;
}

fn has_source_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 単調増加するミリ秒タイムスタンプ
///
/// 同じミリ秒内に複数回アップロードされても、プレフィックスは必ず増加します。
#[derive(Debug, Default)]
struct StampClock {
    last: Mutex<i64>,
}

impl StampClock {
    fn next(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = lock(&self.last);
        *last = now.max(*last + 1);
        *last
    }
}

fn source_id(stamp: i64, original_name: &str) -> String {
    format!("{:013}-{}", stamp, sanitize_file_component(original_name))
}

/// ディレクトリ1つにアップロードと生成文書を保存する
#[derive(Debug)]
pub struct UploadDir {
    root: PathBuf,
    clock: StampClock,
}

impl UploadDir {
    /// ディレクトリを指定して作成する（ディレクトリは最初の書き込み時に作られる）
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: StampClock::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 文書のパス（名前は無害化される）
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_file_component(name))
    }

    /// バッファ付きで書き込み、flushとsync_allまで行う
    fn write_durably(&self, path: &Path, bytes: &[u8]) -> Result<(), GradeDocError> {
        fs::create_dir_all(&self.root)?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl SourceStore for UploadDir {
    fn upload_source(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<SourceHandle, GradeDocError> {
        let handle = SourceHandle::new(source_id(self.clock.next(), original_name));
        self.write_durably(&self.root.join(handle.id()), bytes)?;
        tracing::info!(source = %handle, bytes = bytes.len(), "source stored");
        Ok(handle)
    }

    fn list_sources(&self) -> Result<Vec<SourceHandle>, GradeDocError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut handles = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if has_source_extension(&name) {
                handles.push(SourceHandle::new(name));
            }
        }
        handles.sort();
        Ok(handles)
    }

    fn read_source(&self, handle: &SourceHandle) -> Result<Vec<u8>, GradeDocError> {
        // 識別子はディレクトリ直下のファイル名でなければならない
        let mut components = Path::new(handle.id()).components();
        let is_plain_name = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !is_plain_name {
            return Err(GradeDocError::NoSource);
        }

        fs::read(self.root.join(handle.id())).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GradeDocError::NoSource
            } else {
                e.into()
            }
        })
    }
}

impl DocumentStore for UploadDir {
    fn write_document(&self, name: &str, bytes: &[u8]) -> Result<(), GradeDocError> {
        let path = self.document_path(name);
        self.write_durably(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "document persisted");
        Ok(())
    }

    fn read_document(&self, name: &str) -> Result<Vec<u8>, GradeDocError> {
        fs::read(self.document_path(name)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GradeDocError::DocumentNotFound(name.to_string())
            } else {
                e.into()
            }
        })
    }
}

/// メモリ上の保存先（テスト・組み込み用）
#[derive(Debug, Default)]
pub struct MemoryStore {
    clock: StampClock,
    sources: Mutex<Vec<(SourceHandle, Vec<u8>)>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceStore for MemoryStore {
    fn upload_source(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<SourceHandle, GradeDocError> {
        let handle = SourceHandle::new(source_id(self.clock.next(), original_name));
        lock(&self.sources).push((handle.clone(), bytes.to_vec()));
        Ok(handle)
    }

    fn list_sources(&self) -> Result<Vec<SourceHandle>, GradeDocError> {
        let mut handles: Vec<SourceHandle> = lock(&self.sources)
            .iter()
            .map(|(handle, _)| handle.clone())
            .filter(|handle| has_source_extension(handle.id()))
            .collect();
        handles.sort();
        Ok(handles)
    }

    fn read_source(&self, handle: &SourceHandle) -> Result<Vec<u8>, GradeDocError> {
        lock(&self.sources)
            .iter()
            .find(|(h, _)| h == handle)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(GradeDocError::NoSource)
    }
}

impl DocumentStore for MemoryStore {
    fn write_document(&self, name: &str, bytes: &[u8]) -> Result<(), GradeDocError> {
        lock(&self.documents).insert(sanitize_file_component(name), bytes.to_vec());
        Ok(())
    }

    fn read_document(&self, name: &str) -> Result<Vec<u8>, GradeDocError> {
        lock(&self.documents)
            .get(&sanitize_file_component(name))
            .cloned()
            .ok_or_else(|| GradeDocError::DocumentNotFound(name.to_string()))
    }
}
