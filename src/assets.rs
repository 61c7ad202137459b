//! Asset Store Module
//!
//! 証明書の描画に使うロゴ画像と本文フォントの読み込み。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::api::Letterhead;
use crate::error::GradeDocError;
use crate::render::{BodyFont, CertificateAssets, RasterImage};

/// 名前付きアセットの読み込み元
///
/// 見つからないアセットは`GradeDocError::AssetMissing`として返します。
pub trait AssetStore: Send + Sync {
    /// アセットをバイト列として読み込む
    fn load_asset(&self, name: &str) -> Result<Vec<u8>, GradeDocError>;
}

/// ディレクトリ配下のファイルをアセットとして読み込む
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for FsAssetStore {
    fn load_asset(&self, name: &str) -> Result<Vec<u8>, GradeDocError> {
        // ルートの外を指す名前は存在しないものとして扱う
        let relative = Path::new(name);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(GradeDocError::AssetMissing {
                name: name.to_string(),
            });
        }

        let path = self.root.join(relative);
        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(asset = name, bytes = bytes.len(), "asset loaded");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GradeDocError::AssetMissing {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// メモリ上のアセット（テスト・組み込み用）
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// アセットを追加する
    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(name.into(), bytes.into());
        self
    }
}

impl AssetStore for MemoryAssetStore {
    fn load_asset(&self, name: &str) -> Result<Vec<u8>, GradeDocError> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| GradeDocError::AssetMissing {
                name: name.to_string(),
            })
    }
}

/// レターヘッドが参照するロゴとフォントを読み込み、デコードする
///
/// # 引数
///
/// * `store` - アセットの読み込み元
/// * `letterhead` - `logo_asset`と`body_font_asset`を参照する
///
/// # 戻り値
///
/// * `Ok(CertificateAssets)` - 両方の読み込みとデコードに成功した場合
/// * `Err(GradeDocError::AssetMissing)` - どちらかが存在しない場合
/// * `Err(GradeDocError::Render)` - 画像またはフォントとしてデコードできない場合
pub fn load_certificate_assets(
    store: &dyn AssetStore,
    letterhead: &Letterhead,
) -> Result<CertificateAssets, GradeDocError> {
    let logo_bytes = store.load_asset(&letterhead.logo_asset)?;
    let font_bytes = store.load_asset(&letterhead.body_font_asset)?;

    Ok(CertificateAssets {
        logo: decode_logo(&letterhead.logo_asset, &logo_bytes)?,
        body_font: BodyFont::parse(&letterhead.body_font_asset, font_bytes)?,
    })
}

/// 画像をRGBとアルファに分解する（完全に不透明ならアルファは持たない）
fn decode_logo(name: &str, bytes: &[u8]) -> Result<RasterImage, GradeDocError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| GradeDocError::Render(format!("Cannot decode image '{}': {}", name, e)))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();

    let pixels = decoded.as_raw();
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(pixels.len() / 4);
    for px in pixels.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
        alpha.push(px[3]);
    }
    let alpha = if alpha.iter().all(|&a| a == u8::MAX) {
        None
    } else {
        Some(alpha)
    };

    Ok(RasterImage {
        width,
        height,
        rgb,
        alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(alpha: u8) -> Vec<u8> {
        let image = RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, alpha]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_opaque_logo() {
        let logo = decode_logo("logo.png", &png(255)).unwrap();
        assert_eq!(logo.dimensions(), (4, 2));
        assert_eq!(logo.rgb.len(), 4 * 2 * 3);
        assert_eq!(&logo.rgb[..3], &[10, 20, 30]);
        assert!(logo.alpha.is_none());
    }

    #[test]
    fn test_decode_translucent_logo_keeps_alpha() {
        let logo = decode_logo("logo.png", &png(128)).unwrap();
        assert_eq!(logo.alpha.as_deref().map(<[u8]>::len), Some(8));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_logo("logo.png", b"not an image");
        assert!(matches!(result, Err(GradeDocError::Render(_))));
    }

    #[test]
    fn test_memory_store_missing_asset() {
        let store = MemoryAssetStore::new().with_asset("logo.png", png(255));
        assert!(store.load_asset("logo.png").is_ok());
        let err = store.load_asset("body.ttf").unwrap_err();
        assert!(matches!(err, GradeDocError::AssetMissing { name } if name == "body.ttf"));
    }

    #[test]
    fn test_fs_store_missing_and_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), png(255)).unwrap();
        let store = FsAssetStore::new(dir.path());

        assert!(store.load_asset("logo.png").is_ok());
        assert!(matches!(
            store.load_asset("absent.png"),
            Err(GradeDocError::AssetMissing { .. })
        ));
        assert!(matches!(
            store.load_asset("../logo.png"),
            Err(GradeDocError::AssetMissing { .. })
        ));
    }

    #[test]
    fn test_load_certificate_assets_requires_both() {
        let letterhead = Letterhead::default();
        let store = MemoryAssetStore::new().with_asset(letterhead.logo_asset.clone(), png(255));
        let err = load_certificate_assets(&store, &letterhead).unwrap_err();
        assert!(matches!(err, GradeDocError::AssetMissing { name } if name == "body.ttf"));
    }
}
