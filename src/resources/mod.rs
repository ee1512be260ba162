//! Loading of shaders, panoramas and meshes from the asset root.
//!
//! All file I/O is async (tokio); the event loop blocks on it during setup.
//! Failures are reported as [`AssetError`] so callers can tell a missing file
//! from a broken one.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use naga::ShaderStage;
use thiserror::Error;

use crate::{
    context::InitContext,
    data_structures::{shader::Shader, texture::Texture},
};

pub mod mesh;
pub mod texture;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {path}")]
    NotFound { path: PathBuf },
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} has no pixels")]
    EmptyImage { path: PathBuf },
    #[error("invalid shader {path}: {reason}")]
    Shader { path: PathBuf, reason: String },
}

impl AssetError {
    pub fn path(&self) -> &Path {
        match self {
            AssetError::NotFound { path }
            | AssetError::Io { path, .. }
            | AssetError::Decode { path, .. }
            | AssetError::EmptyImage { path }
            | AssetError::Shader { path, .. } => path,
        }
    }

    fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound { path },
            _ => AssetError::Io { path, source },
        }
    }
}

pub async fn load_string(root: &Path, file_name: &str) -> Result<String, AssetError> {
    let path = root.join(file_name);
    log::debug!("Loading {}", path.display());
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| AssetError::from_io(path, source))
}

pub async fn load_binary(root: &Path, file_name: &str) -> Result<Vec<u8>, AssetError> {
    let path = root.join(file_name);
    log::debug!("Loading {}", path.display());
    tokio::fs::read(&path)
        .await
        .map_err(|source| AssetError::from_io(path, source))
}

/// Load and compile a vertex/fragment pair. Both files are read concurrently.
pub async fn load_shader(
    ctx: &InitContext,
    label: &str,
    vertex_file: &str,
    fragment_file: &str,
) -> Result<Shader, AssetError> {
    let (vertex_source, fragment_source) = futures::try_join!(
        load_string(&ctx.asset_root, vertex_file),
        load_string(&ctx.asset_root, fragment_file)
    )?;

    Shader::from_sources(&ctx.device, label, &vertex_source, &fragment_source, &ctx.ledger)
        .map_err(|e| {
            let file = match e.stage() {
                ShaderStage::Vertex => vertex_file,
                _ => fragment_file,
            };
            AssetError::Shader {
                path: ctx.asset_root.join(file),
                reason: e.to_string(),
            }
        })
}

/// Decode a Radiance HDR file into a float texture.
///
/// Equirectangular panoramas are expected to be twice as wide as they are
/// high; anything else is converted anyway with a warning.
pub async fn load_hdr_texture(ctx: &InitContext, file_name: &str) -> Result<Texture, AssetError> {
    let path = ctx.asset_root.join(file_name);
    let bytes = load_binary(&ctx.asset_root, file_name).await?;
    let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Hdr).map_err(
        |source| AssetError::Decode {
            path: path.clone(),
            source,
        },
    )?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(AssetError::EmptyImage { path });
    }
    if width != 2 * height {
        log::warn!(
            "{} is {}x{}, expected a 2:1 equirectangular panorama",
            path.display(),
            width,
            height
        );
    }

    Texture::from_hdr_image(&ctx.device, &ctx.queue, &img, file_name, &ctx.ledger)
        .map_err(|_| AssetError::EmptyImage { path })
}
