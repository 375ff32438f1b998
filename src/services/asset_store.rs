//! File storage for product and avatar images.
//!
//! Filenames are random hex with an extension derived from the sniffed image
//! format, so user-supplied names never touch the filesystem.

use rand::Rng;
use std::path::{Path, PathBuf};

use crate::domain::ServiceError;

/// Placeholder image shipped with the frontend; never stored or deleted here.
pub const DEFAULT_IMAGE: &str = "default.jpg";

#[derive(Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist image bytes and return the generated filename.
    /// Rejects anything that does not sniff as a supported image format.
    pub fn store(&self, bytes: &[u8]) -> Result<String, ServiceError> {
        let format = image::guess_format(bytes)
            .map_err(|_| ServiceError::Validation("file is not a recognized image".to_string()))?;

        let ext = match format {
            image::ImageFormat::Jpeg => "jpg",
            image::ImageFormat::Png => "png",
            other => {
                return Err(ServiceError::Validation(format!(
                    "unsupported image format: {:?}",
                    other
                )));
            }
        };

        let filename = format!("{:032x}.{}", rand::thread_rng().gen::<u128>(), ext);
        std::fs::write(self.dir.join(&filename), bytes)
            .map_err(|e| ServiceError::Storage(format!("failed to write asset: {}", e)))?;

        Ok(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        Self::safe_name(filename).is_ok() && self.dir.join(filename).is_file()
    }

    /// Delete a stored image. The default image and missing files are no-ops.
    pub fn delete(&self, filename: &str) -> Result<(), ServiceError> {
        Self::safe_name(filename)?;
        if filename == DEFAULT_IMAGE {
            return Ok(());
        }
        let path = self.dir.join(filename);
        if path.is_file() {
            std::fs::remove_file(&path)
                .map_err(|e| ServiceError::Storage(format!("failed to delete asset: {}", e)))?;
        }
        Ok(())
    }

    fn safe_name(filename: &str) -> Result<(), ServiceError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(ServiceError::Validation("invalid asset filename".to_string()));
        }
        Ok(())
    }
}
