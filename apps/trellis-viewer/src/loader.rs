//! Texture decoding through the `image` crate.

use std::path::{Path, PathBuf};

use trellis_render::{TextureData, TextureLoader};

/// Decodes texture paths relative to an asset directory into RGBA8.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    root: PathBuf,
}

impl ImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loader rooted at `TRELLIS_ASSETS`, or `assets` when unset.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("TRELLIS_ASSETS").map_or_else(|| PathBuf::from("assets"), PathBuf::from))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TextureLoader for ImageLoader {
    type Error = image::ImageError;

    fn load(&mut self, path: &str) -> Result<TextureData, Self::Error> {
        let image = image::open(self.root.join(path))?.into_rgba8();
        let (width, height) = image.dimensions();
        Ok(TextureData {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_to_rgba8() {
        let root = std::env::temp_dir().join(format!("trellis-loader-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let mut source = image::RgbImage::new(2, 1);
        source.put_pixel(1, 0, image::Rgb([10, 20, 30]));
        source.save(root.join("pixel.png")).unwrap();

        let data = ImageLoader::new(&root).load("pixel.png").unwrap();
        assert_eq!((data.width, data.height), (2, 1));
        assert_eq!(data.pixels, vec![0, 0, 0, 255, 10, 20, 30, 255]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut loader = ImageLoader::new(std::env::temp_dir());
        assert!(loader.load("trellis-does-not-exist.png").is_err());
    }
}
