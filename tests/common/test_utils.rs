#![allow(dead_code)]

use std::path::{Path, PathBuf};

use flow_skybox::Config;

/// Radiance of the generated test panorama.
pub const SKY: [f32; 3] = [0.2, 0.4, 1.0];

/// A fresh asset root under cargo's test scratch directory, holding the
/// crate's shaders and a generated `width`×`height` panorama.
pub fn asset_dir(name: &str, width: u32, height: u32) -> PathBuf {
    let root = Path::new(env!("CARGO_TARGET_TMPDIR")).join(name);
    if root.exists() {
        std::fs::remove_dir_all(&root).expect("Could not clear old test assets");
    }
    let shaders = root.join("shaders");
    std::fs::create_dir_all(&shaders).expect("Could not create test asset dir");

    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets").join("shaders");
    for entry in std::fs::read_dir(&source).expect("Shader sources missing") {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), shaders.join(entry.file_name())).unwrap();
    }

    write_panorama(&root.join("dresden_square.hdr"), width, height, SKY);
    root
}

pub fn write_panorama(path: &Path, width: u32, height: u32, colour: [f32; 3]) {
    let pixels = image::Rgb32FImage::from_pixel(width, height, image::Rgb(colour));
    image::DynamicImage::ImageRgb32F(pixels)
        .save_with_format(path, image::ImageFormat::Hdr)
        .expect("Could not write test panorama");
}

/// Replace one shader file in an asset root.
pub fn overwrite_shader(root: &Path, file: &str, source: &str) {
    std::fs::write(root.join(file), source).expect("Could not overwrite shader");
}

pub fn test_config(root: &Path) -> Config {
    Config::default().with_asset_root(root)
}

/// Fraction of pixels in `img` that differ from `colour` in any channel by
/// more than `tolerance`.
pub fn share_differing(img: &image::RgbaImage, colour: [u8; 3], tolerance: u8) -> f32 {
    let differing = img
        .pixels()
        .filter(|p| {
            p.0[..3]
                .iter()
                .zip(colour)
                .any(|(a, b)| a.abs_diff(b) > tolerance)
        })
        .count();
    differing as f32 / (img.width() * img.height()) as f32
}
