//! Application constants.
//!
//! Everything the demo hardcodes lives in [`Config`]. The only runtime
//! override is the asset root, taken from `SKYBOX_ASSETS` by
//! [`Config::from_env`].

use std::path::PathBuf;

use cgmath::{Deg, Point3, Vector3};

use crate::camera::{CameraMode, ProjectionMode};

/// Environment variable overriding [`Config::asset_root`].
pub const ASSET_ROOT_ENV: &str = "SKYBOX_ASSETS";

/// File names of everything the skybox scene loads, relative to the asset root.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneAssets {
    pub skybox_vs: String,
    pub skybox_fs: String,
    pub cubemap_vs: String,
    pub cubemap_fs: String,
    pub panorama: String,
}

impl Default for SceneAssets {
    fn default() -> Self {
        Self {
            skybox_vs: "shaders/skybox.vert.wgsl".into(),
            skybox_fs: "shaders/skybox.frag.wgsl".into(),
            cubemap_vs: "shaders/cubemap.vert.wgsl".into(),
            cubemap_fs: "shaders/cubemap.frag.wgsl".into(),
            panorama: "dresden_square.hdr".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub projection: ProjectionMode,
    pub mode: CameraMode,
    /// Movement in units per second.
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Point3::new(1.0, 1.0, 1.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::unit_y(),
            fovy: Deg(45.0),
            znear: 0.01,
            zfar: 1000.0,
            projection: ProjectionMode::Perspective,
            mode: CameraMode::FirstPerson,
            speed: 5.0,
            sensitivity: 0.4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Zero means unpaced.
    pub target_fps: u32,
    /// Edge length of each generated cubemap face.
    pub cubemap_size: u32,
    pub clear_colour: wgpu::Color,
    pub grid_slices: u32,
    pub grid_spacing: f32,
    /// Top-left corner of the FPS counter in window pixels.
    pub fps_position: (u32, u32),
    pub camera: CameraConfig,
    pub asset_root: PathBuf,
    pub assets: SceneAssets,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "flow-skybox: skybox loading and drawing".into(),
            width: 800,
            height: 450,
            target_fps: 60,
            cubemap_size: 512,
            // ray-white
            clear_colour: wgpu::Color {
                r: 245.0 / 255.0,
                g: 245.0 / 255.0,
                b: 245.0 / 255.0,
                a: 1.0,
            },
            grid_slices: 10,
            grid_spacing: 1.0,
            fps_position: (10, 10),
            camera: CameraConfig::default(),
            asset_root: PathBuf::from("assets"),
            assets: SceneAssets::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Split out so tests don't have to
    /// touch the process environment.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(ASSET_ROOT_ENV).filter(|root| !root.trim().is_empty()) {
            log::info!("Using asset root {} from {}", root, ASSET_ROOT_ENV);
            self.asset_root = PathBuf::from(root);
        }
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo() {
        let config = Config::default();
        assert_eq!((config.width, config.height), (800, 450));
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.cubemap_size, 512);
        assert_eq!(config.grid_slices, 10);
        assert_eq!(config.fps_position, (10, 10));
        assert_eq!(config.camera.position, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(config.camera.fovy, Deg(45.0));
        assert_eq!(config.camera.mode, CameraMode::FirstPerson);
        assert_eq!(config.assets.panorama, "dresden_square.hdr");
    }

    #[test]
    fn env_override_replaces_asset_root() {
        let config = Config::default().with_env_overrides(|key| {
            (key == ASSET_ROOT_ENV).then(|| "/srv/skybox".to_string())
        });
        assert_eq!(config.asset_root, PathBuf::from("/srv/skybox"));
    }

    #[test]
    fn blank_override_is_ignored() {
        let config = Config::default().with_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.asset_root, PathBuf::from("assets"));
    }
}
