//! Render pipelines.
//!
//! - `basic` holds the shared pipeline builder
//! - `skybox` draws a cube-mapped cube around the camera
//! - `cubemap` converts an equirectangular panorama into a cubemap
//! - `grid` draws the reference grid
//! - `hud` draws the screen-space FPS counter

pub mod basic;
pub mod cubemap;
pub mod grid;
pub mod hud;
pub mod skybox;
