//! flow-skybox
//!
//! Skybox loading and drawing on a small wgpu/winit engine layer. An
//! equirectangular HDR panorama is rendered into a cubemap once at setup;
//! every frame then draws that cubemap on a cube around a first-person
//! camera, together with a reference grid and an FPS counter.
//!
//! High-level modules
//! - `camera`: camera types, controller and uniforms for view/projection
//! - `config`: every hardcoded constant of the demo, with an asset root override
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: engine data models (meshes, materials, shaders, textures)
//! - `diagnostics`: live GPU resource accounting
//! - `flow`: the event loop and the flow lifecycle (init, update, render, teardown)
//! - `frame`: frame loop state, pacing and FPS measurement
//! - `pipelines`: skybox, panorama conversion, grid and HUD pipelines
//! - `resources`: helpers to load shaders/textures and build meshes
//! - `render`: render composition and 3D/overlay batching
//! - `skybox`: the skybox scene
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod diagnostics;
pub mod flow;
pub mod frame;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod skybox;

// Re-exports commonly used types for convenience in downstream code.
pub use config::Config;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
