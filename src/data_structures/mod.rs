//! Engine data structures: models, shaders and textures.
//!
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `shader` holds vertex/fragment programs with name-resolved binding locations
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod model;
pub mod shader;
pub mod texture;
