//! Render composition and batching.
//!
//! Flows describe what to draw each frame with a [`Render`] tree. The engine
//! flattens it into [`Batches`]: 3D draws that need the camera, and
//! screen-space overlay draws. The 3D batch always executes first, so an
//! overlay can never end up inside the camera block regardless of the order
//! in which a flow composes its renders.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the enum describing render operations
//! - [`ModelDraw<'a>`] places a model in the world
//! - [`GridDraw`] and [`FpsDraw`] are the built-in helpers

use cgmath::Vector3;

use crate::data_structures::model::Model;

/// A model drawn at `position` with uniform `scale`, multiplied by `tint`.
#[derive(Clone, Copy, Debug)]
pub struct ModelDraw<'a> {
    pub model: &'a Model,
    pub position: Vector3<f32>,
    pub scale: f32,
    pub tint: [f32; 4],
}

impl<'a> ModelDraw<'a> {
    /// At the origin, unscaled, untinted.
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
            tint: [1.0; 4],
        }
    }
}

/// Reference grid on the XZ plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridDraw {
    pub slices: u32,
    pub spacing: f32,
}

/// Frame-rate counter with its top-left corner at (`x`, `y`) window pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsDraw {
    pub x: u32,
    pub y: u32,
}

/// Specifies what a flow wants drawn this frame.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Model(ModelDraw)` renders a model in the 3D block
/// - `Grid(GridDraw)` renders a grid in the 3D block
/// - `Fps(FpsDraw)` renders the FPS counter as an overlay
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
pub enum Render<'a> {
    None,
    Model(ModelDraw<'a>),
    Grid(GridDraw),
    Fps(FpsDraw),
    Composed(Vec<Render<'a>>),
}

/// A draw that needs the camera.
#[derive(Clone, Copy, Debug)]
pub enum SceneDraw<'a> {
    Model(ModelDraw<'a>),
    Grid(GridDraw),
}

#[derive(Debug, Default)]
pub struct Batches<'a> {
    /// In submission order.
    pub scene: Vec<SceneDraw<'a>>,
    pub overlay: Vec<FpsDraw>,
}

impl<'a> Batches<'a> {
    pub fn is_empty(&self) -> bool {
        self.scene.is_empty() && self.overlay.is_empty()
    }
}

impl<'a> Render<'a> {
    pub fn batches(self) -> Batches<'a> {
        let mut batches = Batches::default();
        self.set_pipelines(&mut batches);
        batches
    }

    pub(crate) fn set_pipelines(self, batches: &mut Batches<'a>) {
        match self {
            Render::Model(draw) => batches.scene.push(SceneDraw::Model(draw)),
            Render::Grid(grid) => batches.scene.push(SceneDraw::Grid(grid)),
            Render::Fps(fps) => batches.overlay.push(fps),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(batches)),
            Render::None => (),
        }
    }
}
