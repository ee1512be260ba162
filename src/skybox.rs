//! The skybox scene: a cube-mapped cube around the camera, a reference grid
//! and an FPS counter.

use anyhow::Context as _;

use crate::{
    config::Config,
    context::{Context, InitContext},
    data_structures::model::{Material, Model},
    flow::{FlowConstructor, GraphicsFlow, Out},
    pipelines::cubemap::{
        EQUIRECTANGULAR_MAP, EQUIRECTANGULAR_SAMPLER, FACE_UNIFORM, gen_texture_cubemap,
    },
    render::{FpsDraw, GridDraw, ModelDraw, Render},
    resources::{
        AssetError, load_hdr_texture, load_shader,
        mesh::{gen_mesh_cube, upload_mesh},
    },
};

fn shader_error(ctx: &InitContext, file: &str, error: anyhow::Error) -> AssetError {
    AssetError::Shader {
        path: ctx.asset_root.join(file),
        reason: format!("{:#}", error),
    }
}

#[derive(Debug)]
pub struct SkyboxFlow {
    skybox: Option<Model>,
    grid: GridDraw,
    fps: FpsDraw,
}

impl SkyboxFlow {
    /// Build the skybox model and fill its cubemap from the panorama.
    ///
    /// The panorama texture and the conversion shader only live for the
    /// duration of this call.
    pub async fn new(ctx: InitContext, settings: &Config) -> anyhow::Result<Self> {
        let assets = &settings.assets;

        let cube = gen_mesh_cube(1.0, 1.0, 1.0);
        let mesh = upload_mesh(&ctx.device, "skybox cube", &cube, &ctx.ledger)?;
        let shader = load_shader(&ctx, "skybox", &assets.skybox_vs, &assets.skybox_fs).await?;
        let mut material = Material::new(&ctx, "skybox", shader)
            .map_err(|e| shader_error(&ctx, &assets.skybox_fs, e))?;

        let cubemap = {
            let panorama = load_hdr_texture(&ctx, &assets.panorama).await?;
            let converter = load_shader(&ctx, "equirect to cubemap", &assets.cubemap_vs, &assets.cubemap_fs).await?;
            for name in [FACE_UNIFORM, EQUIRECTANGULAR_MAP, EQUIRECTANGULAR_SAMPLER] {
                converter
                    .require_location(name)
                    .map_err(|e| shader_error(&ctx, &assets.cubemap_fs, e))?;
            }
            gen_texture_cubemap(&ctx, &converter, &panorama, settings.cubemap_size)
                .context("Could not convert the panorama to a cubemap")?
        };
        material.set_cubemap(&ctx.device, cubemap)?;

        let skybox = Model::new(&ctx, "skybox", vec![mesh], material);
        log::info!("Skybox ready ({}x{} faces)", settings.cubemap_size, settings.cubemap_size);

        Ok(Self {
            skybox: Some(skybox),
            grid: GridDraw {
                slices: settings.grid_slices,
                spacing: settings.grid_spacing,
            },
            fps: FpsDraw {
                x: settings.fps_position.0,
                y: settings.fps_position.1,
            },
        })
    }

    pub fn model(&self) -> Option<&Model> {
        self.skybox.as_ref()
    }

    /// A [`FlowConstructor`] for [`crate::flow::run`] and
    /// [`crate::flow::run_headless`].
    pub fn constructor(settings: Config) -> FlowConstructor {
        Box::new(move |ctx| {
            Box::pin(async move {
                let flow: Box<dyn GraphicsFlow> = Box::new(SkyboxFlow::new(ctx, &settings).await?);
                anyhow::Ok(flow)
            })
        })
    }
}

impl GraphicsFlow for SkyboxFlow {
    fn on_init(&mut self, _ctx: &mut Context) -> Out {
        Out::Empty
    }

    fn on_render(&self) -> Render<'_> {
        let mut renders = Vec::with_capacity(3);
        if let Some(skybox) = &self.skybox {
            renders.push(Render::Model(ModelDraw::new(skybox)));
        }
        renders.push(Render::Grid(self.grid));
        renders.push(Render::Fps(self.fps));
        Render::Composed(renders)
    }

    fn on_teardown(mut self: Box<Self>, _ctx: &Context) {
        if let Some(skybox) = self.skybox.take() {
            log::info!("Releasing model '{}'", skybox.name);
        }
    }
}
