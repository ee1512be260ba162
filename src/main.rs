use flow_skybox::{Config, flow, skybox::SkyboxFlow};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    flow::run(config.clone(), SkyboxFlow::constructor(config))
}
