#![cfg(feature = "integration-tests")]

mod common;

use common::test_utils::{asset_dir, overwrite_shader, share_differing, test_config};
use flow_skybox::{
    context::{Context, InitContext},
    diagnostics::ResourceCounts,
    flow::run_headless,
    frame::CloseSignal,
    resources::AssetError,
    skybox::SkyboxFlow,
};

const ONE_OF_EACH: ResourceCounts = ResourceCounts {
    shaders: 1,
    textures: 1,
    meshes: 1,
    models: 1,
};

#[tokio::test]
async fn setup_attaches_one_cubemap() {
    let root = asset_dir("setup_attaches_one_cubemap", 256, 128);
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let flow = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap();
    let model = flow.model().expect("Skybox model missing after setup");
    assert_eq!(model.material.texture_count(), 1);

    let cubemap = model.material.cubemap().unwrap();
    assert!(cubemap.is_cubemap());
    let size = cubemap.size();
    assert_eq!(
        (size.width, size.height, size.depth_or_array_layers),
        (512, 512, 6)
    );
    assert_eq!(model.material.shader().label(), "skybox");

    // panorama and conversion shader are gone, the rest stays
    assert_eq!(ctx.ledger.snapshot(), ONE_OF_EACH);
    drop(flow);
    assert_eq!(ctx.ledger.snapshot(), ResourceCounts::default());
}

#[tokio::test]
async fn missing_panorama_fails_setup() {
    let root = asset_dir("missing_panorama_fails_setup", 64, 32);
    std::fs::remove_file(root.join("dresden_square.hdr")).unwrap();
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let err = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap_err();
    match err.downcast_ref::<AssetError>() {
        Some(AssetError::NotFound { path }) => assert!(path.ends_with("dresden_square.hdr")),
        other => panic!("Expected a missing asset, got {:?}", other),
    }
    // everything created before the failure was released
    assert_eq!(ctx.ledger.snapshot().total(), 0);
}

#[tokio::test]
async fn undecodable_panorama_fails_setup() {
    let root = asset_dir("undecodable_panorama_fails_setup", 64, 32);
    std::fs::write(root.join("dresden_square.hdr"), b"not a radiance file").unwrap();
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let err = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssetError>(),
        Some(AssetError::Decode { .. })
    ));
}

#[tokio::test]
async fn shader_without_environment_map_fails_setup() {
    let root = asset_dir("shader_without_environment_map", 64, 32);
    overwrite_shader(
        &root,
        "shaders/skybox.frag.wgsl",
        "@fragment\nfn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }\n",
    );
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let err = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap_err();
    match err.downcast_ref::<AssetError>() {
        Some(AssetError::Shader { path, reason }) => {
            assert!(path.ends_with("skybox.frag.wgsl"));
            assert!(reason.contains("environment_map"), "{}", reason);
        }
        other => panic!("Expected a shader error, got {:?}", other),
    }
}

#[tokio::test]
async fn shader_without_entry_point_fails_setup() {
    let root = asset_dir("shader_without_entry_point", 64, 32);
    overwrite_shader(&root, "shaders/cubemap.vert.wgsl", "// nothing here\n");
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let err = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap_err();
    match err.downcast_ref::<AssetError>() {
        Some(AssetError::Shader { path, reason }) => {
            assert!(path.ends_with("shaders/cubemap.vert.wgsl"), "{}", path.display());
            assert!(reason.contains("vs_main"), "{}", reason);
        }
        other => panic!("Expected a shader error, got {:?}", other),
    }
    assert_eq!(ctx.ledger.snapshot().total(), 0);
}

#[tokio::test]
async fn non_equirectangular_panorama_still_converts() {
    let root = asset_dir("non_equirectangular_panorama", 64, 64);
    let config = test_config(&root);
    let ctx = Context::headless(config.clone()).await.unwrap();

    let flow = SkyboxFlow::new(InitContext::from(&ctx), &config)
        .await
        .unwrap();
    assert_eq!(flow.model().unwrap().material.texture_count(), 1);
}

#[tokio::test]
async fn headless_run_draws_sky_grid_and_counter() {
    let root = asset_dir("headless_run_draws_sky", 256, 128);
    let config = test_config(&root);

    let report = run_headless(config.clone(), SkyboxFlow::constructor(config), 3)
        .await
        .unwrap();
    assert_eq!(report.frames, 3);
    assert_eq!(report.close_signal, Some(CloseSignal::Injected));
    assert!(report.torn_down);
    assert_eq!(report.after_setup, ONE_OF_EACH);
    assert_eq!(report.after_teardown, ResourceCounts::default());

    let frame = report.last_frame.expect("No frame captured");
    assert_eq!(frame.dimensions(), (800, 450));
    // the skybox covers the ray-white clear colour everywhere
    assert!(share_differing(&frame, [245, 245, 245], 8) > 0.99);

    // the sky is blue-dominant apart from grid lines and the counter
    let blue = frame
        .pixels()
        .filter(|p| p.0[2] > p.0[0] && p.0[2] > p.0[1])
        .count();
    assert!(blue as f32 / (800.0 * 450.0) > 0.9);

    // the counter is green at a steady 60 FPS
    let counter = (10..30)
        .flat_map(|y| (10..90).map(move |x| (x, y)))
        .map(|(x, y)| frame.get_pixel(x, y).0)
        .any(|p| p[1] > p[0].saturating_add(60) && p[1] > p[2].saturating_add(60));
    assert!(counter, "No green FPS counter pixels found");
}
