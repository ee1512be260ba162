use flow_skybox::{
    config::{ASSET_ROOT_ENV, Config},
    frame::{CloseSignal, FpsCounter, FrameLoop, FramePacer, LoopState},
    pipelines::hud::{FPS_GOOD, FPS_POOR, fps_colour, fps_text},
    render::{FpsDraw, GridDraw, Render, SceneDraw},
};
use instant::{Duration, Instant};

/// Drive a loop the way the event loop does: draw until closed, then tear
/// down. Returns the number of frames drawn and teardown invocations.
fn drive(close_at: u64, extra_signals: &[CloseSignal]) -> (u64, u32, FrameLoop) {
    let mut frame_loop = FrameLoop::new();
    let mut drawn = 0;
    let mut releases = 0;

    // a real event loop keeps spinning for a few more wake-ups after close
    for _ in 0..close_at + 5 {
        if frame_loop.begin_iteration() {
            drawn += 1;
            if drawn == close_at {
                frame_loop.signal_close(CloseSignal::EscapeKey);
                for signal in extra_signals {
                    frame_loop.signal_close(*signal);
                }
            }
        } else {
            frame_loop.teardown(|| releases += 1);
        }
    }
    (drawn, releases, frame_loop)
}

#[test]
fn closes_within_one_iteration() {
    let (drawn, _, frame_loop) = drive(3, &[]);
    assert_eq!(drawn, 3);
    assert_eq!(frame_loop.state(), LoopState::Closed);
    assert_eq!(frame_loop.frames(), 3);
}

#[test]
fn teardown_runs_exactly_once() {
    let (_, releases, frame_loop) = drive(2, &[CloseSignal::WindowClose, CloseSignal::Injected]);
    assert_eq!(releases, 1);
    assert!(frame_loop.is_torn_down());
    // the first signal wins
    assert_eq!(frame_loop.close_signal(), Some(CloseSignal::EscapeKey));
}

#[test]
fn pacing_targets_sixty_frames_per_second() {
    let config = Config::default();
    let start = Instant::now();
    let mut pacer = FramePacer::new(config.target_fps, start);
    let mut fps = FpsCounter::new();

    let mut now = start;
    for _ in 0..120 {
        assert!(pacer.is_due(now));
        let next = pacer.advance(now);
        fps.tick(next - now);
        now = next;
    }
    assert_eq!(fps.fps(), 60);
    assert_eq!(fps_text(fps.fps()), "60 FPS");
    assert_eq!(fps_colour(fps.fps()), FPS_GOOD);
}

#[test]
fn slow_frames_turn_the_counter_red() {
    let mut fps = FpsCounter::new();
    for _ in 0..60 {
        fps.tick(Duration::from_millis(100));
    }
    assert_eq!(fps.fps(), 10);
    assert_eq!(fps_colour(fps.fps()), FPS_POOR);
}

#[test]
fn overlay_never_lands_in_the_scene_batch() {
    // composed out of order on purpose
    let render = Render::Composed(vec![
        Render::Fps(FpsDraw { x: 10, y: 10 }),
        Render::None,
        Render::Grid(GridDraw {
            slices: 10,
            spacing: 1.0,
        }),
    ]);
    let batches = render.batches();
    assert_eq!(batches.scene.len(), 1);
    assert!(matches!(
        batches.scene[0],
        SceneDraw::Grid(GridDraw { slices: 10, .. })
    ));
    assert_eq!(batches.overlay, vec![FpsDraw { x: 10, y: 10 }]);
}

#[test]
fn asset_root_follows_the_environment() {
    let config = Config::default().with_env_overrides(|key| {
        assert_eq!(key, ASSET_ROOT_ENV);
        Some("/opt/skybox-assets".into())
    });
    assert_eq!(config.asset_root, std::path::PathBuf::from("/opt/skybox-assets"));
    assert_eq!(config.assets.skybox_vs, "shaders/skybox.vert.wgsl");
}
