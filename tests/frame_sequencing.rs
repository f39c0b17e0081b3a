use shadowbox::{
    config::AppConfig,
    demo::{load_skybox, DemoMeshes, DemoScene},
    gfx::{
        geometry::MeshLoader,
        rendering::{
            context::{
                Capabilities, DepthFunc, DrawUniforms, FramePhase, PassTarget, Primitive,
                ResourceRequest,
            },
            FrameRenderer, RenderContext,
        },
    },
};

const QUAD: &str = "\
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
f 1/1/1 4/4/1 3/3/1 2/2/1
";

const WIDTH: u32 = 640;
const HEIGHT: u32 = 360;

fn setup(caps: Capabilities) -> (RenderContext, FrameRenderer, DemoScene) {
    let config = AppConfig::default();
    let mut ctx = RenderContext::new(caps);
    let skybox = load_skybox(&mut ctx, &config).unwrap();
    let renderer = FrameRenderer::new(&mut ctx, WIDTH, HEIGHT, 4, skybox).unwrap();

    let mesh = MeshLoader::new(caps.legacy_quads)
        .load_from_str(QUAD)
        .unwrap();
    let meshes = DemoMeshes {
        centre: mesh.clone(),
        orbiter: mesh.clone(),
        floor: mesh,
    };
    let scene = DemoScene::with_meshes(
        &mut ctx,
        &config,
        WIDTH as f32 / HEIGHT as f32,
        meshes,
    )
    .unwrap();

    (ctx, renderer, scene)
}

#[test]
fn test_passes_run_in_phase_order() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());
    scene.update(16.0).unwrap();
    let frame = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    let phases: Vec<FramePhase> = frame.passes.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![
            FramePhase::ShadowPass,
            FramePhase::MainPass,
            FramePhase::Composite
        ]
    );

    assert_eq!(
        frame.passes[0].target,
        PassTarget::Offscreen(renderer.shadow_map().target().handle)
    );
    assert_eq!(
        frame.passes[1].target,
        PassTarget::Offscreen(renderer.target().target().handle)
    );
    assert_eq!(frame.passes[2].target, PassTarget::Screen);
    assert_eq!(ctx.phase(), FramePhase::Idle);
}

#[test]
fn test_shadow_map_feeds_main_pass() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());
    let frame = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    let shadow = &frame.passes[0];
    // centre, four orbiters, floor
    assert_eq!(shadow.draws.len(), 6);
    for draw in &shadow.draws {
        assert_eq!(draw.call.program, renderer.programs().depth);
        assert_eq!(draw.call.bindings.shadow_map, None);
    }

    let main = &frame.passes[1];
    let lit: Vec<_> = main
        .draws
        .iter()
        .filter(|d| d.phase == FramePhase::MainPass)
        .collect();
    assert_eq!(lit.len(), 6);
    for draw in lit {
        assert_eq!(draw.call.program, renderer.programs().lit);
        assert_eq!(
            draw.call.bindings.shadow_map,
            Some(renderer.shadow_map().texture())
        );
        assert_eq!(
            draw.call.bindings.environment,
            Some(renderer.skybox().cube_map())
        );
        assert!(matches!(draw.call.uniforms, DrawUniforms::Mesh(_)));
    }
}

#[test]
fn test_skybox_drawn_last_with_less_equal() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());
    let frame = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    let main = &frame.passes[1];
    let sky = main.draws.last().unwrap();
    assert_eq!(sky.phase, FramePhase::SkyboxPass);
    assert_eq!(sky.call.program, renderer.programs().skybox);
    assert_eq!(sky.raster.depth_func, DepthFunc::LessEqual);
    assert!(main.resolve);

    // Depth testing is back to the default for everything after the sky
    assert_eq!(ctx.raster_state().depth_func, DepthFunc::Less);
}

#[test]
fn test_composite_samples_resolved_target() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());
    let frame = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    let composite = &frame.passes[2];
    assert_eq!(composite.draws.len(), 1);
    let draw = &composite.draws[0];
    assert_eq!(draw.call.program, renderer.programs().post);
    assert_eq!(draw.call.bindings.diffuse, Some(renderer.target().texture()));
    assert!(!composite.resolve);
}

#[test]
fn test_consecutive_frames_record_identically_shaped() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());

    let first = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();
    scene.update(33.0).unwrap();
    let second = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    assert_eq!(first.passes.len(), second.passes.len());
    assert_eq!(first.draw_count(), second.draw_count());
}

#[test]
fn test_geometry_uploaded_once() {
    let (mut ctx, renderer, mut scene) = setup(Capabilities::default());
    let count_geometry = |requests: &[ResourceRequest]| {
        requests
            .iter()
            .filter(|r| matches!(r, ResourceRequest::Geometry { .. }))
            .count()
    };

    let _ = ctx.take_pending();
    renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();
    let uploaded = count_geometry(&ctx.take_pending());
    assert!(uploaded > 0);

    renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();
    assert_eq!(count_geometry(&ctx.take_pending()), 0);
}

#[test]
fn test_legacy_quads_render_as_quads() {
    let caps = Capabilities {
        legacy_quads: true,
        ..Capabilities::default()
    };
    let (mut ctx, renderer, mut scene) = setup(caps);
    let frame = renderer
        .render(&mut ctx, &mut scene.graph, &scene.registry)
        .unwrap();

    assert_eq!(frame.passes.len(), 3);
    let lit_quads = frame.passes[1]
        .draws
        .iter()
        .filter(|d| matches!(d.call.primitive, Primitive::Quads { count: 1 }))
        .count();
    assert_eq!(lit_quads, 6);
}
