// ABOUTME: End-to-end renderer tests on a real device. Each test returns early
// ABOUTME: when no adapter is available so CI without a GPU still passes.

use std::sync::Arc;

use fx_core::ascii::charsets;
use fx_core::matcher::{match_grid, ImageView};
use fx_core::{Command, EffectKind, EffectOptions, EffectSettings, MatchQuality, OptionTarget, PostProcessOptions};
use fx_renderer::{
    AtlasProvider, BlockAtlasProvider, CapturedFrame, FrameStatus, GpuContext, InputFrame, Renderer,
};
use serde_json::json;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn context() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("skipping GPU test: {}", e);
            None
        }
    }
}

fn renderer(context: &GpuContext, settings: EffectSettings, post: PostProcessOptions, active: EffectKind) -> Renderer {
    Renderer::new(
        context.clone(),
        FORMAT,
        settings,
        post,
        active,
        Arc::new(BlockAtlasProvider::default()),
    )
    .expect("renderer")
}

fn solid(width: u32, height: u32, value: u8) -> InputFrame {
    InputFrame {
        pixels: [value, value, value, 255].repeat((width * height) as usize),
        width,
        height,
    }
}

fn gradient(width: u32, height: u32) -> InputFrame {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255]);
        }
    }
    InputFrame { pixels, width, height }
}

#[test]
fn mid_grey_matches_index_five_everywhere() {
    let Some(context) = context() else { return };
    let mut settings = EffectSettings::default();
    settings.ascii.cell_size = 16.0;
    settings.ascii.spacing = 0.0;
    settings.ascii.brightness_weight = 1.0;
    settings.ascii.charset = charsets::STANDARD.to_string();

    let mut renderer = renderer(&context, settings, PostProcessOptions::default(), EffectKind::Ascii);
    renderer.set_input(&solid(64, 64, 128)).unwrap();
    let target = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let status = renderer.render_frame(&view, 64, 64, 0.0).unwrap();
    assert_eq!(status, FrameStatus::Rendered);

    let (grid, indices) = renderer.read_matches().unwrap();
    assert_eq!((grid.cols, grid.rows), (4, 4));
    assert_eq!(indices, vec![5; 16]);
    assert_eq!(renderer.ascii_text().unwrap(), "++++\n".repeat(4));
}

#[test]
fn frame_without_input_is_skipped() {
    let Some(context) = context() else { return };
    let mut renderer = renderer(&context, EffectSettings::default(), PostProcessOptions::default(), EffectKind::Halftone);
    let target = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: 8,
            height: 8,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    assert_eq!(renderer.render_frame(&view, 8, 8, 0.0).unwrap(), FrameStatus::NoInput);
    assert!(renderer.capture_frame(8, 8, 0.0).is_err());
}

#[test]
fn bloom_with_zero_intensity_equals_bloom_disabled() {
    let Some(context) = context() else { return };
    let mut post = PostProcessOptions::default();
    post.vignette.enabled = true;

    let mut disabled = renderer(&context, EffectSettings::default(), post.clone(), EffectKind::Dither);
    disabled.set_input(&gradient(64, 48)).unwrap();
    let a = disabled.capture_frame(64, 48, 1.0).unwrap();

    post.bloom.enabled = true;
    post.bloom.intensity = 0.0;
    let mut skipped = renderer(&context, EffectSettings::default(), post, EffectKind::Dither);
    skipped.set_input(&gradient(64, 48)).unwrap();
    let b = skipped.capture_frame(64, 48, 1.0).unwrap();

    assert_eq!(skipped.live_bloom_textures(), 0);
    assert_eq!(a.to_rgba8(), b.to_rgba8());
}

#[test]
fn active_bloom_allocates_its_targets_once() {
    let Some(context) = context() else { return };
    let mut post = PostProcessOptions::default();
    post.bloom.enabled = true;

    let mut renderer = renderer(&context, EffectSettings::default(), post, EffectKind::Edges);
    renderer.set_input(&gradient(32, 32)).unwrap();
    for i in 0..5 {
        renderer.capture_frame(32, 32, i as f32).unwrap();
    }
    assert_eq!(renderer.live_bloom_textures(), 3);
}

#[test]
fn resources_are_stable_across_frames() {
    let Some(context) = context() else { return };
    let mut post = PostProcessOptions::default();
    post.scanlines.enabled = true;

    let mut renderer = renderer(&context, EffectSettings::default(), post, EffectKind::Noise);
    renderer.set_input(&gradient(32, 32)).unwrap();

    assert_eq!(renderer.effect(EffectKind::Noise).unwrap().parameter_allocations(), 1);
    for i in 0..10 {
        renderer.capture_frame(32, 32, i as f32 * 0.016).unwrap();
    }
    // Parameters are rewritten in place, never reallocated.
    assert_eq!(renderer.effect(EffectKind::Noise).unwrap().parameter_allocations(), 1);
    // Source plus one intermediate, allocated once each.
    assert_eq!(renderer.textures().allocations(), 2);
    assert_eq!(renderer.textures().live_textures(), 2);

    // Same-size input reuses the source texture.
    renderer.set_input(&solid(32, 32, 10)).unwrap();
    assert_eq!(renderer.textures().allocations(), 2);
}

#[test]
fn commands_update_options_between_frames() {
    let Some(context) = context() else { return };
    let mut renderer = renderer(&context, EffectSettings::default(), PostProcessOptions::default(), EffectKind::Ascii);

    renderer
        .apply(Command::set_option(OptionTarget::PostProcess, "bloom.enabled", true))
        .unwrap();
    assert!(renderer.post_options().bloom.enabled);

    renderer.apply(Command::SetActiveEffect(EffectKind::Vhs)).unwrap();
    assert_eq!(renderer.active_effect(), EffectKind::Vhs);

    let unknown = Command::set_option(OptionTarget::Effect(EffectKind::Vhs), "no_such_field", 1.0);
    assert!(renderer.apply(unknown).is_err());

    renderer
        .apply(Command::UpdateOptions {
            target: OptionTarget::Effect(EffectKind::Ascii),
            partial: json!({ "charset": " .#" }).as_object().unwrap().clone(),
        })
        .unwrap();
    let ascii = renderer.effect(EffectKind::Ascii).unwrap().as_ascii().unwrap();
    assert_eq!(ascii.ascii_options().charset, " .#");
}

#[test]
fn captured_frame_has_padded_rows() {
    let Some(context) = context() else { return };
    let mut renderer = renderer(&context, EffectSettings::default(), PostProcessOptions::default(), EffectKind::Vhs);
    renderer.set_input(&gradient(50, 20)).unwrap();
    let frame: CapturedFrame = renderer.capture_frame(50, 20, 0.5).unwrap();
    assert_eq!(frame.padded_bytes_per_row, 256);
    assert_eq!(frame.data.len(), 256 * 20);
    assert_eq!(frame.to_rgba8().len(), 50 * 20 * 4);
}

#[test]
fn weighted_match_agrees_with_host_mirror() {
    let Some(context) = context() else { return };
    let mut settings = EffectSettings::default();
    settings.ascii.cell_size = 8.0;
    settings.ascii.quality = MatchQuality::Quality;
    let bitmap = BlockAtlasProvider::default().build(&settings.ascii.charset).unwrap();
    let input = gradient(64, 48);
    let view = ImageView {
        pixels: &input.pixels,
        width: input.width,
        height: input.height,
    };

    let mut renderer = renderer(&context, settings, PostProcessOptions::default(), EffectKind::Ascii);
    renderer.set_input(&input).unwrap();
    for weight in [0.0, 0.5, 0.9] {
        renderer
            .apply(Command::set_option(OptionTarget::Effect(EffectKind::Ascii), "brightness_weight", weight))
            .unwrap();
        renderer.capture_frame(64, 48, 0.0).unwrap();

        let (grid, gpu) = renderer.read_matches().unwrap();
        let ascii = renderer.effect(EffectKind::Ascii).unwrap().as_ascii().unwrap();
        let (host_grid, host) = match_grid(view, 64, 48, ascii.ascii_options(), Some(&bitmap));
        assert_eq!(grid, host_grid);
        assert_eq!(gpu.len(), 48);
        assert_eq!(gpu, host, "weight {}", weight);
    }
}

#[test]
fn output_resize_recreates_size_keyed_textures_once() {
    let Some(context) = context() else { return };
    let mut post = PostProcessOptions::default();
    post.bloom.enabled = true;

    let mut renderer = renderer(&context, EffectSettings::default(), post, EffectKind::Edges);
    renderer.set_input(&gradient(32, 32)).unwrap();
    for i in 0..3 {
        renderer.capture_frame(32, 32, i as f32).unwrap();
    }
    assert_eq!(renderer.textures().allocations(), 2);
    assert_eq!(renderer.bloom_allocations(), 3);

    for i in 0..3 {
        renderer.capture_frame(48, 40, i as f32).unwrap();
    }
    // Intermediate and the three bloom targets are rebuilt once; the source is untouched.
    assert_eq!(renderer.textures().allocations(), 3);
    assert_eq!(renderer.textures().live_textures(), 2);
    assert_eq!(renderer.bloom_allocations(), 6);
    assert_eq!(renderer.live_bloom_textures(), 3);
}

#[test]
fn options_for_an_unbuilt_effect_are_merged_at_creation() {
    let Some(context) = context() else { return };
    let mut renderer = renderer(&context, EffectSettings::default(), PostProcessOptions::default(), EffectKind::Halftone);
    assert!(renderer.effect(EffectKind::Vhs).is_none());

    renderer
        .apply(Command::set_option(OptionTarget::Effect(EffectKind::Vhs), "wobble", 7.5))
        .unwrap();
    let EffectOptions::Vhs(vhs) = renderer.effect(EffectKind::Vhs).unwrap().options() else {
        panic!("expected VHS options");
    };
    assert_eq!(vhs.wobble, 7.5);
    assert_eq!(vhs.tracking, EffectSettings::default().vhs.tracking);
    assert_eq!(renderer.active_effect(), EffectKind::Halftone);

    let unknown = Command::set_option(OptionTarget::Effect(EffectKind::Dither), "no_such_field", 1.0);
    assert!(renderer.apply(unknown).is_err());
    assert!(renderer.effect(EffectKind::Dither).is_none());
}
