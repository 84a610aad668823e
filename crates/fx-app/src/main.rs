// ABOUTME: Main application entry point.
// ABOUTME: Opens the window, drives the frame loop and forwards keys to the renderer.

mod input;
mod keys;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowAttributes, WindowId};

use fx_core::{Config, EffectKind, FontSettings};
use fx_renderer::{AtlasProvider, BlockAtlasProvider, FontAtlasBuilder, FrameStatus, GpuState, Renderer};

use input::AppEvent;
use keys::{KeyAction, KeyContext};

/// Font atlas source: configured font, then a system monospace font, then blocks.
fn atlas_provider(font: &FontSettings) -> Arc<dyn AtlasProvider + Send + Sync> {
    let builder = match &font.path {
        Some(path) => FontAtlasBuilder::from_path(path, font.pixel_size),
        None => FontAtlasBuilder::discover(font.pixel_size),
    };
    match builder {
        Ok(builder) => Arc::new(builder),
        Err(e) => {
            tracing::warn!("{}; falling back to block glyphs", e);
            Arc::new(BlockAtlasProvider::default())
        }
    }
}

fn load_config() -> Config {
    let Some(path) = Config::default_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match Config::load(&path) {
        Ok(config) => {
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("Ignoring {}: {}", path.display(), e);
            Config::default()
        }
    }
}

struct App {
    config: Config,
    input_path: Option<PathBuf>,
    proxy: EventLoopProxy<AppEvent>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    renderer: Option<Renderer>,
    start: Instant,
    /// Cleared on close; redraws after that are ignored.
    active: bool,
    init_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config, input_path: Option<PathBuf>, proxy: EventLoopProxy<AppEvent>) -> Self {
        Self {
            config,
            input_path,
            proxy,
            window: None,
            gpu: None,
            renderer: None,
            start: Instant::now(),
            active: true,
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = WindowAttributes::default()
            .with_title(title(self.config.active_effect))
            .with_inner_size(LogicalSize::new(self.config.window_width, self.config.window_height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let gpu = pollster::block_on(GpuState::new(Arc::clone(&window)))?;
        let renderer = Renderer::new(
            gpu.context.clone(),
            gpu.format(),
            self.config.effects.clone(),
            self.config.post.clone(),
            self.config.active_effect,
            atlas_provider(&self.config.font),
        )?;

        let size = window.inner_size();
        tracing::info!(
            "Window created: {}x{} physical pixels, scale factor: {}",
            size.width,
            size.height,
            window.scale_factor()
        );

        match &self.input_path {
            Some(path) => input::spawn_loader(path.clone(), self.proxy.clone()),
            None => tracing::warn!("No input image given; pass a path on the command line"),
        }

        window.request_redraw();
        self.window = Some(window);
        self.gpu = Some(gpu);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn redraw(&mut self) {
        if !self.active {
            return;
        }
        let (Some(gpu), Some(renderer)) = (self.gpu.as_mut(), self.renderer.as_mut()) else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("Surface lost or outdated, reconfiguring");
                gpu.reconfigure();
                return;
            }
            Err(e) => {
                tracing::error!("Failed to acquire surface texture: {}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let time = self.start.elapsed().as_secs_f32();
        match renderer.render_frame(&view, gpu.config.width, gpu.config.height, time) {
            Ok(FrameStatus::Rendered) | Ok(FrameStatus::NoInput) => {}
            Err(e) => tracing::error!("Skipped frame: {}", e),
        }
        output.present();
    }

    fn handle_key(&mut self, key: &winit::keyboard::Key, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let ascii = renderer
            .effect(EffectKind::Ascii)
            .and_then(|e| e.as_ascii())
            .map(|a| a.ascii_options())
            .unwrap_or(&self.config.effects.ascii);
        let context = KeyContext {
            active: renderer.active_effect(),
            post: renderer.post_options(),
            ascii,
        };
        let Some(action) = keys::action_for(key, &context) else {
            return;
        };

        match action {
            KeyAction::Apply(command) => {
                if let Err(e) = renderer.apply(command) {
                    tracing::warn!("Command rejected: {}", e);
                }
                if let Some(window) = &self.window {
                    window.set_title(&title(renderer.active_effect()));
                }
            }
            KeyAction::Capture => {
                let Some(gpu) = &self.gpu else { return };
                let time = self.start.elapsed().as_secs_f32();
                let saved = renderer
                    .capture_frame(gpu.config.width, gpu.config.height, time)
                    .map_err(anyhow::Error::from)
                    .and_then(|frame| input::save_capture(&self.config.capture_dir(), &frame));
                match saved {
                    Ok(path) => tracing::info!("Saved capture to {}", path.display()),
                    Err(e) => tracing::error!("Capture failed: {:#}", e),
                }
            }
            KeyAction::ExportText => {
                let saved = renderer
                    .ascii_text()
                    .map_err(anyhow::Error::from)
                    .and_then(|text| input::save_text(&self.config.capture_dir(), &text));
                match saved {
                    Ok(path) => tracing::info!("Saved ASCII text to {}", path.display()),
                    Err(e) => tracing::error!("Text export failed: {:#}", e),
                }
            }
            KeyAction::Quit => self.shutdown(event_loop),
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.active = false;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.destroy();
        }
        event_loop.exit();
    }
}

fn title(effect: EffectKind) -> String {
    format!("fxdeck: {}", effect.label())
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("Initialization failed: {:#}", e);
            self.init_error = Some(e);
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::InputLoaded(path, frame) => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                match renderer.set_input(&frame) {
                    Ok(()) => tracing::info!("Loaded {} ({}x{})", path.display(), frame.width, frame.height),
                    Err(e) => tracing::error!("Rejected {}: {}", path.display(), e),
                }
            }
            AppEvent::InputFailed(path, message) => {
                tracing::error!("Could not load {}: {}", path.display(), message);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if self.active {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.handle_key(&event.logical_key, event_loop);
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting fxdeck");

    let mut config = load_config();
    if let Some(arg) = std::env::args_os().nth(1) {
        config.input = Some(PathBuf::from(arg));
    }
    let input_path = config.input.clone();

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    let mut app = App::new(config, input_path, event_loop.create_proxy());

    event_loop.run_app(&mut app)?;

    match app.init_error.take() {
        Some(e) => Err(anyhow!("fxdeck failed to start: {:#}", e)),
        None => Ok(()),
    }
}
