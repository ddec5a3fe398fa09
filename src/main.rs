// main.rs — desktop turntable viewer: event loop, menus, paint picker, status bar

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod i18n;
mod renderer;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use clap::Parser;
use image::RgbaImage;
use renderer::Renderer;
use turntable_viewer::{
    Finish, FrameSource, ImageFetcher, InteractionMode, Locator, TurntableViewer, ViewerConfig,
    ViewerSubject,
};
use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

#[derive(Parser, Debug)]
#[command(name = "turntable-viewer", version, about = "360° turntable viewer for vehicle imagery")]
struct Args {
    /// Viewer configuration (JSON). Falls back to TURNTABLE_CONFIG, then assets/viewer.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// UI language code, e.g. en or zh-Hans.
    #[arg(long)]
    lang: Option<String>,

    #[arg(long, requires = "model")]
    make: Option<String>,

    #[arg(long, requires = "make")]
    model: Option<String>,

    #[arg(long, default_value = "")]
    variant: String,

    /// Paint id to show first; defaults to the first configured finish.
    #[arg(long)]
    paint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShownFrame {
    Asset(Locator),
    Placeholder,
}

struct App {
    viewer: TurntableViewer<ImageFetcher>,
    finishes: Vec<Finish>,
    placeholder: RgbaImage,
    shown: Option<ShownFrame>,
    is_fullscreen: bool,
    show_fps: bool,
    last_error: Option<String>,
}

impl App {
    fn new(config: &ViewerConfig, subject: ViewerSubject, paint: Option<&str>, width: f32) -> anyhow::Result<Self> {
        let resolver = config.resolver()?;
        let mut viewer = TurntableViewer::new(
            resolver,
            ImageFetcher::new(),
            config.controller_settings(),
            config.asset_timeout(),
            config.cache_capacity,
        );
        viewer.set_viewer_width(width);

        let finishes = config.finishes_or_default();
        let first = paint
            .and_then(|p| finishes.iter().find(|f| f.paint_id() == p).cloned())
            .or_else(|| paint.map(|p| Finish::new(p, "")))
            .unwrap_or_else(|| finishes[0].clone());
        viewer.configure(subject, first, Instant::now());

        Ok(Self {
            viewer,
            finishes,
            placeholder: renderer::placeholder_frame(),
            shown: None,
            is_fullscreen: false,
            show_fps: false,
            last_error: None,
        })
    }

    /// Swaps in a new configuration, keeping the current vehicle unless the
    /// file names one.
    fn reload(&mut self, path: &Path) {
        let result = ViewerConfig::load(path)
            .map_err(anyhow::Error::from)
            .and_then(|config| {
                let subject = config
                    .subject
                    .clone()
                    .or_else(|| self.viewer.subject().cloned())
                    .ok_or_else(|| anyhow!("no vehicle configured"))?;
                App::new(&config, subject, None, self.viewer.viewer_width())
            });

        match result {
            Ok(mut next) => {
                next.is_fullscreen = self.is_fullscreen;
                next.show_fps = self.show_fps;
                *self = next;
            }
            Err(e) => {
                let msg = i18n::tr_with("error.config", &[("err", format!("{e:#}"))]);
                log::error!("{msg}");
                self.last_error = Some(msg);
            }
        }
    }

    fn select_finish(&mut self, finish: Finish) {
        if let Some(subject) = self.viewer.subject().cloned() {
            self.viewer.configure(subject, finish, Instant::now());
        }
    }

    fn toggle_auto_rotate(&mut self) {
        let on = self.viewer.mode() != InteractionMode::AutoRotating;
        self.viewer.toggle_auto_rotate(on, Instant::now());
    }

    /// Uploads a new texture only when the frame to show changed.
    fn sync_frame(&mut self, renderer: &mut Renderer) {
        let wanted = match self.viewer.current_frame() {
            FrameSource::Asset(locator) => ShownFrame::Asset(locator.clone()),
            FrameSource::Pending | FrameSource::Fallback => ShownFrame::Placeholder,
        };
        if self.shown.as_ref() == Some(&wanted) {
            return;
        }

        let shown = match (wanted, self.viewer.current_asset()) {
            (ShownFrame::Asset(locator), Some(img)) => {
                renderer.show_frame(&img);
                ShownFrame::Asset(locator)
            }
            _ => {
                renderer.show_frame(&self.placeholder);
                ShownFrame::Placeholder
            }
        };
        self.shown = Some(shown);
    }
}

fn toggle_fullscreen(app: &mut App, window: &Window) {
    app.is_fullscreen = !app.is_fullscreen;
    if app.is_fullscreen {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        window.set_fullscreen(None);
    }
}

fn pick_config_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(&i18n::tr("file.filter.config"), &["json"])
        .pick_file()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut current_lang = i18n::resolve_lang(args.lang.as_deref());
    i18n::init(current_lang.clone());

    let (config, config_path) = ViewerConfig::discover(args.config.as_deref())?;
    if let Some(p) = &config_path {
        log::info!("using config {}", p.display());
    }

    let subject = match (&args.make, &args.model) {
        (Some(make), Some(model)) => ViewerSubject::new(make, model, &args.variant)?,
        _ => config
            .subject
            .clone()
            .context("no vehicle configured; pass --make/--model or set \"subject\" in the config")?,
    };

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(i18n::tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("creating window")?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()))?;
    let mut app = App::new(
        &config,
        subject,
        args.paint.as_deref(),
        renderer.size.width as f32,
    )?;

    let mut cursor_x = 0.0f32;

    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;
    let mut fps = 0.0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => {
                // A release over a panel must still end the drag.
                if let WindowEvent::MouseInput {
                    state: ElementState::Released,
                    button: MouseButton::Left,
                    ..
                } = event
                {
                    app.viewer.pointer_up();
                }

                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        app.viewer.dispose();
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        app.viewer.set_viewer_width(new_size.width as f32);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                        app.viewer.set_viewer_width(new_inner_size.width as f32);
                    }

                    WindowEvent::KeyboardInput { input, .. } => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::Left) => {
                                    app.viewer.step_left();
                                }
                                Some(VirtualKeyCode::Right) => {
                                    app.viewer.step_right();
                                }
                                Some(VirtualKeyCode::Space) => app.toggle_auto_rotate(),
                                Some(VirtualKeyCode::Home) => app.viewer.reset(),
                                Some(VirtualKeyCode::O) => {
                                    if let Some(path) = pick_config_file() {
                                        app.reload(&path);
                                    }
                                }
                                Some(VirtualKeyCode::F11) => toggle_fullscreen(&mut app, &window),
                                _ => {}
                            }
                        }
                    }

                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } => {
                        app.viewer.pointer_down(cursor_x);
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor_x = position.x as f32;
                        app.viewer.pointer_move(cursor_x);
                    }

                    WindowEvent::CursorLeft { .. } => {
                        app.viewer.pointer_up();
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                if now.duration_since(last_frame_time).as_secs_f32() >= 1.0 {
                    fps = frame_count as f32 / now.duration_since(last_frame_time).as_secs_f32();
                    frame_count = 0;
                    last_frame_time = now;
                }

                app.sync_frame(&mut renderer);

                let mut actions = UiActions::default();
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    draw_ui(ctx, &mut app, &mut actions, fps, &window, &mut current_lang);
                });

                if let Some(path) = actions.open_config {
                    app.reload(&path);
                }
                if actions.exit {
                    app.viewer.dispose();
                    *control_flow = ControlFlow::Exit;
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::error!("render error: {e:?}"),
                }
            }

            Event::MainEventsCleared => {
                app.viewer.update(Instant::now());
                window.request_redraw();
            }

            Event::LoopDestroyed => app.viewer.dispose(),

            _ => {}
        }
    })
}

#[derive(Default)]
struct UiActions {
    open_config: Option<PathBuf>,
    exit: bool,
}

fn mode_label(mode: InteractionMode) -> String {
    match mode {
        InteractionMode::Idle => i18n::tr("mode.idle"),
        InteractionMode::Dragging => i18n::tr("mode.dragging"),
        InteractionMode::AutoRotating => i18n::tr("mode.auto_rotating"),
    }
}

fn draw_ui(
    ctx: &egui::Context,
    app: &mut App,
    actions: &mut UiActions,
    fps: f32,
    window: &Window,
    current_lang: &mut String,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button(i18n::tr("menu.file"), |ui| {
                if ui.button(i18n::tr("menu.open_config")).clicked() {
                    ui.close_menu();
                    actions.open_config = pick_config_file();
                }
                if ui.button(i18n::tr("menu.exit")).clicked() {
                    actions.exit = true;
                }
            });

            ui.menu_button(i18n::tr("menu.view"), |ui| {
                if ui.button(i18n::tr("view.reset")).clicked() {
                    app.viewer.reset();
                    ui.close_menu();
                }

                let fullscreen_label = if app.is_fullscreen {
                    i18n::tr("view.fullscreen.exit")
                } else {
                    i18n::tr("view.fullscreen.enter")
                };
                if ui.button(fullscreen_label).clicked() {
                    toggle_fullscreen(app, window);
                    ui.close_menu();
                }

                ui.separator();
                let mut settings = *app.viewer.settings();
                let damping = ui.add(
                    egui::Slider::new(&mut settings.drag_damping, 0.5..=20.0)
                        .text(i18n::tr("view.drag_sensitivity")),
                );
                let invert = ui.checkbox(&mut settings.invert_drag, i18n::tr("view.invert_drag"));
                if damping.changed() || invert.changed() {
                    app.viewer.set_settings(settings);
                }

                ui.separator();
                if ui.checkbox(&mut app.show_fps, i18n::tr("view.show_fps")).clicked() {
                    ui.close_menu();
                }
            });

            ui.menu_button(i18n::tr("menu.language"), |ui| {
                let langs: [(&str, &str); 2] = [("en", "English"), ("zh-Hans", "简体中文")];
                for (code, name) in langs {
                    if ui.radio_value(current_lang, code.to_string(), name).clicked() {
                        i18n::init(current_lang.clone());
                        window.set_title(&i18n::tr("app.title"));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if let Some(state) = app.viewer.preload_state() {
                if state.is_ready() {
                    ui.label(i18n::tr("status.ready"));
                } else {
                    ui.add(
                        egui::ProgressBar::new(state.progress())
                            .desired_width(160.0)
                            .text(i18n::tr_with(
                                "status.loading",
                                &[
                                    ("done", state.completed_count().to_string()),
                                    ("total", state.total().to_string()),
                                ],
                            )),
                    );
                }
                if state.failed_count() > 0 {
                    ui.label("|");
                    ui.label(
                        egui::RichText::new(i18n::tr_with(
                            "status.failed",
                            &[("count", state.failed_count().to_string())],
                        ))
                        .color(egui::Color32::YELLOW),
                    );
                }
                ui.label("|");
            }

            if let Some(subject) = app.viewer.subject() {
                ui.label(format!("{} {}", i18n::tr("status.subject_prefix"), subject.label()));
                ui.label("|");
            }

            ui.label(i18n::tr_with(
                "status.angle",
                &[
                    ("deg", format!("{:.0}", app.viewer.angle_degrees())),
                    ("step", (app.viewer.orientation() + 1).to_string()),
                    ("total", app.viewer.resolver().step_count().to_string()),
                ],
            ));
            ui.label("|");
            ui.label(format!(
                "{} {}",
                i18n::tr("status.mode_prefix"),
                mode_label(app.viewer.mode())
            ));

            match app.viewer.current_frame() {
                FrameSource::Pending => {
                    ui.label("|");
                    ui.label(i18n::tr("status.frame_pending"));
                }
                FrameSource::Fallback => {
                    ui.label("|");
                    ui.label(
                        egui::RichText::new(i18n::tr("status.frame_fallback"))
                            .color(egui::Color32::LIGHT_RED),
                    );
                }
                FrameSource::Asset(_) => {}
            }

            if app.show_fps {
                ui.label("|");
                ui.label(egui::RichText::new(format!("FPS: {fps:.1}")).color(egui::Color32::GREEN));
            }
        });
    });

    egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button(i18n::tr("control.step_left")).clicked() {
                app.viewer.step_left();
            }
            if ui.button(i18n::tr("control.step_right")).clicked() {
                app.viewer.step_right();
            }

            let mut auto = app.viewer.mode() == InteractionMode::AutoRotating;
            let toggle = ui.add_enabled(
                app.viewer.is_ready(),
                egui::Checkbox::new(&mut auto, i18n::tr("control.auto_rotate")),
            );
            if toggle.changed() {
                app.viewer.toggle_auto_rotate(auto, Instant::now());
            }

            ui.separator();
            ui.label(i18n::tr("panel.finishes"));
            let current = app.viewer.finish().cloned();
            let mut picked = None;
            for finish in &app.finishes {
                let selected = current.as_ref() == Some(finish);
                if ui.selectable_label(selected, finish.label()).clicked() && !selected {
                    picked = Some(finish.clone());
                }
            }
            if let Some(finish) = picked {
                app.select_finish(finish);
            }
        });

        if let Some(err) = &app.last_error {
            ui.colored_label(egui::Color32::LIGHT_RED, err);
        }
    });

    // Grab cursor over the turntable itself.
    if !ctx.is_pointer_over_area() {
        match app.viewer.mode() {
            InteractionMode::Dragging => ctx.set_cursor_icon(egui::CursorIcon::Grabbing),
            _ if app.viewer.is_ready() => ctx.set_cursor_icon(egui::CursorIcon::Grab),
            _ => ctx.set_cursor_icon(egui::CursorIcon::Progress),
        }
    }
}
