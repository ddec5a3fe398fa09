// viewer.rs — turntable widget facade: configure, signals, controls, teardown

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::controller::{ControllerSettings, InteractionMode, OrientationController};
use crate::fetch::Fetch;
use crate::lookup::{current_image, FrameSource};
use crate::preload::{PreloadHandle, PreloadManager, PreloadState};
use crate::resolver::{AssetResolver, AssetSequence};
use crate::subject::{Finish, ViewerSubject};

struct Configured {
    sequence: AssetSequence,
    handle: PreloadHandle,
}

/// A resolver, a preload manager and an orientation controller wired together.
///
/// The host calls [`TurntableViewer::update`] once per frame and forwards
/// pointer events; everything runs on the host's UI thread except the fetch
/// workers.
pub struct TurntableViewer<F: Fetch> {
    resolver: AssetResolver,
    preload: PreloadManager<F>,
    controller: OrientationController,
    current: Option<Configured>,
}

impl<F: Fetch> TurntableViewer<F> {
    pub fn new(
        resolver: AssetResolver,
        fetcher: F,
        settings: ControllerSettings,
        asset_timeout: Duration,
        cache_capacity: usize,
    ) -> Self {
        let controller = OrientationController::new(resolver.step_count(), settings);
        Self {
            resolver,
            preload: PreloadManager::new(fetcher, asset_timeout, cache_capacity),
            controller,
            current: None,
        }
    }

    /// (Re)starts resolution and preload. The angle is kept when only the
    /// finish changes and reset to 0 when the subject changes.
    pub fn configure(&mut self, subject: ViewerSubject, finish: Finish, now: Instant) -> PreloadHandle {
        let subject_changed = self
            .current
            .as_ref()
            .map_or(true, |c| c.sequence.subject() != &subject);

        let sequence = self.resolver.resolve(&subject, &finish);
        self.controller.halt();
        if subject_changed {
            self.controller.reset();
        }

        info!(
            "configure {} / {} ({} steps)",
            subject.label(),
            finish.label(),
            sequence.len()
        );
        let handle = self.preload.start(&sequence, now);
        self.controller.set_assets_ready(self.preload.is_ready());
        self.current = Some(Configured {
            sequence,
            handle: handle.clone(),
        });
        handle
    }

    /// Per-frame pump: drains fetch results, expires timeouts, fires the
    /// auto-rotate timer. Returns true when anything visible changed.
    pub fn update(&mut self, now: Instant) -> bool {
        let loaded = self.preload.poll(now);
        self.controller.set_assets_ready(self.preload.is_ready());
        let ticked = self.controller.tick(now);
        loaded || ticked
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn sequence(&self) -> Option<&AssetSequence> {
        self.current.as_ref().map(|c| &c.sequence)
    }

    pub fn subject(&self) -> Option<&ViewerSubject> {
        self.sequence().map(AssetSequence::subject)
    }

    pub fn finish(&self) -> Option<&Finish> {
        self.sequence().map(AssetSequence::finish)
    }

    pub fn handle(&self) -> Option<&PreloadHandle> {
        self.current.as_ref().map(|c| &c.handle)
    }

    pub fn preload_state(&self) -> Option<&PreloadState> {
        self.preload.state()
    }

    pub fn is_ready(&self) -> bool {
        self.preload.is_ready()
    }

    pub fn orientation(&self) -> usize {
        self.controller.index()
    }

    pub fn angle_degrees(&self) -> f32 {
        self.controller.angle_degrees()
    }

    pub fn mode(&self) -> InteractionMode {
        self.controller.mode()
    }

    pub fn settings(&self) -> &ControllerSettings {
        self.controller.settings()
    }

    pub fn set_settings(&mut self, settings: ControllerSettings) {
        self.controller.set_settings(settings);
    }

    pub fn current_frame(&self) -> FrameSource<'_> {
        match (self.sequence(), self.preload.state()) {
            (Some(seq), Some(state)) => current_image(seq, state, self.controller.index()),
            _ => FrameSource::Pending,
        }
    }

    pub fn current_asset(&self) -> Option<Arc<F::Asset>> {
        match self.current_frame() {
            FrameSource::Asset(locator) => self.preload.asset(locator),
            FrameSource::Pending | FrameSource::Fallback => None,
        }
    }

    pub fn viewer_width(&self) -> f32 {
        self.controller.viewer_width()
    }

    pub fn set_viewer_width(&mut self, width: f32) {
        self.controller.set_viewer_width(width);
    }

    pub fn pointer_down(&mut self, x: f32) -> bool {
        self.controller.pointer_down(x)
    }

    pub fn pointer_move(&mut self, x: f32) -> bool {
        self.controller.pointer_move(x)
    }

    pub fn pointer_up(&mut self) {
        self.controller.pointer_up();
    }

    pub fn toggle_auto_rotate(&mut self, on: bool, now: Instant) -> bool {
        self.controller.toggle_auto_rotate(on, now)
    }

    pub fn step_left(&mut self) -> bool {
        self.controller.step_left()
    }

    pub fn step_right(&mut self) -> bool {
        self.controller.step_right()
    }

    pub fn reset(&mut self) {
        self.controller.reset();
    }

    /// Releases the timer, any drag and the in-flight preload.
    pub fn dispose(&mut self) {
        self.controller.halt();
        self.controller.set_assets_ready(false);
        if let Some(current) = self.current.take() {
            self.preload.cancel(&current.handle);
        }
        self.preload.dispose();
    }
}

impl<F: Fetch> Drop for TurntableViewer<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
