// controller.rs — orientation state machine: drag, step buttons, auto-rotation

use std::time::{Duration, Instant};

use log::debug;

pub const DEFAULT_DRAG_DAMPING: f32 = 5.0;
pub const DEFAULT_AUTO_ROTATE_INTERVAL: Duration = Duration::from_millis(650);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Dragging,
    AutoRotating,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    /// Viewer widths per `steps` orientation steps; 5.0 means one full-width
    /// drag advances `steps / 5` positions.
    pub drag_damping: f32,
    pub invert_drag: bool,
    pub auto_rotate_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            drag_damping: DEFAULT_DRAG_DAMPING,
            invert_drag: false,
            auto_rotate_interval: DEFAULT_AUTO_ROTATE_INTERVAL,
        }
    }
}

/// `index mod steps`, always in `[0, steps)`.
pub fn wrap_step(index: i64, steps: usize) -> usize {
    if steps == 0 {
        return 0;
    }
    index.rem_euclid(steps as i64) as usize
}

/// Horizontal pixels that make up one orientation step, or `None` when the
/// viewer has no usable width.
pub fn pixels_per_step(viewer_width: f32, steps: usize, damping: f32) -> Option<f32> {
    let pps = viewer_width * damping / steps as f32;
    (steps > 0 && viewer_width > 0.0 && pps.is_finite() && pps > 0.0).then_some(pps)
}

/// Orientation reached by dragging from `origin_x` to `x`, starting at
/// `start_step`. Rounds to the nearest step and wraps in both directions.
pub fn drag_to_step(
    start_step: usize,
    origin_x: f32,
    x: f32,
    viewer_width: f32,
    steps: usize,
    damping: f32,
) -> usize {
    let Some(pps) = pixels_per_step(viewer_width, steps, damping) else {
        return wrap_step(start_step as i64, steps);
    };
    // The float cast saturates for extreme coordinates; reduce before adding.
    let delta = ((x - origin_x) / pps).round() as i64;
    let start = wrap_step(start_step as i64, steps) as i64;
    wrap_step(start + delta.rem_euclid(steps as i64), steps)
}

#[derive(Debug, Clone, Copy)]
struct DragTracker {
    origin_x: f32,
    start_step: usize,
}

/// Auto-rotation subscription. Dropping it is the only way to stop it.
#[derive(Debug, Clone, Copy)]
struct AutoRotateTimer {
    interval: Duration,
    next_due: Instant,
}

impl AutoRotateTimer {
    fn start(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// One step per call at most; a late frame does not replay missed ticks.
    fn fire(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}

/// The single thing allowed to move the index on its own.
#[derive(Debug, Clone, Copy, Default)]
enum Driver {
    #[default]
    None,
    Drag(DragTracker),
    Auto(AutoRotateTimer),
}

#[derive(Debug, Clone)]
pub struct OrientationController {
    steps: usize,
    index: usize,
    driver: Driver,
    settings: ControllerSettings,
    assets_ready: bool,
    viewer_width: f32,
}

impl OrientationController {
    pub fn new(steps: usize, settings: ControllerSettings) -> Self {
        Self {
            steps,
            index: 0,
            driver: Driver::None,
            settings,
            assets_ready: false,
            viewer_width: 0.0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ControllerSettings) {
        self.settings = settings;
        if let Driver::Auto(timer) = &mut self.driver {
            timer.interval = settings.auto_rotate_interval;
        }
    }

    pub fn mode(&self) -> InteractionMode {
        match self.driver {
            Driver::None => InteractionMode::Idle,
            Driver::Drag(_) => InteractionMode::Dragging,
            Driver::Auto(_) => InteractionMode::AutoRotating,
        }
    }

    pub fn is_timer_active(&self) -> bool {
        matches!(self.driver, Driver::Auto(_))
    }

    pub fn assets_ready(&self) -> bool {
        self.assets_ready
    }

    pub fn set_assets_ready(&mut self, ready: bool) {
        self.assets_ready = ready;
    }

    pub fn viewer_width(&self) -> f32 {
        self.viewer_width
    }

    pub fn set_viewer_width(&mut self, width: f32) {
        self.viewer_width = width.max(0.0);
    }

    /// Rotation angle in degrees for the current index.
    pub fn angle_degrees(&self) -> f32 {
        if self.steps == 0 {
            return 0.0;
        }
        self.index as f32 * 360.0 / self.steps as f32
    }

    /// Starts a drag. Preempts auto-rotation; ignored until assets are ready.
    pub fn pointer_down(&mut self, x: f32) -> bool {
        if !self.assets_ready {
            debug!("pointer down ignored, assets not ready");
            return false;
        }
        match self.driver {
            Driver::Drag(_) => false,
            Driver::None | Driver::Auto(_) => {
                // Replacing the driver drops any timer before a delta is applied.
                self.driver = Driver::Drag(DragTracker {
                    origin_x: x,
                    start_step: self.index,
                });
                true
            }
        }
    }

    /// Returns true when the index changed.
    pub fn pointer_move(&mut self, x: f32) -> bool {
        let Driver::Drag(drag) = self.driver else {
            return false;
        };
        let x = if self.settings.invert_drag {
            2.0 * drag.origin_x - x
        } else {
            x
        };
        let next = drag_to_step(
            drag.start_step,
            drag.origin_x,
            x,
            self.viewer_width,
            self.steps,
            self.settings.drag_damping,
        );
        let changed = next != self.index;
        self.index = next;
        changed
    }

    pub fn pointer_up(&mut self) {
        if let Driver::Drag(_) = self.driver {
            self.driver = Driver::None;
        }
    }

    /// Turning on is only legal from Idle with ready assets.
    pub fn toggle_auto_rotate(&mut self, on: bool, now: Instant) -> bool {
        match (on, self.driver) {
            (true, Driver::None) if self.assets_ready => {
                self.driver =
                    Driver::Auto(AutoRotateTimer::start(self.settings.auto_rotate_interval, now));
                true
            }
            (false, Driver::Auto(_)) => {
                self.driver = Driver::None;
                true
            }
            _ => false,
        }
    }

    /// Advances auto-rotation when its interval has elapsed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Driver::Auto(timer) = &mut self.driver else {
            return false;
        };
        if !timer.fire(now) {
            return false;
        }
        self.index = wrap_step(self.index as i64 + 1, self.steps);
        true
    }

    pub fn step_left(&mut self) -> bool {
        self.step_by(-1)
    }

    pub fn step_right(&mut self) -> bool {
        self.step_by(1)
    }

    fn step_by(&mut self, delta: i64) -> bool {
        match self.driver {
            Driver::Drag(_) => false,
            Driver::None | Driver::Auto(_) => {
                self.driver = Driver::None;
                self.index = wrap_step(self.index as i64 + delta, self.steps);
                true
            }
        }
    }

    /// Back to step 0 and Idle from any state.
    pub fn reset(&mut self) {
        self.driver = Driver::None;
        self.index = 0;
    }

    /// Tears down drag tracking and the timer without touching the index.
    pub fn halt(&mut self) {
        self.driver = Driver::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const N: usize = 24;

    fn ready_controller(width: f32) -> OrientationController {
        let mut c = OrientationController::new(N, ControllerSettings::default());
        c.set_assets_ready(true);
        c.set_viewer_width(width);
        c
    }

    #[test]
    fn full_width_drag_moves_a_fifth_of_the_turn() {
        // 24 / 5 = 4.8, rounded to 5
        assert_eq!(drag_to_step(0, 0.0, 1000.0, 1000.0, N, 5.0), 5);
        assert_eq!(drag_to_step(0, 500.0, -500.0, 1000.0, N, 5.0), N - 5);
        assert_eq!(drag_to_step(22, 0.0, 1000.0, 1000.0, N, 5.0), 3);
    }

    #[test]
    fn drag_rounds_to_nearest_step() {
        // one step = 1000 * 5 / 24 ≈ 208.3 px
        assert_eq!(drag_to_step(0, 0.0, 104.0, 1000.0, N, 5.0), 0);
        assert_eq!(drag_to_step(0, 0.0, 105.0, 1000.0, N, 5.0), 1);
        assert_eq!(drag_to_step(0, 0.0, -105.0, 1000.0, N, 5.0), N - 1);
    }

    #[test]
    fn zero_width_viewer_does_not_move() {
        assert_eq!(pixels_per_step(0.0, N, 5.0), None);
        assert_eq!(drag_to_step(7, 0.0, 900.0, 0.0, N, 5.0), 7);
    }

    #[test]
    fn pointer_down_ignored_until_ready() {
        let mut c = OrientationController::new(N, ControllerSettings::default());
        assert!(!c.pointer_down(10.0));
        assert_eq!(c.mode(), InteractionMode::Idle);
        assert!(!c.toggle_auto_rotate(true, Instant::now()));
        assert_eq!(c.mode(), InteractionMode::Idle);

        c.set_assets_ready(true);
        assert!(c.pointer_down(10.0));
        assert_eq!(c.mode(), InteractionMode::Dragging);
    }

    #[test]
    fn drag_tracks_from_start_index() {
        let mut c = ready_controller(1000.0);
        c.step_right();
        c.step_right();
        c.pointer_down(300.0);
        assert!(c.pointer_move(300.0 + 2.0 * 208.4));
        assert_eq!(c.index(), 4);
        c.pointer_move(300.0);
        assert_eq!(c.index(), 2);
        c.pointer_up();
        assert_eq!(c.mode(), InteractionMode::Idle);
        assert!(!c.pointer_move(0.0));
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn inverted_drag_turns_the_other_way() {
        let mut c = ready_controller(1000.0);
        c.set_settings(ControllerSettings {
            invert_drag: true,
            ..ControllerSettings::default()
        });
        c.pointer_down(500.0);
        c.pointer_move(500.0 + 208.4);
        assert_eq!(c.index(), N - 1);
    }

    #[test]
    fn auto_rotate_ticks_once_per_interval() {
        let t0 = Instant::now();
        let mut c = ready_controller(1000.0);
        assert!(c.toggle_auto_rotate(true, t0));
        assert!(!c.tick(t0 + Duration::from_millis(100)));
        assert!(c.tick(t0 + Duration::from_millis(650)));
        assert_eq!(c.index(), 1);
        // a long stall yields a single step
        assert!(c.tick(t0 + Duration::from_secs(10)));
        assert_eq!(c.index(), 2);
        assert!(!c.tick(t0 + Duration::from_secs(10) + Duration::from_millis(1)));
    }

    #[test]
    fn pointer_down_tears_down_auto_rotation() {
        let t0 = Instant::now();
        let mut c = ready_controller(1000.0);
        for _ in 0..5 {
            c.step_right();
        }
        c.toggle_auto_rotate(true, t0);
        c.tick(t0 + Duration::from_millis(650));
        assert_eq!(c.index(), 6);

        assert!(c.pointer_down(200.0));
        assert_eq!(c.mode(), InteractionMode::Dragging);
        assert!(!c.is_timer_active());

        // the old timer would have fired here
        assert!(!c.tick(t0 + Duration::from_millis(1300)));
        assert!(!c.tick(t0 + Duration::from_secs(5)));
        assert_eq!(c.index(), 6);

        // no drag movement recorded yet either
        c.pointer_up();
        assert!(!c.tick(t0 + Duration::from_secs(6)));
        assert_eq!(c.index(), 6);
    }

    #[test]
    fn toggle_transitions() {
        let t0 = Instant::now();
        let mut c = ready_controller(1000.0);
        assert!(!c.toggle_auto_rotate(false, t0));
        assert!(c.toggle_auto_rotate(true, t0));
        assert!(!c.toggle_auto_rotate(true, t0));
        assert_eq!(c.mode(), InteractionMode::AutoRotating);
        assert!(c.toggle_auto_rotate(false, t0));
        assert_eq!(c.mode(), InteractionMode::Idle);

        c.pointer_down(0.0);
        assert!(!c.toggle_auto_rotate(true, t0));
        assert_eq!(c.mode(), InteractionMode::Dragging);
    }

    #[test]
    fn steps_wrap_and_are_ignored_while_dragging() {
        let mut c = ready_controller(1000.0);
        assert!(c.step_left());
        assert_eq!(c.index(), N - 1);
        assert!(c.step_right());
        assert_eq!(c.index(), 0);

        c.pointer_down(0.0);
        assert!(!c.step_right());
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn step_stops_auto_rotation() {
        let t0 = Instant::now();
        let mut c = ready_controller(1000.0);
        c.toggle_auto_rotate(true, t0);
        assert!(c.step_right());
        assert_eq!(c.mode(), InteractionMode::Idle);
        assert!(!c.tick(t0 + Duration::from_secs(1)));
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn reset_returns_to_zero_and_idle() {
        let t0 = Instant::now();
        let mut c = ready_controller(1000.0);
        c.step_left();
        c.toggle_auto_rotate(true, t0);
        c.reset();
        assert_eq!(c.index(), 0);
        assert_eq!(c.mode(), InteractionMode::Idle);
        assert_eq!(c.angle_degrees(), 0.0);
    }

    #[test]
    fn angle_readout() {
        let mut c = ready_controller(1000.0);
        for _ in 0..9 {
            c.step_right();
        }
        assert_eq!(c.angle_degrees(), 135.0);
    }

    proptest! {
        #[test]
        fn index_stays_in_range_for_any_drag(
            start in 0usize..N,
            width in 1.0f32..4000.0,
            moves in prop::collection::vec(-1.0e6f32..1.0e6, 1..40),
        ) {
            let mut c = ready_controller(width);
            for _ in 0..start {
                c.step_right();
            }
            c.pointer_down(0.0);
            for x in moves {
                c.pointer_move(x);
                prop_assert!(c.index() < N);
            }
        }

        #[test]
        fn extreme_coordinates_stay_in_range(
            start in 0usize..N,
            origin in prop::sample::select(vec![f32::MIN, f32::MAX, 0.0, -1.0e30, 1.0e30]),
            x in prop::sample::select(vec![f32::MIN, f32::MAX, f32::INFINITY, f32::NEG_INFINITY, f32::NAN, 0.0]),
        ) {
            prop_assert!(drag_to_step(start, origin, x, 1000.0, N, 5.0) < N);
            let mut c = ready_controller(1000.0);
            for _ in 0..start {
                c.step_right();
            }
            c.pointer_down(origin);
            c.pointer_move(x);
            prop_assert!(c.index() < N);
        }

        #[test]
        fn wrap_step_is_always_in_range(k in any::<i64>(), steps in 1usize..100) {
            prop_assert!(wrap_step(k, steps) < steps);
        }
    }
}
