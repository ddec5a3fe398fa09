// lookup.rs — which image the surface should draw for an index

use crate::controller::wrap_step;
use crate::preload::{PreloadState, SlotStatus};
use crate::resolver::{AssetSequence, Locator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource<'a> {
    /// The slot loaded; draw this locator's asset.
    Asset(&'a Locator),
    /// Still in flight.
    Pending,
    /// Failed or timed out; draw the placeholder.
    Fallback,
}

impl FrameSource<'_> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, FrameSource::Fallback)
    }
}

/// Side-effect free; `index` is wrapped into the sequence length.
pub fn current_image<'a>(
    sequence: &'a AssetSequence,
    state: &PreloadState,
    index: usize,
) -> FrameSource<'a> {
    if sequence.is_empty() {
        return FrameSource::Fallback;
    }
    let Some(locator) = sequence.get(wrap_step(index as i64, sequence.len())) else {
        return FrameSource::Fallback;
    };
    match state.status(locator) {
        Some(SlotStatus::Loaded) => FrameSource::Asset(locator),
        Some(SlotStatus::Failed(_)) => FrameSource::Fallback,
        // Unknown locator means the state belongs to another cycle.
        Some(SlotStatus::Pending) | None => FrameSource::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::Fetch;
    use crate::preload::PreloadManager;
    use crate::resolver::AssetResolver;
    use crate::subject::{Finish, ViewerSubject};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    struct SlowFetch;

    impl Fetch for SlowFetch {
        type Asset = ();

        fn fetch(&self, _: &Locator, _: Duration) -> Result<(), FetchError> {
            std::thread::sleep(Duration::from_secs(3600));
            Ok(())
        }
    }

    #[test]
    fn pending_then_fallback_after_timeout() {
        let subject = ViewerSubject::new("bmw", "x5", "suv").unwrap();
        let seq = AssetResolver::default().resolve(&subject, &Finish::new("1", ""));
        let t0 = Instant::now();
        let mut m = PreloadManager::new(SlowFetch, Duration::from_millis(10), 0);
        m.start(&seq, t0);

        assert_eq!(current_image(&seq, m.state().unwrap(), 0), FrameSource::Pending);

        m.poll(t0 + Duration::from_millis(10));
        let state = m.state().unwrap();
        for i in 0..24 {
            assert!(current_image(&seq, state, i).is_fallback());
        }
        // wraps
        assert!(current_image(&seq, state, 24 * 3 + 1).is_fallback());
    }

    #[test]
    fn foreign_state_reads_as_pending() {
        let resolver = AssetResolver::default();
        let subject = ViewerSubject::new("bmw", "x5", "suv").unwrap();
        let red = resolver.resolve(&subject, &Finish::new("red", ""));
        let blue = resolver.resolve(&subject, &Finish::new("blue", ""));
        let t0 = Instant::now();
        let mut m = PreloadManager::new(SlowFetch, Duration::from_millis(10), 0);
        m.start(&blue, t0);
        m.poll(t0 + Duration::from_secs(1));

        assert_eq!(current_image(&red, m.state().unwrap(), 5), FrameSource::Pending);
    }
}
