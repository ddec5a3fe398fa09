// preload.rs — concurrent fetch of one asset sequence with per-slot timeout

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::{AssetError, FetchError};
use crate::fetch::Fetch;
use crate::resolver::{AssetSequence, Locator};

pub const DEFAULT_ASSET_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CACHE_CAPACITY: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Pending,
    Loaded,
    Failed(AssetError),
}

impl SlotStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlotStatus::Pending)
    }
}

/// Per-slot progress of one preload cycle, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadState {
    generation: u64,
    slots: IndexMap<Locator, SlotStatus>,
    completed: usize,
}

impl PreloadState {
    fn new(generation: u64, sequence: &AssetSequence) -> Self {
        let slots = sequence
            .iter()
            .map(|l| (l.clone(), SlotStatus::Pending))
            .collect();
        Self {
            generation,
            slots,
            completed: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self, locator: &Locator) -> Option<&SlotStatus> {
        self.slots.get(locator)
    }

    pub fn status_at(&self, index: usize) -> Option<&SlotStatus> {
        self.slots.get_index(index).map(|(_, s)| s)
    }

    pub fn slots(&self) -> impl Iterator<Item = (&Locator, &SlotStatus)> {
        self.slots.iter()
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Slots that reached Loaded or Failed. Never decreases.
    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.values().filter(|s| **s == SlotStatus::Loaded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, SlotStatus::Failed(_)))
            .count()
    }

    pub fn is_ready(&self) -> bool {
        self.completed == self.slots.len()
    }

    /// `completed / total` in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.slots.is_empty() {
            return 1.0;
        }
        self.completed as f32 / self.slots.len() as f32
    }

    /// Pending -> terminal, once. Returns false for unknown or settled slots.
    fn settle(&mut self, locator: &Locator, outcome: SlotStatus) -> bool {
        debug_assert!(outcome.is_terminal());
        match self.slots.get_mut(locator) {
            Some(slot @ SlotStatus::Pending) => {
                *slot = outcome;
                self.completed += 1;
                true
            }
            _ => false,
        }
    }
}

/// Identifies one preload cycle. Cancelling it silences its workers.
#[derive(Debug, Clone)]
pub struct PreloadHandle {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl PreloadHandle {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

struct Completion<A> {
    generation: u64,
    locator: Locator,
    result: Result<A, FetchError>,
}

/// Loaded assets kept across cycles, oldest evicted first.
struct AssetCache<A> {
    capacity: usize,
    entries: IndexMap<Locator, Arc<A>>,
}

impl<A> AssetCache<A> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    fn get(&self, locator: &Locator) -> Option<Arc<A>> {
        self.entries.get(locator).cloned()
    }

    fn insert(&mut self, locator: Locator, asset: Arc<A>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.shift_remove(&locator);
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(locator, asset);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct ActivePreload<A> {
    handle: PreloadHandle,
    state: PreloadState,
    assets: HashMap<Locator, Arc<A>>,
    deadline: Instant,
    rx: Receiver<Completion<A>>,
}

pub struct PreloadManager<F: Fetch> {
    fetcher: Arc<F>,
    timeout: Duration,
    next_generation: u64,
    active: Option<ActivePreload<F::Asset>>,
    cache: AssetCache<F::Asset>,
}

impl<F: Fetch> PreloadManager<F> {
    pub fn new(fetcher: F, timeout: Duration, cache_capacity: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            timeout,
            next_generation: 1,
            active: None,
            cache: AssetCache::new(cache_capacity),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> Option<&PreloadState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn handle(&self) -> Option<&PreloadHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_some_and(PreloadState::is_ready)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Loaded asset for a slot of the current cycle.
    pub fn asset(&self, locator: &Locator) -> Option<Arc<F::Asset>> {
        self.active
            .as_ref()
            .and_then(|a| a.assets.get(locator).cloned())
    }

    /// Supersedes any running cycle and fetches every slot of `sequence`.
    pub fn start(&mut self, sequence: &AssetSequence, now: Instant) -> PreloadHandle {
        if let Some(prev) = self.active.take() {
            debug!("superseding preload generation {}", prev.handle.generation);
            prev.handle.cancel();
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let handle = PreloadHandle::new(generation);
        let (tx, rx) = channel();
        let mut active = ActivePreload {
            handle: handle.clone(),
            state: PreloadState::new(generation, sequence),
            assets: HashMap::new(),
            deadline: now + self.timeout,
            rx,
        };

        let mut spawned = 0;
        for (index, locator) in sequence.iter().enumerate() {
            if let Some(asset) = self.cache.get(locator) {
                active.state.settle(locator, SlotStatus::Loaded);
                active.assets.insert(locator.clone(), asset);
                continue;
            }
            if let Err(e) = self.spawn_fetch(&handle, index, locator.clone(), tx.clone()) {
                warn!("could not start fetch for {locator}: {e}");
                active
                    .state
                    .settle(locator, SlotStatus::Failed(AssetError::LoadFailure(e.to_string())));
            } else {
                spawned += 1;
            }
        }

        info!(
            "preload generation {generation}: {} slots, {} cached, {spawned} fetching",
            sequence.len(),
            sequence.len() - spawned
        );
        self.active = Some(active);
        handle
    }

    fn spawn_fetch(
        &self,
        handle: &PreloadHandle,
        index: usize,
        locator: Locator,
        tx: Sender<Completion<F::Asset>>,
    ) -> std::io::Result<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let cancelled = Arc::clone(&handle.cancelled);
        let generation = handle.generation;
        let timeout = self.timeout;
        thread::Builder::new()
            .name(format!("preload-{generation}-{index}"))
            .spawn(move || {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                let result = fetcher.fetch(&locator, timeout);
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                // Receiver is gone once the cycle is superseded.
                let _ = tx.send(Completion {
                    generation,
                    locator,
                    result,
                });
            })
            .map(|_| ())
    }

    /// Drains finished fetches and expires slots past the deadline. Returns
    /// true when any slot changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        let mut changed = false;
        loop {
            match active.rx.try_recv() {
                Ok(done) => {
                    changed |= Self::apply(active, &mut self.cache, done);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if now >= active.deadline && !active.state.is_ready() {
            let pending: Vec<Locator> = active
                .state
                .slots()
                .filter(|(_, s)| **s == SlotStatus::Pending)
                .map(|(l, _)| l.clone())
                .collect();
            for locator in pending {
                warn!("asset timed out after {:?}: {locator}", self.timeout);
                active
                    .state
                    .settle(&locator, SlotStatus::Failed(AssetError::Timeout(self.timeout)));
                changed = true;
            }
        }

        if changed && active.state.is_ready() {
            info!(
                "preload generation {} ready: {} loaded, {} failed",
                active.handle.generation,
                active.state.loaded_count(),
                active.state.failed_count()
            );
        }
        changed
    }

    fn apply(
        active: &mut ActivePreload<F::Asset>,
        cache: &mut AssetCache<F::Asset>,
        done: Completion<F::Asset>,
    ) -> bool {
        if done.generation != active.handle.generation {
            debug!(
                "dropping completion from stale generation {} for {}",
                done.generation, done.locator
            );
            return false;
        }
        match done.result {
            Ok(asset) => {
                if !active.state.settle(&done.locator, SlotStatus::Loaded) {
                    debug!("late completion ignored for {}", done.locator);
                    return false;
                }
                let asset = Arc::new(asset);
                cache.insert(done.locator.clone(), Arc::clone(&asset));
                active.assets.insert(done.locator, asset);
                true
            }
            Err(e) => {
                let settled = active.state.settle(
                    &done.locator,
                    SlotStatus::Failed(AssetError::LoadFailure(e.to_string())),
                );
                if settled {
                    warn!("asset failed: {}: {e}", done.locator);
                }
                settled
            }
        }
    }

    /// Stops a cycle. Cancelling a stale handle only raises its flag.
    pub fn cancel(&mut self, handle: &PreloadHandle) {
        handle.cancel();
        if self
            .active
            .as_ref()
            .is_some_and(|a| a.handle.generation == handle.generation)
        {
            info!("preload generation {} cancelled", handle.generation);
            self.active = None;
        }
    }

    /// Cancels whatever is running. Cached assets survive.
    pub fn dispose(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.cancel();
        }
    }
}

impl<F: Fetch> Drop for PreloadManager<F> {
    fn drop(&mut self) {
        self.dispose();
    }
}
