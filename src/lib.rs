// lib.rs — 360° turntable viewer: asset resolution, preloading, orientation control
//
// Data flow:
// - configure: (subject, finish) -> resolver -> locators -> preload manager
// - interaction: pointer / timer -> controller -> index -> lookup into locators

pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod preload;
pub mod resolver;
pub mod subject;
pub mod viewer;

pub use config::ViewerConfig;
pub use controller::{ControllerSettings, InteractionMode, OrientationController};
pub use error::{AssetError, ConfigError, FetchError, ViewerError};
pub use fetch::{Fetch, ImageFetcher};
pub use lookup::{current_image, FrameSource};
pub use preload::{PreloadHandle, PreloadManager, PreloadState, SlotStatus};
pub use resolver::{AngleCodeTable, AssetResolver, AssetSequence, Locator, LocatorTemplate};
pub use subject::{Finish, ViewerSubject};
pub use viewer::TurntableViewer;
