// config.rs — JSON viewer configuration and its search order
//
// Lookup order for the config file:
// - CLI: --config <path>
// - Env: TURNTABLE_CONFIG
// - <exe_dir>/assets/viewer.json
// - ./assets/viewer.json
// - built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::controller::{ControllerSettings, DEFAULT_AUTO_ROTATE_INTERVAL, DEFAULT_DRAG_DAMPING};
use crate::error::{ConfigError, ViewerError};
use crate::preload::{DEFAULT_ASSET_TIMEOUT, DEFAULT_CACHE_CAPACITY};
use crate::resolver::{
    has_locator_scheme, AngleCodeTable, AssetResolver, LocatorTemplate, DEFAULT_ANGLE_CODES,
    DEFAULT_LOCATOR_TEMPLATE,
};
use crate::subject::{Finish, ViewerSubject};

pub const CONFIG_ENV: &str = "TURNTABLE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub locator_template: String,
    pub angle_codes: Vec<String>,
    pub auto_rotate_interval_ms: u64,
    pub asset_timeout_ms: u64,
    pub drag_damping: f32,
    pub invert_drag: bool,
    pub cache_capacity: usize,
    pub subject: Option<ViewerSubject>,
    pub finishes: Vec<Finish>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            locator_template: DEFAULT_LOCATOR_TEMPLATE.to_string(),
            angle_codes: DEFAULT_ANGLE_CODES.iter().map(|c| c.to_string()).collect(),
            auto_rotate_interval_ms: DEFAULT_AUTO_ROTATE_INTERVAL.as_millis() as u64,
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT.as_millis() as u64,
            drag_damping: DEFAULT_DRAG_DAMPING,
            invert_drag: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            subject: None,
            finishes: Vec::new(),
        }
    }
}

impl ViewerConfig {
    /// Reads a config file. A template without a scheme is a filesystem path
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: ViewerConfig = serde_json::from_str(&text)?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.locator_template = anchor_template(&config.locator_template, base);
        config.validate()?;
        info!("loaded viewer config from {}", path.display());
        Ok(config)
    }

    /// Loads the first config found in the search order, or defaults.
    pub fn discover(cli: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match find_config_file(cli) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => {
                debug!("no config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        self.resolver().map(|_| ())
    }

    pub fn resolver(&self) -> Result<AssetResolver, ViewerError> {
        let codes = AngleCodeTable::new(self.angle_codes.iter().cloned())?;
        let template = LocatorTemplate::parse(&self.locator_template)?;
        Ok(AssetResolver::new(codes, template))
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            drag_damping: if self.drag_damping > 0.0 {
                self.drag_damping
            } else {
                DEFAULT_DRAG_DAMPING
            },
            invert_drag: self.invert_drag,
            auto_rotate_interval: Duration::from_millis(self.auto_rotate_interval_ms.max(1)),
        }
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms.max(1))
    }

    /// Configured finishes, or a single default paint when none are listed.
    pub fn finishes_or_default(&self) -> Vec<Finish> {
        if self.finishes.is_empty() {
            vec![Finish::default()]
        } else {
            self.finishes.clone()
        }
    }
}

/// Path characters that need escaping in a `file://` locator.
const PATH_LITERAL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// Turns a filesystem template into a `file://` template. Directory names
/// are URL-encoded; `{placeholders}` in the tail are kept.
fn anchor_template(template: &str, base: &Path) -> String {
    let template = template.trim();
    if has_locator_scheme(template) {
        return template.to_string();
    }

    let path = Path::new(template);
    let (dir, tail) = if path.is_absolute() {
        let root = path.ancestors().last().unwrap_or(path);
        (root.to_path_buf(), path.strip_prefix(root).unwrap_or(path))
    } else {
        (absolute_dir(base), path)
    };
    let Ok(dir_url) = Url::from_directory_path(&dir) else {
        return template.to_string();
    };

    let tail = tail
        .components()
        .map(|c| encode_path_component(&c.as_os_str().to_string_lossy()))
        .collect::<Vec<_>>()
        .join("/");
    format!("{}{tail}", escape_braces(dir_url.as_str()))
}

fn absolute_dir(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(dir))
            .unwrap_or_else(|_| dir.to_path_buf())
    })
}

/// Braces outside placeholders would read as template syntax.
fn escape_braces(literal: &str) -> String {
    literal.replace('{', "{{").replace('}', "}}")
}

/// Percent-encodes one path component, leaving `{field}` placeholders and
/// the `{{`/`}}` escapes for the template parser.
fn encode_path_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while !rest.is_empty() {
        let cut = rest.find(['{', '}']).unwrap_or(rest.len());
        out.extend(utf8_percent_encode(&rest[..cut], PATH_LITERAL));
        rest = &rest[cut..];
        let keep = if rest.starts_with("{{") || rest.starts_with("}}") {
            2
        } else if rest.starts_with('{') {
            rest.find('}').map_or(rest.len(), |i| i + 1)
        } else {
            rest.len().min(1)
        };
        out.push_str(&rest[..keep]);
        rest = &rest[keep..];
    }
    out
}

fn find_config_file(cli: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = cli {
        return Some(p.to_path_buf());
    }

    if let Ok(v) = std::env::var(CONFIG_ENV) {
        if !v.trim().is_empty() {
            return Some(PathBuf::from(v));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join("viewer.json");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join("viewer.json");
    p.exists().then_some(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Fetch, ImageFetcher};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_gives_defaults() {
        let config: ViewerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
        let resolver = config.resolver().unwrap();
        assert_eq!(resolver.step_count(), 24);
        assert_eq!(config.controller_settings(), ControllerSettings::default());
        assert_eq!(config.asset_timeout(), Duration::from_secs(5));
        assert_eq!(config.finishes_or_default(), vec![Finish::default()]);
    }

    #[test]
    fn loads_subject_finishes_and_anchors_relative_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(
            &path,
            r#"{
                "locator_template": "frames/{make}/{paint_id}/{angle}.png",
                "angle_codes": ["a", "b", "c", "d"],
                "auto_rotate_interval_ms": 400,
                "subject": { "make": "Porsche", "model": "911", "variant": "Coupe" },
                "finishes": [
                    { "paint_id": "m7z", "paint_description": "Guards Red" },
                    { "paint_id": "c9a" }
                ]
            }"#,
        )
        .unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        let base = Url::from_directory_path(dir.path().canonicalize().unwrap()).unwrap();
        assert_eq!(
            config.locator_template,
            format!("{base}frames/{{make}}/{{paint_id}}/{{angle}}.png")
        );
        assert_eq!(config.subject.as_ref().unwrap().label(), "porsche 911 (coupe)");
        assert_eq!(config.finishes.len(), 2);
        assert_eq!(config.finishes[1].label(), "c9a");
        assert_eq!(
            config.controller_settings().auto_rotate_interval,
            Duration::from_millis(400)
        );
        assert_eq!(config.resolver().unwrap().step_count(), 4);
    }

    #[test]
    fn rejects_invalid_subject_and_templates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");

        std::fs::write(&path, r#"{ "subject": { "make": " ", "model": "911" } }"#).unwrap();
        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Json(_))));

        std::fs::write(&path, r#"{ "locator_template": "https://x.example/{make}.jpg" }"#).unwrap();
        assert!(matches!(
            ViewerConfig::load(&path),
            Err(ConfigError::Invalid(ViewerError::InvalidTemplate(_)))
        ));

        std::fs::write(&path, r#"{ "angle_codes": ["1", "1"] }"#).unwrap();
        assert!(matches!(
            ViewerConfig::load(&path),
            Err(ConfigError::Invalid(ViewerError::InvalidCodeTable(_)))
        ));
    }

    #[test]
    fn explicit_path_wins_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, r#"{ "cache_capacity": 0 }"#).unwrap();
        let (config, found) = ViewerConfig::discover(Some(&path)).unwrap();
        assert_eq!(found.as_deref(), Some(path.as_path()));
        assert_eq!(config.cache_capacity, 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ViewerConfig::load(&dir.path().join("nope.json")),
            Err(ConfigError::Io(_))
        ));
    }

    fn write_frame_config(dir: &Path) -> PathBuf {
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([200, 0, 0, 255]))
            .save(frames.join("01.png"))
            .unwrap();
        let path = dir.join("viewer.json");
        std::fs::write(
            &path,
            r#"{ "locator_template": "frames/{angle}.png", "angle_codes": ["01"] }"#,
        )
        .unwrap();
        path
    }

    fn first_frame(config: &ViewerConfig) -> Result<image::RgbaImage, crate::error::FetchError> {
        let subject = ViewerSubject::new("bmw", "x5", "").unwrap();
        let seq = config.resolver().unwrap().resolve(&subject, &Finish::default());
        ImageFetcher::new().fetch(seq.get(0).unwrap(), Duration::from_secs(1))
    }

    #[test]
    fn frames_load_from_directories_with_url_syntax_in_their_names() {
        let root = tempfile::tempdir().unwrap();
        for name in ["a%41b", "x{1}", "cars{2024}", "with space#"] {
            let dir = root.path().join(name);
            let path = write_frame_config(&dir);

            let config = ViewerConfig::load(&path)
                .unwrap_or_else(|e| panic!("config under {name:?} failed to load: {e}"));
            let img = first_frame(&config)
                .unwrap_or_else(|e| panic!("frame under {name:?} failed to load: {e}"));
            assert_eq!(img.get_pixel(1, 1).0, [200, 0, 0, 255], "{name}");
        }
    }

    #[test]
    fn absolute_filesystem_template_is_anchored_at_root() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().canonicalize().unwrap().join("p%20q");
        write_frame_config(&dir);
        let template = format!("{}/frames/{{angle}}.png", dir.display());
        let config = ViewerConfig {
            locator_template: anchor_template(&template, Path::new("/elsewhere")),
            angle_codes: vec!["01".into()],
            ..ViewerConfig::default()
        };
        assert!(first_frame(&config).is_ok());
    }
}
