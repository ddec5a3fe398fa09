// fetch.rs — resource-fetch primitive: http(s) via ureq, file:// via the filesystem

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;
use std::time::Duration;

use image::io::Reader as ImageReader;
use image::RgbaImage;
use url::Url;

use crate::error::FetchError;
use crate::resolver::Locator;

/// Largest response body accepted for a single frame.
const MAX_ASSET_BYTES: u64 = 32 * 1024 * 1024;

/// Blocking fetch of one locator. Called from preload worker threads.
pub trait Fetch: Send + Sync + 'static {
    type Asset: Send + Sync + 'static;

    fn fetch(&self, locator: &Locator, timeout: Duration) -> Result<Self::Asset, FetchError>;
}

/// Where a locator points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(String),
    File(PathBuf),
}

impl Source {
    pub fn parse(locator: &Locator) -> Result<Self, FetchError> {
        let s = locator.as_str();
        let unsupported = || FetchError::UnsupportedLocator(s.to_string());
        let url = Url::parse(s).map_err(|_| unsupported())?;
        match url.scheme() {
            "http" | "https" => Ok(Source::Http(url.into())),
            "file" => url.to_file_path().map(Source::File).map_err(|_| unsupported()),
            _ => Err(unsupported()),
        }
    }
}

/// Fetches and decodes frames into RGBA8 images.
#[derive(Clone)]
pub struct ImageFetcher {
    agent: ureq::Agent,
}

impl ImageFetcher {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("turntable-viewer/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }

    fn download(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .agent
            .get(url)
            .timeout(timeout)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => FetchError::Status(code),
                ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
            })?;

        let mut bytes = Vec::new();
        resp.into_reader()
            .take(MAX_ASSET_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl Default for ImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for ImageFetcher {
    type Asset = RgbaImage;

    fn fetch(&self, locator: &Locator, timeout: Duration) -> Result<RgbaImage, FetchError> {
        let img = match Source::parse(locator)? {
            Source::Http(url) => {
                let bytes = self.download(&url, timeout)?;
                ImageReader::new(Cursor::new(bytes))
                    .with_guessed_format()?
                    .decode()?
            }
            Source::File(path) => {
                let reader = BufReader::new(File::open(&path)?);
                ImageReader::new(reader).with_guessed_format()?.decode()?
            }
        };
        Ok(img.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AngleCodeTable, AssetResolver, LocatorTemplate};
    use crate::subject::{Finish, ViewerSubject};
    use pretty_assertions::assert_eq;

    fn locator_for(template: &str) -> Locator {
        let resolver = AssetResolver::new(
            AngleCodeTable::new(["01"]).unwrap(),
            LocatorTemplate::parse(template).unwrap(),
        );
        let subject = ViewerSubject::new("Land Rover", "Defender", "").unwrap();
        resolver
            .resolve(&subject, &Finish::default())
            .get(0)
            .unwrap()
            .clone()
    }

    fn file_template(dir: &std::path::Path, tail: &str) -> String {
        format!("{}{tail}", Url::from_directory_path(dir).unwrap())
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            Source::parse(&locator_for("https://img.example/{angle}.jpg")).unwrap(),
            Source::Http("https://img.example/01.jpg".into())
        );
        assert_eq!(
            Source::parse(&locator_for("file:///srv/{make}/{angle}.png")).unwrap(),
            Source::File(PathBuf::from("/srv/land rover/01.png"))
        );
        assert!(matches!(
            Source::parse(&locator_for("file:///srv/100%25/{angle}.png")),
            Ok(Source::File(p)) if p == PathBuf::from("/srv/100%/01.png")
        ));
    }

    #[test]
    fn loads_frame_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let frame_dir = dir.path().join("land rover");
        std::fs::create_dir_all(&frame_dir).unwrap();
        RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]))
            .save(frame_dir.join("01.png"))
            .unwrap();

        let template = file_template(dir.path(), "{make}/{angle}.png");
        let img = ImageFetcher::new()
            .fetch(&locator_for(&template), Duration::from_secs(1))
            .unwrap();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = file_template(dir.path(), "{angle}.png");
        let err = ImageFetcher::new()
            .fetch(&locator_for(&template), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }

    #[test]
    fn garbage_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01.png"), b"not an image").unwrap();
        let template = file_template(dir.path(), "{angle}.png");
        let err = ImageFetcher::new()
            .fetch(&locator_for(&template), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
