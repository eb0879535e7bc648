//! Social-media avatar import.
//!
//! A username typed for one of the supported sources is debounced, the
//! avatar is downloaded, shrunk to fit 128×128 and written to the local
//! image cache as PNG.

use std::fmt;
use std::fs;
use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use directories::BaseDirs;
use image::imageops::FilterType;
use image::GenericImageView;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::debounce::{Completion, Debouncer};

const CACHE_SUBDIR: &str = "tzpick/avatars";
const MAX_DIMENSION: u32 = 128;
const BLUESKY_PROFILE_URL: &str = "https://public.api.bsky.app/xrpc/app.bsky.actor.getProfile";
const UNAVATAR_URL: &str = "https://unavatar.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum PhotoSource {
    Bluesky,
    Telegram,
    X,
}

impl PhotoSource {
    /// Path segment used by unavatar.io.
    pub fn id(self) -> &'static str {
        match self {
            PhotoSource::Bluesky => "bluesky",
            PhotoSource::Telegram => "telegram",
            PhotoSource::X => "x",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PhotoSource::Bluesky => "Bluesky",
            PhotoSource::Telegram => "Telegram",
            PhotoSource::X => "X (Twitter)",
        }
    }
}

impl fmt::Display for PhotoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("avatar request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("avatar service answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("no avatar found for `{0}`")]
    NotFound(String),
    #[error("failed to decode avatar image: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to write avatar cache: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to determine cache directory")]
    NoCacheDir,
    #[error("avatar processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// An imported avatar on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub source: PhotoSource,
    pub username: String,
    pub path: PathBuf,
}

/// Downloads raw avatar bytes.
pub trait AvatarFetch: Send + Sync {
    fn fetch(
        &self,
        source: PhotoSource,
        username: &str,
    ) -> impl Future<Output = Result<Vec<u8>, AvatarError>> + Send;
}

#[derive(Debug, Deserialize)]
struct BlueskyProfile {
    #[serde(default)]
    avatar: Option<String>,
}

/// Bluesky avatars come from the public profile API; everything else goes
/// through unavatar.io.
pub struct HttpAvatarFetch {
    client: reqwest::Client,
}

impl HttpAvatarFetch {
    pub fn new(timeout: Duration) -> Result<Self, AvatarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tzpick/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn image_url(&self, source: PhotoSource, username: &str) -> Result<String, AvatarError> {
        match source {
            PhotoSource::Bluesky => {
                let response = self
                    .client
                    .get(BLUESKY_PROFILE_URL)
                    .query(&[("actor", username)])
                    .send()
                    .await?;
                if !response.status().is_success() {
                    return Err(AvatarError::Status(response.status()));
                }
                let profile: BlueskyProfile = response.json().await?;
                profile
                    .avatar
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| AvatarError::NotFound(username.to_string()))
            }
            PhotoSource::Telegram | PhotoSource::X => {
                Ok(format!("{UNAVATAR_URL}/{}/{username}", source.id()))
            }
        }
    }
}

impl AvatarFetch for HttpAvatarFetch {
    async fn fetch(&self, source: PhotoSource, username: &str) -> Result<Vec<u8>, AvatarError> {
        let url = self.image_url(source, username).await?;
        debug!(%source, url = %url, "fetching avatar");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AvatarError::Status(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Decode `bytes`, shrink to fit within 128×128 keeping the aspect ratio,
/// and re-encode as PNG.
pub fn normalize_avatar(bytes: &[u8]) -> Result<Vec<u8>, AvatarError> {
    let img = image::load_from_memory(bytes)?;

    let (width, height) = img.dimensions();
    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        let ratio = f64::min(
            MAX_DIMENSION as f64 / width as f64,
            MAX_DIMENSION as f64 / height as f64,
        );
        let new_w = ((width as f64 * ratio).round() as u32).max(1);
        let new_h = ((height as f64 * ratio).round() as u32).max(1);
        img.resize_exact(new_w, new_h, FilterType::Lanczos3)
    } else {
        img
    };

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}

/// Directory of cached avatar PNGs, one file per import.
#[derive(Debug, Clone)]
pub struct AvatarCache {
    dir: PathBuf,
}

impl AvatarCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_dir() -> Result<PathBuf, AvatarError> {
        let base = BaseDirs::new().ok_or(AvatarError::NoCacheDir)?;
        Ok(base.cache_dir().join(CACHE_SUBDIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `png` under a fresh UUID and return its path.
    pub fn store(&self, png: &[u8]) -> Result<PathBuf, AvatarError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", Uuid::new_v4()));
        fs::write(&path, png)?;
        Ok(path)
    }
}

/// Fetch, normalize and cache one avatar.
pub async fn import<F: AvatarFetch>(
    fetcher: &F,
    cache: &AvatarCache,
    source: PhotoSource,
    username: &str,
) -> Result<Avatar, AvatarError> {
    let username = username.trim().to_lowercase();
    let bytes = fetcher.fetch(source, &username).await?;

    let cache = cache.clone();
    let path = tokio::task::spawn_blocking(move || {
        let png = normalize_avatar(&bytes)?;
        cache.store(&png)
    })
    .await??;

    info!(%source, username = %username, path = %path.display(), "avatar imported");
    Ok(Avatar {
        source,
        username,
        path,
    })
}

/// What [`AvatarField::next`] applied.
#[derive(Debug)]
pub enum AvatarUpdate {
    Loaded,
    Failed(AvatarError),
}

type ImportOutput = Result<Avatar, AvatarError>;

/// Username input bound to an avatar: each edit restarts the debounce
/// window, and only the latest username's avatar is ever kept.
pub struct AvatarField<F> {
    fetcher: Arc<F>,
    cache: AvatarCache,
    source: PhotoSource,
    username: String,
    avatar: Option<Avatar>,
    imports: Debouncer<ImportOutput>,
    imports_rx: UnboundedReceiver<Completion<ImportOutput>>,
}

impl<F: AvatarFetch + 'static> AvatarField<F> {
    pub fn new(fetcher: Arc<F>, cache: AvatarCache, source: PhotoSource, debounce: Duration) -> Self {
        let (imports, imports_rx) = Debouncer::new(debounce);
        Self {
            fetcher,
            cache,
            source,
            username: String::new(),
            avatar: None,
            imports,
            imports_rx,
        }
    }

    pub fn source(&self) -> PhotoSource {
        self.source
    }

    pub fn avatar(&self) -> Option<&Avatar> {
        self.avatar.as_ref()
    }

    /// Update the username. An empty username clears the avatar at once.
    pub fn set_username(&mut self, username: impl Into<String>) {
        let username = username.into();
        if username == self.username {
            return;
        }
        self.username = username;
        self.schedule();
    }

    /// Wait for the pending import and apply it. Only call while an import
    /// is scheduled.
    pub async fn next(&mut self) -> Option<AvatarUpdate> {
        loop {
            let completion = self.imports_rx.recv().await?;
            let Some(outcome) = self.imports.accept(completion) else {
                continue;
            };
            return Some(match outcome {
                Ok(avatar) => {
                    self.avatar = Some(avatar);
                    AvatarUpdate::Loaded
                }
                Err(err) => {
                    warn!(source = %self.source, username = %self.username, error = %err, "avatar import failed");
                    AvatarUpdate::Failed(err)
                }
            });
        }
    }

    fn schedule(&mut self) {
        if self.username.trim().is_empty() {
            self.imports.cancel();
            self.avatar = None;
            return;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let cache = self.cache.clone();
        let source = self.source;
        let username = self.username.clone();
        self.imports.submit(async move { import(fetcher.as_ref(), &cache, source, &username).await });
    }
}
