use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "tzpick";

const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_RESULT_LIMIT: usize = 10;
const DEFAULT_AVATAR_DEBOUNCE_MS: u64 = 800;
const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// File the configuration was read from; `None` when running on defaults
    pub config_path: Option<PathBuf>,
    pub search: SearchConfig,
    pub avatar: AvatarConfig,
    pub geocoding: GeocodingConfig,
    /// Extra `ABBR = "Area/City"` entries layered over the built-in table
    pub abbreviations: HashMap<String, String>,
    pub keys: Keys,
}

// =============================================================================
// Search / avatar / geocoding
// =============================================================================

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub debounce_ms: u64,
    /// Overrides the platform cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_AVATAR_DEBOUNCE_MS,
            cache_dir: None,
        }
    }
}

impl AvatarConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODING_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Key Bindings
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Keys {
    /// Keys for the interactive time zone picker
    pub picker: PickerKeys,
}

#[derive(Debug, Clone)]
pub struct PickerKeys {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl Default for PickerKeys {
    fn default() -> Self {
        PickerKeysFile::default().into()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    picker: PickerKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PickerKeysFile {
    up: KeyBinding,
    down: KeyBinding,
    confirm: KeyBinding,
    cancel: KeyBinding,
}

impl Default for PickerKeysFile {
    fn default() -> Self {
        Self {
            up: KeyBinding::Multiple(vec!["Up".into(), "Backtab".into()]),
            down: KeyBinding::Multiple(vec!["Down".into(), "Tab".into()]),
            confirm: KeyBinding::Single("Enter".into()),
            cancel: KeyBinding::Single("Escape".into()),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            picker: file.picker.into(),
        }
    }
}

impl From<PickerKeysFile> for PickerKeys {
    fn from(file: PickerKeysFile) -> Self {
        Self {
            up: file.up.into_vec(),
            down: file.down.into_vec(),
            confirm: file.confirm.into_vec(),
            cancel: file.cancel.into_vec(),
        }
    }
}

/// Canonical form for collision detection. Single characters keep their
/// case ('M' is Shift+m); key names are case-insensitive, and the usual
/// aliases collapse to one name.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        return trimmed.to_string();
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "esc" => "escape".to_string(),
        "shift+tab" => "backtab".to_string(),
        "page_up" => "pageup".to_string(),
        "page_down" => "pagedown".to_string(),
        other => other.to_string(),
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    let picker = &keys.picker;
    for (action, bindings) in [
        ("confirm", &picker.confirm),
        ("cancel", &picker.cancel),
    ] {
        if bindings.iter().all(|b| b.trim().is_empty()) {
            bail!("[keys.picker] `{}` needs at least one key", action);
        }
    }

    check_context_collisions(
        &[
            ("up", &picker.up),
            ("down", &picker.down),
            ("confirm", &picker.confirm),
            ("cancel", &picker.cancel),
        ],
        "picker",
    )
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    search: SearchFile,
    avatar: AvatarFile,
    geocoding: GeocodingFile,
    abbreviations: HashMap<String, String>,
    keys: KeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchFile {
    debounce_ms: u64,
    result_limit: usize,
}

impl Default for SearchFile {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        Self {
            debounce_ms: defaults.debounce_ms,
            result_limit: defaults.result_limit,
        }
    }
}

impl From<SearchFile> for SearchConfig {
    fn from(file: SearchFile) -> Self {
        Self {
            debounce_ms: file.debounce_ms,
            result_limit: file.result_limit,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AvatarFile {
    debounce_ms: u64,
    cache_dir: Option<PathBuf>,
}

impl Default for AvatarFile {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_AVATAR_DEBOUNCE_MS,
            cache_dir: None,
        }
    }
}

impl From<AvatarFile> for AvatarConfig {
    fn from(file: AvatarFile) -> Self {
        Self {
            debounce_ms: file.debounce_ms,
            cache_dir: file
                .cache_dir
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(|dir| expand_tilde(&dir)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeocodingFile {
    base_url: String,
    language: String,
    timeout_secs: u64,
}

impl Default for GeocodingFile {
    fn default() -> Self {
        let defaults = GeocodingConfig::default();
        Self {
            base_url: defaults.base_url,
            language: defaults.language,
            timeout_secs: defaults.timeout_secs,
        }
    }
}

impl From<GeocodingFile> for GeocodingConfig {
    fn from(file: GeocodingFile) -> Self {
        let language = file.language.trim();
        Self {
            base_url: file.base_url.trim().to_string(),
            language: if language.is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                language.to_ascii_lowercase()
            },
            timeout_secs: file.timeout_secs,
        }
    }
}

/// Written by `tzpick init`; parses to the built-in defaults.
pub const DEFAULT_CONFIG: &str = r#"# tzpick configuration

[search]
# Quiet interval before a typed query is looked up
debounce_ms = 300
result_limit = 10

[avatar]
debounce_ms = 800
# cache_dir = "~/.cache/tzpick/avatars"

[geocoding]
base_url = "https://geocoding-api.open-meteo.com"
language = "en"
timeout_secs = 10

# Extra abbreviations, merged over the built-in table
[abbreviations]
# NZST = "Pacific/Auckland"

[keys.picker]
up = ["Up", "Backtab"]
down = ["Down", "Tab"]
confirm = "Enter"
cancel = "Escape"
"#;

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Write [`DEFAULT_CONFIG`] to `path`, creating parent directories.
pub fn write_default(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "configuration file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config dir: {}", dir.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write configuration file at {}", path.display()))?;
    Ok(())
}

/// Load configuration from `explicit` or the default location.
///
/// A missing default file means built-in defaults; a missing explicit file
/// is an error.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    parse(&raw, &path)
}

/// Parse and validate configuration text read from `path`.
pub fn parse(raw: &str, path: &Path) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let search: SearchConfig = cfg_file.search.into();
    if search.result_limit == 0 {
        bail!("[search] `result_limit` must be at least 1");
    }

    let geocoding: GeocodingConfig = cfg_file.geocoding.into();
    if geocoding.base_url.is_empty() {
        bail!("[geocoding] `base_url` must not be empty");
    }
    if geocoding.timeout_secs == 0 {
        bail!("[geocoding] `timeout_secs` must be at least 1");
    }

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    Ok(Config {
        config_path: Some(path.to_path_buf()),
        search,
        avatar: cfg_file.avatar.into(),
        geocoding,
        abbreviations: cfg_file.abbreviations,
        keys,
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in_section(
        value,
        "",
        &["search", "avatar", "geocoding", "abbreviations", "keys"],
    );

    if let Some(v) = table.get("search") {
        warn_unknown_in_section(v, "search.", &["debounce_ms", "result_limit"]);
    }
    if let Some(v) = table.get("avatar") {
        warn_unknown_in_section(v, "avatar.", &["debounce_ms", "cache_dir"]);
    }
    if let Some(v) = table.get("geocoding") {
        warn_unknown_in_section(v, "geocoding.", &["base_url", "language", "timeout_secs"]);
    }
    if let Some(keys) = table.get("keys") {
        warn_unknown_in_section(keys, "keys.", &["picker"]);
        if let Some(v) = keys.get("picker") {
            warn_unknown_in_section(v, "keys.picker.", &["up", "down", "confirm", "cancel"]);
        }
    }
}

fn warn_unknown_in_section(value: &toml::Value, prefix: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            eprintln!("warning: unknown configuration key `{}{}`", prefix, key);
        }
    }
}
