//! Desktop environment introspection
//!
//! Produces the locale, display and user-agent values a desktop application
//! reports with its beacons. Detection never fails: missing information is
//! replaced by fixed fallbacks.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AnalyticsConfig;

/// Reported when no display can be detected
pub const FALLBACK_RESOLUTION: &str = "1024x768";
pub const FALLBACK_COLOR_DEPTH: &str = "32";
pub const FALLBACK_LANGUAGE: &str = "en-US";
pub const FALLBACK_ENCODING: &str = "UTF-8";

/// Bit depth assumed for displays that do not report one
const DEFAULT_BIT_DEPTH: u32 = 32;

/// Mode of one attached display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
}

/// Source of attached display modes
pub trait DisplayProbe {
    fn displays(&self) -> Vec<DisplayMode>;
}

/// Probe for environments without any display
pub struct Headless;

impl DisplayProbe for Headless {
    fn displays(&self) -> Vec<DisplayMode> {
        Vec::new()
    }
}

/// Connected DRM connectors under `/sys/class/drm`.
///
/// Reports nothing on systems without that directory.
pub struct SystemDisplays {
    root: PathBuf,
}

impl SystemDisplays {
    pub fn new() -> Self {
        Self::with_root("/sys/class/drm")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_connector(path: &Path) -> Option<DisplayMode> {
        let status = fs::read_to_string(path.join("status")).ok()?;
        if status.trim() != "connected" {
            return None;
        }

        // The first listed mode is the preferred one
        let modes = fs::read_to_string(path.join("modes")).ok()?;
        let (width, height) = modes.lines().next()?.trim().split_once('x')?;

        Some(DisplayMode {
            width: width.parse().ok()?,
            height: height.trim_end_matches(|c: char| !c.is_ascii_digit()).parse().ok()?,
            bit_depth: DEFAULT_BIT_DEPTH,
        })
    }
}

impl Default for SystemDisplays {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayProbe for SystemDisplays {
    fn displays(&self) -> Vec<DisplayMode> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut connectors: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.join("status").exists())
            .collect();
        connectors.sort();

        connectors
            .iter()
            .filter_map(|path| Self::read_connector(path))
            .collect()
    }
}

/// Values detected from the running desktop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopProfile {
    pub encoding: String,
    /// `language-REGION`
    pub user_language: String,
    /// Aggregate `WIDTHxHEIGHT` over all displays
    pub screen_resolution: String,
    /// Comma-joined bit depth of each display
    pub color_depth: String,
    pub user_agent: String,
}

impl DesktopProfile {
    /// Detect the profile of the current system
    pub fn detect() -> Self {
        Self::detect_with(&SystemDisplays::new())
    }

    pub fn detect_with(probe: &dyn DisplayProbe) -> Self {
        let locale = locale_from_env();
        let (language, encoding) = locale.as_deref().map(parse_locale).unwrap_or((None, None));
        let (screen_resolution, color_depth) = summarize_displays(&probe.displays());

        Self {
            encoding: encoding.unwrap_or_else(|| FALLBACK_ENCODING.to_string()),
            user_language: language.unwrap_or_else(|| FALLBACK_LANGUAGE.to_string()),
            screen_resolution,
            color_depth,
            user_agent: default_user_agent(),
        }
    }

    /// Copy the detected values into `config`, keeping an explicit user agent
    pub fn apply_to(&self, config: &mut AnalyticsConfig) {
        config.encoding = Some(self.encoding.clone());
        config.user_language = Some(self.user_language.clone());
        config.screen_resolution = Some(self.screen_resolution.clone());
        config.color_depth = Some(self.color_depth.clone());
        if config.user_agent.is_none() {
            config.user_agent = Some(self.user_agent.clone());
        }
    }
}

/// Populate language, encoding, screen metrics and user agent from the system
pub fn populate_from_system(config: &mut AnalyticsConfig) {
    let profile = DesktopProfile::detect();
    tracing::debug!(
        language = %profile.user_language,
        resolution = %profile.screen_resolution,
        depth = %profile.color_depth,
        "detected desktop profile"
    );
    profile.apply_to(config);
}

fn summarize_displays(displays: &[DisplayMode]) -> (String, String) {
    let width = displays
        .iter()
        .fold(0u32, |acc, d| acc.saturating_add(d.width));
    let height = displays
        .iter()
        .fold(0u32, |acc, d| acc.saturating_add(d.height));

    if displays.is_empty() || width == 0 || height == 0 {
        return (
            FALLBACK_RESOLUTION.to_string(),
            FALLBACK_COLOR_DEPTH.to_string(),
        );
    }

    let depth = displays
        .iter()
        .map(|d| d.bit_depth.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    (format!("{width}x{height}"), depth)
}

fn locale_from_env() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Split a POSIX locale such as `en_US.UTF-8@euro` into
/// (`language-REGION`, encoding)
fn parse_locale(locale: &str) -> (Option<String>, Option<String>) {
    let locale = locale.split('@').next().unwrap_or_default().trim();
    if locale.is_empty() || locale == "C" || locale == "POSIX" {
        return (None, None);
    }

    let (name, encoding) = match locale.split_once('.') {
        Some((name, encoding)) => (name, Some(normalize_encoding(encoding))),
        None => (locale, None),
    };

    let language = match name.split_once('_') {
        Some((lang, region)) => format!("{}-{}", lang.to_lowercase(), region.to_uppercase()),
        None => name.to_lowercase(),
    };

    (Some(language), encoding)
}

fn normalize_encoding(encoding: &str) -> String {
    if encoding.eq_ignore_ascii_case("utf8") || encoding.eq_ignore_ascii_case("utf-8") {
        FALLBACK_ENCODING.to_string()
    } else {
        encoding.to_string()
    }
}

fn default_user_agent() -> String {
    let os = sysinfo::System::name().unwrap_or_else(|| env::consts::OS.to_string());
    let version = sysinfo::System::os_version().unwrap_or_default();

    format!(
        "{}/{} ({} {}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        os,
        version,
        env::consts::ARCH
    )
}
