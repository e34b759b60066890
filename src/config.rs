use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::Deserialize;
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::device;
use crate::geometry::TrackGeometry;

pub const SUCCESS_URL_ENV: &str = "PUBLIC_SUCCESS_URL";
pub const FAILURE_URL_ENV: &str = "PUBLIC_FAIL_URL";
const FALLBACK_URL: &str = "/";

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timing {
    pub success_redirect_ms: u64,
    pub failure_display_ms: u64,
    pub failure_redirect_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            success_redirect_ms: 800,
            failure_display_ms: 1500,
            failure_redirect_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub origin_x: f64,
    pub width: f64,
    pub handle_width: f64,
}

impl Track {
    pub fn geometry(&self) -> TrackGeometry {
        TrackGeometry::new(self.origin_x, self.width, self.handle_width)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Outcome {
    pub success_url: Option<String>,
    pub failure_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    #[default]
    Print,
    Open,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Redirect {
    #[serde(default)]
    pub mode: RedirectMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub timing: Timing,
    pub track: Track,
    #[serde(default)]
    pub outcome: Outcome,
    #[serde(default)]
    pub redirect: Redirect,
}

/// Destinations handed to the session; never parsed or validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeUrls {
    pub success: String,
    pub failure: String,
}

impl OutcomeUrls {
    pub fn from_env(outcome: &Outcome) -> Self {
        Self::resolve(outcome, |k| env::var(k).ok())
    }

    /// Environment beats profile, profile beats "/". Empty values count as unset.
    pub fn resolve(outcome: &Outcome, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, configured: &Option<String>| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .or_else(|| configured.clone().filter(|v| !v.is_empty()))
                .unwrap_or_else(|| FALLBACK_URL.to_string())
        };
        Self {
            success: pick(SUCCESS_URL_ENV, &outcome.success_url),
            failure: pick(FAILURE_URL_ENV, &outcome.failure_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot resolve home directory"))?;
    Ok(dirs.home_dir().join(".config").join("dragverify"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn outcome_urls(&self) -> OutcomeUrls {
        OutcomeUrls::from_env(&self.profile.outcome)
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let urls = self.outcome_urls();
        let devices: Vec<String> = device::discover_multitouch()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "track_degenerate": self.profile.track.geometry().is_degenerate(),
            "outcome_urls": { "success": urls.success, "failure": urls.failure },
            "devices": devices,
            "input_group_member": check_in_input_group(),
            "hints": {
                "env_override": format!("{SUCCESS_URL_ENV} / {FAILURE_URL_ENV}"),
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    parse_profile(&txt).map_err(|e| anyhow!("{}: {e}", path.display()))
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt).map_err(|e| anyhow!("failed to parse: {e}"))?;
    validate_profile(&profile)?;
    Ok(profile)
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let t = &p.timing;
    if t.success_redirect_ms == 0 || t.failure_display_ms == 0 || t.failure_redirect_ms == 0 {
        return Err(anyhow!("timing values must be positive durations"));
    }
    let tr = &p.track;
    for (name, v) in [
        ("track.origin_x", tr.origin_x),
        ("track.width", tr.width),
        ("track.handle_width", tr.handle_width),
    ] {
        if !v.is_finite() {
            return Err(anyhow!("{name} must be a finite number"));
        }
    }
    if tr.width < 0.0 || tr.handle_width < 0.0 {
        return Err(anyhow!("track.width and track.handle_width must not be negative"));
    }
    if tr.geometry().is_degenerate() {
        warn!(
            "track width {} leaves no travel for handle {}; every drag will fail",
            tr.width, tr.handle_width
        );
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
