//! On-disk profile store
//!
//! A profile is a directory holding two plain-text files: `config` with one
//! `output <name>` block per output, and `setup` mapping output names to the
//! identity payloads that were present when the profile was saved. Profiles
//! live under the user's config directory and any `XDG_CONFIG_DIRS` entry,
//! with the user's copy taking precedence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::edid::{self, Closeness};
use crate::layouts::Layout;
use crate::model::{Configuration, OptionKey, OptionSet, Output};

pub const PROFILE_DIR_NAME: &str = "relayout";
const CONFIG_FILE: &str = "config";
const SETUP_FILE: &str = "setup";

/// Legacy sysfs-style output names carry a card prefix and dashes
static FUZZY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(card[0-9]+|-)").unwrap());

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(
        "no identity for output `{output}` in setup file, required because \
         `{output}` is not off in the config file"
    )]
    MissingIdentity { output: String },
    #[error("output `{output}` uses unrecognized option `{option}`")]
    UnknownOption { output: String, option: String },
    #[error("config file contains content before the first output block: `{0}`")]
    StrayContent(String),
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub config: Configuration,
    pub path: PathBuf,
    pub last_modified: SystemTime,
}

/// Whether a name collides with one of the built-in virtual layouts
pub fn is_reserved_name(name: &str) -> bool {
    name.parse::<Layout>().is_ok()
}

fn fuzzy_name(name: &str) -> String {
    FUZZY_NAME_RE.replace_all(name, "").into_owned()
}

/// Parse a setup file into `(output, identity)` pairs
pub fn parse_setup(text: &str) -> Vec<(String, String)> {
    let mut identities = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, identity)) = line.split_once(char::is_whitespace) {
            identities.push((name.to_string(), identity.trim().to_string()));
        }
    }
    identities
}

fn resolve_identity(name: &str, identities: &[(String, String)]) -> Option<String> {
    if let Some((_, identity)) = identities.iter().find(|(n, _)| n == name) {
        return Some(identity.clone());
    }
    let wanted = fuzzy_name(name);
    identities
        .iter()
        .find(|(n, _)| fuzzy_name(n) == wanted)
        .map(|(_, identity)| identity.clone())
}

fn parse_output_block(
    name: &str,
    lines: &[&str],
    identities: &[(String, String)],
) -> Result<Output, ProfileError> {
    let mut options = OptionSet::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key_name, value) = match line.split_once(char::is_whitespace) {
            Some((key, value)) => (key, Some(value.trim().to_string())),
            None => (line, None),
        };
        let key = OptionKey::parse(key_name).ok_or_else(|| ProfileError::UnknownOption {
            output: name.to_string(),
            option: key_name.to_string(),
        })?;
        options.insert(key, value);
    }

    let edid = resolve_identity(name, identities);
    if edid.is_none() && !options.contains(&OptionKey::Off) {
        return Err(ProfileError::MissingIdentity {
            output: name.to_string(),
        });
    }
    Ok(Output::new(name.to_string(), edid, options))
}

/// Parse a config file against the identities from its setup file.
///
/// Outputs that end up without an identity (off-records whose monitor is
/// gone) are dropped; they carry no usable information.
pub fn parse_config(
    text: &str,
    identities: &[(String, String)],
) -> Result<Configuration, ProfileError> {
    let mut config = Configuration::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(name) = trimmed.strip_prefix("output ") {
            if let Some((name, lines)) = current.take() {
                let output = parse_output_block(&name, &lines, identities)?;
                if output.edid.is_some() {
                    config.insert(output);
                }
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else {
            match &mut current {
                Some((_, lines)) => lines.push(trimmed),
                None => return Err(ProfileError::StrayContent(trimmed.to_string())),
            }
        }
    }
    if let Some((name, lines)) = current {
        let output = parse_output_block(&name, &lines, identities)?;
        if output.edid.is_some() {
            config.insert(output);
        }
    }
    Ok(config)
}

/// Render a config file, outputs ordered by screen position
pub fn render_config(config: &Configuration, skip: &[String]) -> String {
    let mut outputs: Vec<&Output> = config.iter().collect();
    outputs.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
    let mut text = String::new();
    for output in outputs {
        text.push_str(&output.option_string(skip));
        text.push('\n');
    }
    text
}

/// Render a setup file, identity-bearing outputs ordered by name
pub fn render_setup(config: &Configuration) -> String {
    let mut outputs: Vec<&Output> = config.iter().filter(|o| o.edid.is_some()).collect();
    outputs.sort_by(|a, b| a.name.cmp(&b.name));
    let mut text = String::new();
    for output in outputs {
        if let Some(edid) = &output.edid {
            text.push_str(&format!("{} {edid}\n", output.name));
        }
    }
    text
}

/// Load every profile directory under `base` that has both files
pub fn load_profiles(base: &Path) -> Result<Vec<Profile>> {
    let mut profiles = Vec::new();
    let entries = fs::read_dir(base)
        .with_context(|| format!("failed to list profile directory {}", base.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let config_path = path.join(CONFIG_FILE);
        let setup_path = path.join(SETUP_FILE);
        if !config_path.is_file() || !setup_path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let setup_text = fs::read_to_string(&setup_path)
            .with_context(|| format!("failed to read {}", setup_path.display()))?;
        let config_text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let identities = parse_setup(&setup_text);
        let config = parse_config(&config_text, &identities)
            .with_context(|| format!("failed to load profile `{name}`"))?;
        let last_modified = fs::metadata(&config_path)?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        debug!(profile = %name, path = %path.display(), "loaded profile");
        profiles.push(Profile {
            name,
            config,
            path,
            last_modified,
        });
    }
    Ok(profiles)
}

/// The directory new profiles are saved into
pub fn user_profile_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("could not determine the user config directory")?;
    Ok(base.join(PROFILE_DIR_NAME))
}

/// System-wide profile directories, lowest precedence first
fn system_profile_dirs() -> Vec<PathBuf> {
    let dirs = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_string());
    dirs.split(':')
        .rev()
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(dir).join(PROFILE_DIR_NAME))
        .collect()
}

/// Load profiles from every config directory; the user's own profiles
/// override system ones of the same name. Sorted by descending mtime so the
/// most recently saved profile wins ambiguous detection.
pub fn discover_profiles() -> Result<Vec<Profile>> {
    let mut merged: Vec<Profile> = Vec::new();
    let mut candidates = system_profile_dirs();
    candidates.push(user_profile_dir()?);
    for dir in candidates {
        if !dir.is_dir() {
            continue;
        }
        for profile in load_profiles(&dir)? {
            merged.retain(|existing| existing.name != profile.name);
            merged.push(profile);
        }
    }
    merged.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    Ok(merged)
}

/// Profiles whose stored fingerprints match the connected monitors, ranked
/// by descending closeness.
///
/// A profile matches when every identity-bearing stored output matches a
/// connected output of the same name and no connected monitor is missing
/// from the profile. The profile's closeness is the worst per-output score,
/// so an exact profile always outranks a wildcard one.
pub fn find_profiles<'a>(
    current: &Configuration,
    profiles: &'a [Profile],
) -> Vec<(&'a Profile, Closeness)> {
    let mut detected: Vec<(&Profile, Closeness)> = Vec::new();
    'profiles: for profile in profiles {
        let mut closeness = Closeness::EXACT;
        for stored in profile.config.iter() {
            if stored.edid.is_none() {
                continue;
            }
            let Some(live) = current.get(&stored.name) else {
                continue 'profiles;
            };
            let score = match edid::match_score(stored, live) {
                Ok(Some(score)) => score,
                Ok(None) => continue 'profiles,
                Err(error) => {
                    warn!(profile = %profile.name, %error, "skipping profile");
                    continue 'profiles;
                }
            };
            if score < closeness {
                closeness = score;
            }
        }
        let covered = current
            .iter()
            .filter(|o| o.edid.is_some())
            .all(|o| profile.config.contains(&o.name));
        if covered {
            detected.push((profile, closeness));
        }
    }
    detected.sort_by(|(_, a), (_, b)| b.score().total_cmp(&a.score()));
    detected
}

/// Save the configuration as a named profile under `base`
pub fn save_profile(
    base: &Path,
    name: &str,
    config: &Configuration,
    skip: &[String],
) -> Result<PathBuf> {
    if is_reserved_name(name) {
        bail!("`{name}` is a reserved virtual layout name");
    }
    let path = base.join(name);
    fs::create_dir_all(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    fs::write(path.join(CONFIG_FILE), render_config(config, skip))?;
    fs::write(path.join(SETUP_FILE), render_setup(config))?;
    Ok(path)
}

/// Remove a stored profile. Refuses to delete a directory that carries
/// files beyond the two the store wrote, unless forced.
pub fn remove_profile(base: &Path, name: &str, force: bool) -> Result<()> {
    if is_reserved_name(name) {
        bail!("`{name}` is a reserved virtual layout name");
    }
    let path = base.join(name);
    if !path.join(CONFIG_FILE).is_file() || !path.join(SETUP_FILE).is_file() {
        bail!("profile `{name}` does not exist");
    }
    let extra: Vec<String> = fs::read_dir(&path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|file| file != CONFIG_FILE && file != SETUP_FILE)
        .collect();
    if !extra.is_empty() && !force {
        bail!(
            "profile `{name}` contains additional files ({}); pass --force to remove it anyway",
            extra.join(", ")
        );
    }
    fs::remove_dir_all(&path)
        .with_context(|| format!("failed to remove {}", path.display()))
}

/// Bump a profile's config mtime so it wins future mtime-ordered detection
pub fn touch_config(profile: &Profile) -> Result<()> {
    let path = profile.path.join(CONFIG_FILE);
    let file = fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.set_modified(SystemTime::now())?;
    Ok(())
}
