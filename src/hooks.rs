//! Lifecycle hook scripts
//!
//! Users can drop executables named `predetect`, `preswitch`, `postswitch`,
//! `postsave` or `block` (or directories `<name>.d` of them) into a profile
//! directory, the user config directory or any `XDG_CONFIG_DIRS` entry.
//! Metadata about the switch is passed in `RELAYOUT_*` environment
//! variables. Per the XDG spec, only the first script of a given name across
//! the candidate directories runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::profiles;

const ENV_PREFIX: &str = "RELAYOUT_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Predetect,
    Preswitch,
    Postswitch,
    Postsave,
    Block,
}

impl Hook {
    fn script_name(self) -> &'static str {
        match self {
            Hook::Predetect => "predetect",
            Hook::Preswitch => "preswitch",
            Hook::Postswitch => "postswitch",
            Hook::Postsave => "postsave",
            Hook::Block => "block",
        }
    }
}

fn candidate_directories(profile_path: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(user) = dirs::config_dir() {
        dirs.push(user.join(profiles::PROFILE_DIR_NAME));
    }
    let system = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_string());
    for dir in system.split(':').filter(|dir| !dir.is_empty()) {
        dirs.push(PathBuf::from(dir).join(profiles::PROFILE_DIR_NAME));
    }
    if let Some(path) = profile_path {
        dirs.push(path.to_path_buf());
    }
    dirs
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn run_script(script: &Path, metadata: &[(&str, String)]) -> Result<bool> {
    debug!(script = %script.display(), "running hook script");
    let mut command = Command::new(script);
    for (key, value) in metadata {
        command.env(format!("{ENV_PREFIX}{key}"), value);
    }
    let status = command
        .status()
        .with_context(|| format!("failed to execute hook script {}", script.display()))?;
    if !status.success() {
        warn!(script = %script.display(), ?status, "hook script failed");
    }
    Ok(status.success())
}

/// Run the hook's scripts across all candidate directories, returning the
/// success of each executed script in order
pub fn run(
    hook: Hook,
    profile_path: Option<&Path>,
    metadata: &[(&str, String)],
) -> Result<Vec<bool>> {
    let name = hook.script_name();
    let mut results = Vec::new();
    let mut ran: HashSet<String> = HashSet::new();

    for folder in candidate_directories(profile_path) {
        if !ran.contains(name) {
            let script = folder.join(name);
            if is_executable(&script) {
                results.push(run_script(&script, metadata)?);
                ran.insert(name.to_string());
            }
        }

        let script_dir = folder.join(format!("{name}.d"));
        if script_dir.is_dir()
            && let Ok(entries) = fs::read_dir(&script_dir)
        {
            for entry in entries.filter_map(|entry| entry.ok()) {
                let key = format!("d/{}", entry.file_name().to_string_lossy());
                if ran.contains(&key) {
                    continue;
                }
                let script = entry.path();
                if is_executable(&script) {
                    results.push(run_script(&script, metadata)?);
                    ran.insert(key);
                }
            }
        }
    }
    Ok(results)
}

/// Whether a profile's block hook vetoes switching to it: any block script
/// exiting zero blocks the profile
pub fn profile_blocked(profile_path: &Path, metadata: &[(&str, String)]) -> bool {
    match run(Hook::Block, Some(profile_path), metadata) {
        Ok(results) => results.into_iter().any(|succeeded| succeeded),
        Err(error) => {
            warn!(%error, "block hook could not be evaluated, not blocking");
            false
        }
    }
}
