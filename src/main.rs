#![forbid(unsafe_code)]

mod edid;
mod hooks;
mod layouts;
mod model;
mod parse;
mod profiles;
mod reconcile;
mod sequence;
mod settings;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{Level as TraceLevel, debug, info};
use tracing_subscriber::FmtSubscriber;

use crate::hooks::Hook;
use crate::layouts::Layout;
use crate::model::Configuration;
use crate::profiles::Profile;
use crate::sequence::{DryRunInvoker, ProcessInvoker};

fn layout_help() -> String {
    let mut help = String::from("Virtual layouts (usable anywhere a profile name is expected):\n");
    for layout in Layout::ALL {
        help.push_str(&format!("  {:<20} {}\n", layout.name(), layout.description()));
    }
    help
}

#[derive(Parser, Debug)]
#[command(
    name = "relayout",
    version,
    about = "Automatically select and apply saved display layouts",
    after_help = layout_help()
)]
struct Cli {
    /// Profile to load (shorthand for --load)
    profile: Option<String>,

    /// Automatically load the first detected profile
    #[arg(short = 'c', long)]
    change: bool,

    /// Load a profile or virtual layout
    #[arg(short = 'l', long, value_name = "PROFILE")]
    load: Option<String>,

    /// Save the current layout as a profile
    #[arg(short = 's', long, value_name = "PROFILE")]
    save: Option<String>,

    /// Remove a saved profile
    #[arg(short = 'r', long, value_name = "PROFILE")]
    remove: Option<String>,

    /// Profile to use with --change when nothing is detected
    #[arg(short = 'd', long, value_name = "PROFILE")]
    default: Option<String>,

    /// Apply or remove even when it looks unnecessary
    #[arg(short = 'f', long)]
    force: bool,

    /// Print the current monitor fingerprints and exit
    #[arg(long)]
    fingerprint: bool,

    /// Print the current layout in config-file form and exit
    #[arg(long)]
    config: bool,

    /// Print the invocations instead of running them
    #[arg(long)]
    dry_run: bool,

    /// List only the profile matching the current layout
    #[arg(long, conflicts_with = "detected")]
    current: bool,

    /// List only profiles matching the connected monitors
    #[arg(long)]
    detected: bool,

    /// Comma-separated option names to ignore everywhere
    #[arg(long, value_name = "OPTIONS", value_delimiter = ',')]
    skip_options: Vec<String>,

    /// Verbose output, including a dry-run of every invocation
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug {
        TraceLevel::DEBUG
    } else {
        match std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "warn".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => TraceLevel::TRACE,
            "debug" => TraceLevel::DEBUG,
            "info" => TraceLevel::INFO,
            "error" => TraceLevel::ERROR,
            _ => TraceLevel::WARN,
        }
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn switch_metadata(
    profile: &str,
    folder: &std::path::Path,
    config: &Configuration,
) -> Vec<(&'static str, String)> {
    vec![
        ("CURRENT_PROFILE", profile.to_string()),
        ("PROFILE_FOLDER", folder.display().to_string()),
        ("MONITORS", config.enabled_outputs().join(":")),
    ]
}

fn print_differences(current: &Configuration, target: &Configuration, skip: &[String]) {
    let lines = reconcile::differences(current, target, skip);
    if !lines.is_empty() {
        println!("Differences between the two layouts:");
        for line in lines {
            println!("  {line}");
        }
    }
}

/// Print the profile list with `(detected)`/`(current)`/`(blocked)` marks.
/// Returns the first detected unblocked profile for `--change`.
fn list_profiles(
    cli: &Cli,
    stored: &[Profile],
    detected: &[(&Profile, edid::Closeness)],
    current_config: &Configuration,
    skip: &[String],
) -> Option<String> {
    let current_profiles: Vec<&str> = stored
        .iter()
        .filter(|p| reconcile::is_equal_configuration(current_config, &p.config, skip))
        .map(|p| p.name.as_str())
        .collect();
    let block_metadata = vec![
        (
            "CURRENT_PROFILE",
            current_profiles.first().copied().unwrap_or("").to_string(),
        ),
        ("CURRENT_PROFILES", current_profiles.join(":")),
    ];

    let mut chosen = None;
    for profile in stored {
        if hooks::profile_blocked(&profile.path, &block_metadata) {
            if !cli.current && !cli.detected {
                println!("{} (blocked)", profile.name);
            }
            continue;
        }
        let is_detected = detected.iter().any(|(p, _)| p.name == profile.name);
        let is_current = current_profiles.contains(&profile.name.as_str());
        if cli.detected && !is_detected {
            continue;
        }
        if cli.current && !is_current {
            continue;
        }
        if is_detected && cli.change && chosen.is_none() {
            chosen = Some(profile.name.clone());
        }

        if cli.current || cli.detected {
            println!("{}", profile.name);
        } else {
            let mut props = Vec::new();
            if is_detected {
                props.push("(detected)");
            }
            if is_current {
                props.push("(current)");
            }
            if props.is_empty() {
                println!("{}", profile.name);
            } else {
                println!("{} {}", profile.name, props.join(" "));
            }
        }
        if cli.debug && is_detected && !is_current {
            print_differences(current_config, &profile.config, skip);
        }
    }
    chosen
}

fn run(cli: Cli) -> Result<()> {
    let settings = settings::Settings::load()?;
    let skip = settings::normalize_skip_options(if cli.skip_options.is_empty() {
        &settings.skip_options
    } else {
        &cli.skip_options
    });

    let stored = profiles::discover_profiles().context("failed to load profiles")?;
    info!(profiles = stored.len(), "profile store loaded");

    hooks::run(Hook::Predetect, None, &[])?;
    let version = parse::probe_version();
    let (current_config, modes) = parse::current_state()?;
    debug!(outputs = current_config.len(), %version, "current state parsed");

    if cli.fingerprint {
        print!("{}", profiles::render_setup(&current_config));
        return Ok(());
    }
    if cli.config {
        print!("{}", profiles::render_config(&current_config, &skip));
        return Ok(());
    }

    if let Some(name) = &cli.save {
        let folder = profiles::save_profile(
            &profiles::user_profile_dir()?,
            name,
            &current_config,
            &skip,
        )
        .with_context(|| format!("failed to save profile `{name}`"))?;
        hooks::run(
            Hook::Postsave,
            Some(&folder),
            &switch_metadata(name, &folder, &current_config),
        )?;
        println!("Saved current configuration as profile '{name}'");
        return Ok(());
    }

    if let Some(name) = &cli.remove {
        profiles::remove_profile(&profiles::user_profile_dir()?, name, cli.force)
            .with_context(|| format!("failed to remove profile `{name}`"))?;
        println!("Removed profile '{name}'");
        return Ok(());
    }

    let detected = profiles::find_profiles(&current_config, &stored);

    let mut load_profile = cli.load.clone().or_else(|| cli.profile.clone());
    if load_profile.is_none() {
        let chosen = list_profiles(&cli, &stored, &detected, &current_config, &skip);
        if cli.change {
            load_profile = chosen;
        }
    }
    if load_profile.is_none() && cli.change {
        load_profile = cli.default.clone().or_else(|| settings.default_profile.clone());
    }
    let Some(name) = load_profile else {
        return Ok(());
    };

    let (mut target, scripts_path) = if let Ok(layout) = name.parse::<Layout>() {
        let target = layouts::generate(&current_config, &modes, layout);
        (target, profiles::user_profile_dir()?.join(&name))
    } else {
        let profile = stored
            .iter()
            .find(|p| p.name == name)
            .with_context(|| format!("failed to load profile `{name}`: profile not found"))?;
        // A detected profile that is not the freshest match gets its mtime
        // bumped so it wins the next ambiguous detection
        let top_detected = detected.first().map(|(p, _)| p.name.as_str());
        if detected.iter().any(|(p, _)| p.name == name) && top_detected != Some(name.as_str()) {
            profiles::touch_config(profile)?;
        }
        (profile.config.clone(), profile.path.clone())
    };

    reconcile::add_unused_outputs(&current_config, &mut target);
    if reconcile::is_equal_configuration(&current_config, &target, &skip) && !cli.force {
        eprintln!("Config already loaded");
        return Ok(());
    }
    if cli.debug {
        println!("Loading profile '{name}'");
        print_differences(&current_config, &target, &skip);
    }
    reconcile::remove_irrelevant_outputs(&current_config, &mut target);

    let metadata = switch_metadata(&name, &scripts_path, &target);
    if cli.dry_run {
        let mut invoker = DryRunInvoker;
        sequence::apply_configuration(&target, &current_config, version, &skip, &mut invoker)
            .with_context(|| format!("failed to apply profile `{name}`"))?;
        return Ok(());
    }

    hooks::run(Hook::Preswitch, Some(&scripts_path), &metadata)?;
    if cli.debug {
        println!("Going to run:");
        let mut invoker = DryRunInvoker;
        sequence::apply_configuration(&target, &current_config, version, &skip, &mut invoker)?;
    }
    let mut invoker = ProcessInvoker;
    sequence::apply_configuration(&target, &current_config, version, &skip, &mut invoker)
        .with_context(|| format!("failed to apply profile `{name}`"))?;
    hooks::run(Hook::Postswitch, Some(&scripts_path), &metadata)?;

    if cli.debug {
        let (new_config, _) = parse::current_state()?;
        if !reconcile::is_equal_configuration(&new_config, &target, &skip) {
            println!("The configuration change did not go as expected:");
            print_differences(&new_config, &target, &skip);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;
    if cli.current && cli.change {
        bail!("--current cannot be combined with --change");
    }
    run(cli)
}
