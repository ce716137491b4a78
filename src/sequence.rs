//! Command sequencer
//!
//! Turns a target configuration into an ordered list of `xrandr` invocation
//! batches that respect the driver quirks the apply path has to work around:
//! no more than two outputs per invocation, never disable every screen in a
//! single call, clear transforms and panning before shrinking, and enable
//! the origin output first so the server does not relocate whatever comes up
//! first to `0x0`.

use std::io;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Configuration, OptionKey, Output, RandrVersion};
use crate::parse::XRANDR;
use crate::reconcile;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Attributes cleared in a dedicated pre-pass when the target drops them:
/// stored key, argument value that clears it, and the protocol default that
/// may be pruned from the main invocation when nothing needs clearing
const AUX_ATTRIBUTES: &[(OptionKey, &str, &str)] = &[
    (OptionKey::Transform, "none", "1,0,0,0,1,0,0,0,1"),
    (OptionKey::Panning, "0x0", "0x0"),
];

static PANNING_EXTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<w>[0-9]+)x(?P<h>[0-9]+)(?:\+(?P<x>[0-9]+))?(?:\+(?P<y>[0-9]+))?")
        .unwrap()
});

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to launch `{}`: {source}", argv.join(" "))]
    Launch {
        argv: Vec<String>,
        source: io::Error,
    },
    #[error("command failed twice: `{}` (exit {first}, then {second})", argv.join(" "))]
    CommandFailed {
        argv: Vec<String>,
        first: i32,
        second: i32,
    },
}

/// Abstraction over actually running an invocation, so the sequence logic
/// can be exercised without a display server and dry-run stays trivially
/// side-effect free.
pub trait Invoker {
    /// Run one argument vector, returning its exit status
    fn call(&mut self, argv: &[String]) -> io::Result<i32>;

    fn pause_before_retry(&self) {
        thread::sleep(RETRY_DELAY);
    }
}

/// Runs invocations as real subprocesses, output discarded
pub struct ProcessInvoker;

impl Invoker for ProcessInvoker {
    fn call(&mut self, argv: &[String]) -> io::Result<i32> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty argument vector")
        })?;
        let status = Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Prints each invocation instead of running it; cannot fail
pub struct DryRunInvoker;

impl Invoker for DryRunInvoker {
    fn call(&mut self, argv: &[String]) -> io::Result<i32> {
        println!("{}", argv.join(" "));
        Ok(0)
    }

    fn pause_before_retry(&self) {}
}

/// Outcome of the bulk disable invocation
#[derive(Debug)]
enum DisablePhase {
    /// Bulk disable (if any) went through; at most the reserved last
    /// disable is still pending
    Completed { held_back: Vec<Vec<String>> },
    /// The bulk disable failed once and was swallowed; every disable is
    /// still pending and will run interleaved with the enable batches,
    /// where resetting the primary output tends to unstick the driver
    PartialAccepted { pending: Vec<Vec<String>> },
}

fn run_with_retry(invoker: &mut dyn Invoker, argv: &[String]) -> Result<(), SequenceError> {
    let to_launch_error = |source| SequenceError::Launch {
        argv: argv.to_vec(),
        source,
    };
    debug!(command = %argv.join(" "), "running");
    let first = invoker.call(argv).map_err(to_launch_error)?;
    if first == 0 {
        return Ok(());
    }
    warn!(command = %argv.join(" "), status = first, "invocation failed, retrying once");
    invoker.pause_before_retry();
    let second = invoker.call(argv).map_err(to_launch_error)?;
    if second == 0 {
        return Ok(());
    }
    Err(SequenceError::CommandFailed {
        argv: argv.to_vec(),
        first,
        second,
    })
}

/// Best-effort frame-buffer bounding box over the target's enabled outputs.
///
/// None when any enabled output's mode is not a plain `WxH` (interlaced or
/// otherwise exotic mode names); the server then picks a size itself.
fn fb_dimensions(target: &Configuration) -> Option<(u64, u64)> {
    let mut width = 0f64;
    let mut height = 0f64;
    for output in target.iter() {
        if !output.is_enabled() {
            continue;
        }
        let mode = output.options.value(&OptionKey::Mode)??;
        let (w, h) = mode.split_once('x')?;
        let mut o_width: f64 = w.parse::<u32>().ok()? as f64;
        let mut o_height: f64 = h.parse::<u32>().ok()? as f64;

        if let Some(Some(transform)) = output.options.value(&OptionKey::Transform) {
            let matrix: Vec<f64> = transform
                .split(',')
                .map(|part| part.parse::<f64>().ok())
                .collect::<Option<_>>()?;
            let [a, b, c, d, e, f, g, h, i] = matrix.as_slice() else {
                return None;
            };
            let w = g * o_width + h * o_height + i;
            let x = (a * o_width + b * o_height + c) / w;
            let y = (d * o_width + e * o_height + f) / w;
            (o_width, o_height) = (x, y);
        }
        if let Some(Some(rotate)) = output.options.value(&OptionKey::Rotate)
            && matches!(rotate, "left" | "right")
        {
            (o_width, o_height) = (o_height, o_width);
        }
        if let Some((x, y)) = output.position() {
            o_width += x as f64;
            o_height += y as f64;
        }
        if let Some(Some(panning)) = output.options.value(&OptionKey::Panning)
            && let Some(caps) = PANNING_EXTENT_RE.captures(panning)
        {
            let field = |name: &str| -> Option<f64> {
                match caps.name(name) {
                    Some(m) => m.as_str().parse().ok(),
                    None => Some(0.0),
                }
            };
            o_width = field("w")? + field("x")?;
            o_height = field("h")? + field("y")?;
        }
        width = width.max(o_width);
        height = height.max(o_height);
    }
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some((width as u64, height as u64))
}

/// Remove `--<name> <default>` from an enable vector when the attribute was
/// only re-added as a protocol default
fn strip_default_attribute(vector: &mut Vec<String>, name: &str, default: &str) {
    if let Some(index) = vector.iter().position(|arg| arg == &format!("--{name}"))
        && vector.get(index + 1).map(String::as_str) == Some(default)
    {
        vector.drain(index..index + 2);
    }
}

/// Apply `target` on top of `current` by issuing invocation batches.
///
/// Disables go first, the origin output is enabled first, and at most two
/// outputs change per invocation. Outputs already in their target state are
/// not re-issued. Each invocation is retried once on failure; a second
/// failure aborts the remaining sequence.
pub fn apply_configuration(
    target: &Configuration,
    current: &Configuration,
    version: RandrVersion,
    skip: &[String],
    invoker: &mut dyn Invoker,
) -> Result<(), SequenceError> {
    let mut ordered: Vec<&Output> = target.iter().collect();
    ordered.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));

    let mut base_argv = vec![XRANDR.to_string()];
    let fb = fb_dimensions(target);
    if let Some((width, height)) = fb {
        base_argv.push("--fb".to_string());
        base_argv.push(format!("{width}x{height}"));
    }

    let mut auxiliary_pre: Vec<Vec<String>> = Vec::new();
    let mut disable_vectors: Vec<Vec<String>> = Vec::new();
    let mut enable_vectors: Vec<(Option<(i32, i32)>, Vec<String>)> = Vec::new();
    let mut remain_active_count = 0usize;

    for output in &ordered {
        if !output.is_enabled() {
            disable_vectors.push(output.option_vector(version, skip));
            continue;
        }
        let live = current.get(&output.name);
        if live.is_some_and(|live| !live.has_off_option()) {
            remain_active_count += 1;
        }
        if live.is_some_and(|live| reconcile::outputs_equal(live, output, skip)) {
            debug!(output = %output.name, "already in target state");
            continue;
        }

        let mut vector = output.option_vector(version, skip);
        if version.at_least(RandrVersion::V1_3) {
            for (key, clear_value, default) in AUX_ATTRIBUTES {
                let live_has = live.is_some_and(|live| live.options.contains(key));
                if live_has {
                    if !output.options.contains(key) {
                        auxiliary_pre.push(vec![
                            "--output".to_string(),
                            output.name.clone(),
                            format!("--{}", key.config_name()),
                            clear_value.to_string(),
                        ]);
                    }
                } else {
                    // The attribute was only re-added as a protocol default;
                    // some drivers choke on it, so leave it out entirely
                    strip_default_attribute(&mut vector, &key.config_name(), default);
                }
            }
        }
        enable_vectors.push((output.position(), vector));
    }

    if !auxiliary_pre.is_empty() {
        let mut argv = base_argv.clone();
        argv.extend(auxiliary_pre.into_iter().flatten());
        run_with_retry(invoker, &argv)?;
    }

    // Bulk-disable everything except a reserved last output when nothing
    // would remain active; the reserved disable runs interleaved with the
    // enable batches so the screen count never reaches zero in between.
    let disable_keep = if remain_active_count == 0 { 1 } else { 0 };
    let phase = if disable_vectors.len() > disable_keep {
        let bulk_count = disable_vectors.len() - disable_keep;
        let mut argv = base_argv.clone();
        argv.extend(disable_vectors[..bulk_count].iter().flatten().cloned());
        match run_with_retry(invoker, &argv) {
            Ok(()) => DisablePhase::Completed {
                held_back: disable_vectors[bulk_count..].to_vec(),
            },
            Err(error @ SequenceError::Launch { .. }) => return Err(error),
            Err(SequenceError::CommandFailed { first, second, .. }) => {
                warn!(
                    first, second,
                    "bulk disable failed, deferring all disables to the paired batches"
                );
                DisablePhase::PartialAccepted {
                    pending: disable_vectors,
                }
            }
        }
    } else {
        DisablePhase::Completed {
            held_back: disable_vectors,
        }
    };
    let mut pending = match phase {
        DisablePhase::Completed { held_back } => held_back,
        DisablePhase::PartialAccepted { pending } => pending,
    };

    // An even number of pending disables would make one batch consist of
    // the last two screens going dark; pad with a state-neutral argument
    // so the last disable pairs with the first enable instead
    if !pending.is_empty() && pending.len() % 2 == 0 {
        pending.insert(0, vec!["--query".to_string()]);
    }

    // The batch landing at the origin must be enabled first; prefer an
    // exact 0x0 target, then the left edge, then the top edge
    let origin = enable_vectors
        .iter()
        .position(|(pos, _)| *pos == Some((0, 0)))
        .or_else(|| {
            enable_vectors
                .iter()
                .position(|(pos, _)| pos.is_some_and(|(x, _)| x == 0))
        })
        .or_else(|| {
            enable_vectors
                .iter()
                .position(|(pos, _)| pos.is_some_and(|(_, y)| y == 0))
        });
    if let Some(index) = origin
        && index > 0
    {
        let first = enable_vectors.remove(index);
        enable_vectors.insert(0, first);
    }

    let operations: Vec<Vec<String>> = pending
        .into_iter()
        .chain(enable_vectors.into_iter().map(|(_, vector)| vector))
        .collect();
    for pair in operations.chunks(2) {
        let mut argv = base_argv.clone();
        argv.extend(pair.iter().flatten().cloned());
        run_with_retry(invoker, &argv)?;
    }

    // Intermediate batches leave the frame buffer sized for whatever ran
    // last; one trailing size-only invocation fixes that up
    if fb.is_some() {
        run_with_retry(invoker, &base_argv)?;
    }
    Ok(())
}
