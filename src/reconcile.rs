//! Reconciliation between the detected layout and a stored target
//!
//! Before a target layout is applied it is padded with off-records for every
//! connector the server currently knows about, then pruned of records that
//! are off on both sides. Equality of the padded layouts is what lets an
//! apply run short-circuit.

use tracing::debug;

use crate::edid;
use crate::model::{Configuration, Output};

/// Pad the target with an off-record for every output the current layout
/// knows but the target does not mention. The synthesized record carries the
/// current identity so later comparisons see the same hardware.
pub fn add_unused_outputs(current: &Configuration, target: &mut Configuration) {
    for output in current.iter() {
        if !target.contains(&output.name) {
            debug!(output = %output.name, "padding target with off-record");
            target.insert(Output::off(&output.name, output.edid.clone()));
        }
    }
}

/// Drop target records for outputs that are off in both layouts; applying
/// them would be a no-op.
pub fn remove_irrelevant_outputs(current: &Configuration, target: &mut Configuration) {
    let mut stale: Vec<String> = Vec::new();
    for output in current.iter() {
        if output.has_off_option()
            && target.get(&output.name).is_some_and(Output::has_off_option)
        {
            stale.push(output.name.clone());
        }
    }
    for name in stale {
        debug!(output = %name, "dropping output that is off on both sides");
        target.remove(&name);
    }
}

/// Whether two output records describe the same hardware in the same state,
/// ignoring the given option names
pub fn outputs_equal(a: &Output, b: &Output, skip: &[String]) -> bool {
    a.name == b.name && edid::fingerprint_equals(a, b) && a.options.filtered(skip) == b.options.filtered(skip)
}

/// Whether applying `target` on top of `current` would change anything.
///
/// Every active target output must exist unchanged in the current layout,
/// every target off-record must be off (or absent) currently, and the
/// current layout must not drive any output the target does not cover.
pub fn is_equal_configuration(
    current: &Configuration,
    target: &Configuration,
    skip: &[String],
) -> bool {
    for wanted in target.iter() {
        match current.get(&wanted.name) {
            Some(live) if wanted.has_off_option() => {
                if !live.has_off_option() {
                    return false;
                }
            }
            Some(live) => {
                if !outputs_equal(live, wanted, skip) {
                    return false;
                }
            }
            None => {
                if !wanted.has_off_option() {
                    return false;
                }
            }
        }
    }
    for live in current.iter() {
        if !live.has_off_option() && !target.contains(&live.name) {
            return false;
        }
    }
    true
}

fn short_identity(output: &Output) -> String {
    match (&output.serial, &output.edid) {
        (Some(serial), _) => serial.clone(),
        (None, Some(edid)) if edid.len() > 16 => format!("{}…", &edid[..16]),
        (None, Some(edid)) => edid.clone(),
        (None, None) => "<none>".to_string(),
    }
}

/// Human-readable description of what applying `target` would change,
/// one line per difference. Empty when the layouts are equal.
pub fn differences(
    current: &Configuration,
    target: &Configuration,
    skip: &[String],
) -> Vec<String> {
    let mut lines = Vec::new();

    for live in current.iter() {
        if !target.contains(&live.name) && !live.has_off_option() {
            lines.push(format!("Output `{}` is active in the current layout only", live.name));
        }
    }
    for wanted in target.iter() {
        let Some(live) = current.get(&wanted.name) else {
            if !wanted.has_off_option() {
                lines.push(format!("Output `{}` is active in the new layout only", wanted.name));
            }
            continue;
        };
        if outputs_equal(live, wanted, skip) {
            continue;
        }
        if !edid::fingerprint_equals(live, wanted) {
            lines.push(format!(
                "Output `{}`: identity `{}` differs from `{}`",
                wanted.name,
                short_identity(live),
                short_identity(wanted)
            ));
        }
        let current_options = live.options.filtered(skip);
        let wanted_options = wanted.options.filtered(skip);
        for (name, value) in &current_options {
            if !wanted_options.contains_key(name) {
                lines.push(format!(
                    "Output `{}`: option --{name}{} is not present in the new layout",
                    wanted.name,
                    value
                        .as_deref()
                        .map(|v| format!(" (= `{v}`)"))
                        .unwrap_or_default()
                ));
            }
        }
        for (name, value) in &wanted_options {
            match current_options.get(name) {
                None => lines.push(format!(
                    "Output `{}`: option --{name}{} is not present in the current layout",
                    wanted.name,
                    value
                        .as_deref()
                        .map(|v| format!(" (= `{v}`)"))
                        .unwrap_or_default()
                )),
                Some(old) if old != value => lines.push(format!(
                    "Output `{}`: option --{name} changes from `{}` to `{}`",
                    wanted.name,
                    old.as_deref().unwrap_or(""),
                    value.as_deref().unwrap_or("")
                )),
                Some(_) => {}
            }
        }
    }
    lines
}
