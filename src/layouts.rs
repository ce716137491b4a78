//! Built-in virtual layouts
//!
//! A virtual layout is synthesized from the live configuration and the mode
//! catalog instead of being loaded from disk. Generation is a pure builder:
//! the current configuration is never mutated.

use std::fmt;
use std::str::FromStr;

use crate::model::{Configuration, Mode, ModeCatalog, OptionKey, OptionSet, Output};

/// Score bonus that lets a preferred mode outrank any raw pixel count
const PREFERRED_BONUS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Off,
    Common,
    CloneLargest,
    Horizontal,
    HorizontalReverse,
    Vertical,
    VerticalReverse,
}

impl Layout {
    pub const ALL: &[Layout] = &[
        Layout::Off,
        Layout::Common,
        Layout::CloneLargest,
        Layout::Horizontal,
        Layout::HorizontalReverse,
        Layout::Vertical,
        Layout::VerticalReverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layout::Off => "off",
            Layout::Common => "common",
            Layout::CloneLargest => "clone-largest",
            Layout::Horizontal => "horizontal",
            Layout::HorizontalReverse => "horizontal-reverse",
            Layout::Vertical => "vertical",
            Layout::VerticalReverse => "vertical-reverse",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Layout::Off => "Disable all outputs",
            Layout::Common => "Clone all connected outputs at the largest common resolution",
            Layout::CloneLargest => {
                "Clone all connected outputs with the largest resolution (scaled down if necessary)"
            }
            Layout::Horizontal => "Stack all connected outputs horizontally at their largest resolution",
            Layout::HorizontalReverse => {
                "Stack all connected outputs horizontally in reverse order"
            }
            Layout::Vertical => "Stack all connected outputs vertically at their largest resolution",
            Layout::VerticalReverse => "Stack all connected outputs vertically in reverse order",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = ();

    fn from_str(s: &str) -> Result<Layout, ()> {
        Layout::ALL
            .iter()
            .copied()
            .find(|layout| layout.name() == s)
            .ok_or(())
    }
}

/// Synthesize the target configuration for a virtual layout.
pub fn generate(current: &Configuration, modes: &ModeCatalog, layout: Layout) -> Configuration {
    match layout {
        Layout::Off => all_off(current),
        Layout::Common => common(current, modes),
        Layout::CloneLargest => clone_largest(current, modes),
        Layout::Horizontal => stacked(current, modes, Axis::Horizontal, false),
        Layout::HorizontalReverse => stacked(current, modes, Axis::Horizontal, true),
        Layout::Vertical => stacked(current, modes, Axis::Vertical, false),
        Layout::VerticalReverse => stacked(current, modes, Axis::Vertical, true),
    }
}

fn all_off(current: &Configuration) -> Configuration {
    let mut target = Configuration::new();
    for output in current.iter() {
        target.insert(Output::off(&output.name, output.edid.clone()));
    }
    target
}

/// Mode preference for stacking/cloning: raw area plus a large flat bonus
/// for the mode the monitor itself prefers
fn best_mode(modes: &[Mode]) -> Option<&Mode> {
    modes
        .iter()
        .max_by_key(|mode| mode.area() + if mode.preferred { PREFERRED_BONUS } else { 0 })
}

fn usable(output: &Output, modes: &ModeCatalog) -> bool {
    output.edid.is_some() && modes.get(&output.name).is_some()
}

fn common(current: &Configuration, modes: &ModeCatalog) -> Configuration {
    // Intersect the resolutions every identity-bearing output supports;
    // an output without identity contributes an empty set on purpose.
    let mut resolution_sets: Vec<Vec<(u32, u32)>> = Vec::new();
    for (name, output_modes) in modes.iter() {
        let mut set: Vec<(u32, u32)> = Vec::new();
        if current.get(name).is_some_and(|o| o.edid.is_some()) {
            for mode in output_modes {
                if !set.contains(&(mode.width, mode.height)) {
                    set.push((mode.width, mode.height));
                }
            }
        }
        resolution_sets.push(set);
    }
    let Some((first, rest)) = resolution_sets.split_first() else {
        return current.clone();
    };
    let shared = first
        .iter()
        .filter(|resolution| rest.iter().all(|set| set.contains(resolution)))
        .max_by_key(|(w, h)| *w as u64 * *h as u64);
    let Some(&(width, height)) = shared else {
        // No common resolution: leave the configuration as it is
        return current.clone();
    };

    let mut target = Configuration::new();
    for output in current.iter() {
        if usable(output, modes) {
            let catalog = modes.get(&output.name).unwrap_or_default();
            let chosen = catalog
                .iter()
                .filter(|mode| mode.width == width && mode.height == height)
                .max_by_key(|mode| mode.preferred);
            if let Some(mode) = chosen {
                let mut options = OptionSet::new();
                options.insert(OptionKey::Mode, Some(mode.name.clone()));
                options.insert(OptionKey::Pos, Some("0x0".to_string()));
                target.insert(Output::new(
                    output.name.clone(),
                    output.edid.clone(),
                    options,
                ));
                continue;
            }
        }
        target.insert(Output::off(&output.name, output.edid.clone()));
    }
    target
}

enum Axis {
    Horizontal,
    Vertical,
}

fn stacked(
    current: &Configuration,
    modes: &ModeCatalog,
    axis: Axis,
    reverse: bool,
) -> Configuration {
    let mut order: Vec<&Output> = current.iter().collect();
    if reverse {
        order.reverse();
    }

    let mut placed: Vec<(String, OptionSet)> = Vec::new();
    let mut shift: u64 = 0;
    for output in order {
        let mut options = OptionSet::off();
        if usable(output, modes)
            && let Some(mode) = best_mode(modes.get(&output.name).unwrap_or_default())
        {
            options = OptionSet::new();
            options.insert(OptionKey::Mode, Some(mode.name.clone()));
            options.insert(OptionKey::Rate, Some(format!("{:.2}", mode.refresh_hz)));
            let (pos, extent) = match axis {
                Axis::Horizontal => (format!("{shift}x0"), mode.width),
                Axis::Vertical => (format!("0x{shift}"), mode.height),
            };
            options.insert(OptionKey::Pos, Some(pos));
            shift += extent as u64;
        }
        placed.push((output.name.clone(), options));
    }

    let mut target = Configuration::new();
    for output in current.iter() {
        let options = placed
            .iter()
            .find(|(name, _)| *name == output.name)
            .map(|(_, options)| options.clone())
            .unwrap_or_else(OptionSet::off);
        target.insert(Output::new(
            output.name.clone(),
            output.edid.clone(),
            options,
        ));
    }
    target
}

fn clone_largest(current: &Configuration, modes: &ModeCatalog) -> Configuration {
    // The reference canvas is the largest first-listed mode of any output
    let mut largest: Option<&Mode> = None;
    for (_, output_modes) in modes.iter() {
        if let Some(first) = output_modes.first()
            && largest.is_none_or(|best| first.area() > best.area())
        {
            largest = Some(first);
        }
    }
    let Some(canvas) = largest else {
        return all_off(current);
    };

    let mut target = Configuration::new();
    for output in current.iter() {
        if usable(output, modes)
            && let Some(mode) = best_mode(modes.get(&output.name).unwrap_or_default())
        {
            let mut options = OptionSet::new();
            options.insert(OptionKey::Mode, Some(mode.name.clone()));
            options.insert(OptionKey::Rate, Some(format!("{:.2}", mode.refresh_hz)));
            options.insert(OptionKey::Pos, Some("0x0".to_string()));
            // Scale up to cover the canvas, centering via the translation terms
            let scale = f64::max(
                canvas.width as f64 / mode.width as f64,
                canvas.height as f64 / mode.height as f64,
            );
            let mov_x = (mode.width as f64 * scale - canvas.width as f64) / -2.0;
            let mov_y = (mode.height as f64 * scale - canvas.height as f64) / -2.0;
            options.insert(
                OptionKey::Transform,
                Some(format!(
                    "{},0,{},0,{},{},0,0,1",
                    fmt_scalar(scale),
                    fmt_scalar(mov_x),
                    fmt_scalar(scale),
                    fmt_scalar(mov_y)
                )),
            );
            target.insert(Output::new(
                output.name.clone(),
                output.edid.clone(),
                options,
            ));
        } else {
            target.insert(Output::off(&output.name, output.edid.clone()));
        }
    }
    target
}

fn fmt_scalar(value: f64) -> String {
    // Collapse negative zero so transforms stay canonical
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(name: &str, width: u32, height: u32, preferred: bool) -> Mode {
        Mode {
            name: name.to_string(),
            width,
            height,
            refresh_hz: 60.0,
            preferred,
        }
    }

    fn connected(name: &str) -> Output {
        let mut options = OptionSet::new();
        options.insert(OptionKey::Mode, Some("whatever".into()));
        options.insert(OptionKey::Pos, Some("0x0".into()));
        Output::new(name.to_string(), Some(format!("00ff{name}")), options)
    }

    fn two_output_state() -> (Configuration, ModeCatalog) {
        let mut config = Configuration::new();
        config.insert(connected("DP-1"));
        config.insert(connected("HDMI-1"));
        let mut catalog = ModeCatalog::default();
        catalog.insert(
            "DP-1".into(),
            vec![
                mode("1920x1080", 1920, 1080, true),
                mode("1280x1024", 1280, 1024, false),
            ],
        );
        catalog.insert(
            "HDMI-1".into(),
            vec![
                mode("1280x1024", 1280, 1024, true),
                mode("1024x768", 1024, 768, false),
            ],
        );
        (config, catalog)
    }

    #[test]
    fn horizontal_places_outputs_at_accumulating_offsets() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::Horizontal);

        let first = target.get("DP-1").unwrap();
        assert_eq!(first.options.value(&OptionKey::Mode), Some(Some("1920x1080")));
        assert_eq!(first.options.value(&OptionKey::Pos), Some(Some("0x0")));
        let second = target.get("HDMI-1").unwrap();
        assert_eq!(second.options.value(&OptionKey::Pos), Some(Some("1920x0")));
    }

    #[test]
    fn horizontal_reverse_flips_the_iteration_order() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::HorizontalReverse);

        assert_eq!(
            target.get("HDMI-1").unwrap().options.value(&OptionKey::Pos),
            Some(Some("0x0"))
        );
        assert_eq!(
            target.get("DP-1").unwrap().options.value(&OptionKey::Pos),
            Some(Some("1280x0"))
        );
        // Declaration order of the result is unchanged
        let names: Vec<_> = target.names().collect();
        assert_eq!(names, vec!["DP-1", "HDMI-1"]);
    }

    #[test]
    fn vertical_accumulates_along_y() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::Vertical);
        assert_eq!(
            target.get("HDMI-1").unwrap().options.value(&OptionKey::Pos),
            Some(Some("0x1080"))
        );
    }

    #[test]
    fn preferred_mode_outranks_larger_area() {
        let mut config = Configuration::new();
        config.insert(connected("DP-1"));
        let mut catalog = ModeCatalog::default();
        catalog.insert(
            "DP-1".into(),
            vec![
                mode("3840x2160", 3840, 2160, false),
                mode("1920x1080", 1920, 1080, true),
            ],
        );
        let target = generate(&config, &catalog, Layout::Horizontal);
        assert_eq!(
            target.get("DP-1").unwrap().options.value(&OptionKey::Mode),
            Some(Some("1920x1080"))
        );
    }

    #[test]
    fn common_picks_the_largest_shared_resolution() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::Common);

        for name in ["DP-1", "HDMI-1"] {
            let output = target.get(name).unwrap();
            assert_eq!(output.options.value(&OptionKey::Mode), Some(Some("1280x1024")));
            assert_eq!(output.options.value(&OptionKey::Pos), Some(Some("0x0")));
        }
    }

    #[test]
    fn common_without_shared_resolution_is_a_no_op() {
        let mut config = Configuration::new();
        config.insert(connected("DP-1"));
        config.insert(connected("HDMI-1"));
        let mut catalog = ModeCatalog::default();
        catalog.insert("DP-1".into(), vec![mode("1920x1080", 1920, 1080, true)]);
        catalog.insert("HDMI-1".into(), vec![mode("1024x768", 1024, 768, true)]);

        let target = generate(&config, &catalog, Layout::Common);
        assert_eq!(
            target.get("DP-1").unwrap().options.value(&OptionKey::Mode),
            Some(Some("whatever"))
        );
    }

    #[test]
    fn clone_largest_scales_and_centers_smaller_outputs() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::CloneLargest);

        // 1280x1024 scaled by max(1920/1280, 1080/1024) = 1.5, centered
        let hdmi = target.get("HDMI-1").unwrap();
        assert_eq!(
            hdmi.options.value(&OptionKey::Transform),
            Some(Some("1.5,0,0,0,1.5,-228,0,0,1"))
        );
        assert_eq!(hdmi.options.value(&OptionKey::Pos), Some(Some("0x0")));

        // The canvas-sized output ends up with the identity transform,
        // which normalization strips as a protocol default
        let dp = target.get("DP-1").unwrap();
        assert!(!dp.options.contains(&OptionKey::Transform));
    }

    #[test]
    fn off_disables_everything_but_keeps_identities() {
        let (config, catalog) = two_output_state();
        let target = generate(&config, &catalog, Layout::Off);
        for output in target.iter() {
            assert!(output.has_off_option());
            assert!(output.edid.is_some());
        }
    }

    #[test]
    fn generation_never_mutates_its_input() {
        let (config, catalog) = two_output_state();
        let before = config.get("DP-1").unwrap().options.clone();
        let _ = generate(&config, &catalog, Layout::Off);
        let _ = generate(&config, &catalog, Layout::Horizontal);
        assert_eq!(config.get("DP-1").unwrap().options, before);
    }

    #[test]
    fn outputs_without_identity_are_forced_off() {
        let mut config = Configuration::new();
        config.insert(connected("DP-1"));
        config.insert(Output::new("VGA-1".into(), None, OptionSet::new()));
        let mut catalog = ModeCatalog::default();
        catalog.insert("DP-1".into(), vec![mode("1920x1080", 1920, 1080, true)]);

        let target = generate(&config, &catalog, Layout::Horizontal);
        assert!(target.get("VGA-1").unwrap().has_off_option());
    }

    #[test]
    fn layout_names_round_trip() {
        for layout in Layout::ALL {
            assert_eq!(layout.name().parse::<Layout>().ok(), Some(*layout));
        }
        assert!("diagonal".parse::<Layout>().is_err());
    }
}
