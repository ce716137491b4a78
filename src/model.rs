//! Data model for outputs, modes and configurations
//!
//! Everything the parser produces and the sequencer consumes lives here:
//! typed option keys, the ordered option bag, per-connector records and the
//! declaration-ordered configuration map.

use std::collections::BTreeMap;

use crate::edid;

/// One supported resolution/refresh combination of an output
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub refresh_hz: f64,
    pub preferred: bool,
}

impl Mode {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Supported modes per output, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ModeCatalog {
    entries: Vec<(String, Vec<Mode>)>,
}

impl ModeCatalog {
    pub fn insert(&mut self, output: String, modes: Vec<Mode>) {
        self.entries.push((output, modes));
    }

    pub fn get(&self, output: &str) -> Option<&[Mode]> {
        self.entries
            .iter()
            .find(|(name, _)| name == output)
            .map(|(_, modes)| modes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Mode])> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m.as_slice()))
    }
}

/// Output properties captured verbatim from the status report.
/// Only these are stored (under the `x-prop-` namespace) and re-applied.
pub const OUTPUT_PROPERTIES: &[&str] = &[
    "Broadcast RGB",
    "Colorspace",
    "max bpc",
    "aspect ratio",
    "audio",
    "scaling mode",
    "TearFree",
    "underscan",
];

/// Reserved namespace prefix for vendor properties in config files
pub const PROPERTY_PREFIX: &str = "x-prop-";

fn property_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Map a stored property key back to the display server's property name
fn property_display_name(key: &str) -> Option<&'static str> {
    OUTPUT_PROPERTIES
        .iter()
        .find(|name| property_key(name) == key)
        .copied()
}

/// Closed set of recognized configuration option keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Crtc,
    Gamma,
    Mode,
    Off,
    Panning,
    Pos,
    Primary,
    Rate,
    Reflect,
    Rotate,
    Transform,
    /// Vendor property, keyed by its normalized (lowercased) name
    Property(String),
}

impl OptionKey {
    /// Parse a config-file key. Returns None for keys outside the closed set.
    pub fn parse(name: &str) -> Option<OptionKey> {
        Some(match name {
            "crtc" => OptionKey::Crtc,
            "gamma" => OptionKey::Gamma,
            "mode" => OptionKey::Mode,
            "off" => OptionKey::Off,
            "panning" => OptionKey::Panning,
            "pos" => OptionKey::Pos,
            "primary" => OptionKey::Primary,
            "rate" => OptionKey::Rate,
            "reflect" => OptionKey::Reflect,
            "rotate" => OptionKey::Rotate,
            "transform" => OptionKey::Transform,
            other => {
                let key = other.strip_prefix(PROPERTY_PREFIX)?;
                property_display_name(key)?;
                OptionKey::Property(key.to_string())
            }
        })
    }

    /// Build the key for a verbatim-captured output property
    pub fn property(display_name: &str) -> OptionKey {
        OptionKey::Property(property_key(display_name))
    }

    /// Key as written in config files
    pub fn config_name(&self) -> String {
        match self {
            OptionKey::Crtc => "crtc".into(),
            OptionKey::Gamma => "gamma".into(),
            OptionKey::Mode => "mode".into(),
            OptionKey::Off => "off".into(),
            OptionKey::Panning => "panning".into(),
            OptionKey::Pos => "pos".into(),
            OptionKey::Primary => "primary".into(),
            OptionKey::Rate => "rate".into(),
            OptionKey::Reflect => "reflect".into(),
            OptionKey::Rotate => "rotate".into(),
            OptionKey::Transform => "transform".into(),
            OptionKey::Property(key) => format!("{PROPERTY_PREFIX}{key}"),
        }
    }

    /// The value the display server assumes when the option is not given,
    /// together with the minimum protocol version that understands it
    fn default_value(&self) -> Option<(&'static str, RandrVersion)> {
        Some(match self {
            OptionKey::Rotate => ("normal", RandrVersion::V1_2),
            OptionKey::Reflect => ("normal", RandrVersion::V1_2),
            OptionKey::Gamma => ("1.0:1.0:1.0", RandrVersion::V1_2),
            OptionKey::Transform => ("1,0,0,0,1,0,0,0,1", RandrVersion::V1_3),
            OptionKey::Panning => ("0x0", RandrVersion::V1_3),
            _ => return None,
        })
    }
}

const ALL_DEFAULTED_KEYS: &[OptionKey] = &[
    OptionKey::Rotate,
    OptionKey::Reflect,
    OptionKey::Gamma,
    OptionKey::Transform,
    OptionKey::Panning,
];

/// Ordered option bag with unique keys.
///
/// Insertion order is preserved but carries no meaning; all serialized and
/// compared views are sorted by config-file key name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    entries: Vec<(OptionKey, Option<String>)>,
}

impl OptionSet {
    pub fn new() -> OptionSet {
        OptionSet::default()
    }

    /// The canonical off-state bag
    pub fn off() -> OptionSet {
        let mut set = OptionSet::new();
        set.insert(OptionKey::Off, None);
        set
    }

    pub fn insert(&mut self, key: OptionKey, value: Option<String>) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &OptionKey) -> Option<Option<String>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, key: &OptionKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Value of a key; outer None when the key is absent
    pub fn value(&self, key: &OptionKey) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k, v.as_deref()))
    }

    /// Enforce off-exclusivity and drop values that equal an option's
    /// protocol default. Defaults are re-added at serialization time only.
    pub fn normalize(&mut self) {
        if self.contains(&OptionKey::Off) && self.entries.len() > 1 {
            self.entries = OptionSet::off().entries;
            return;
        }
        self.entries.retain(|(key, value)| {
            match key.default_value() {
                Some((default, _)) => value.as_deref() != Some(default),
                None => true,
            }
        });
    }

    /// Sorted key/value view without ignored options, for comparison and
    /// config-file rendering
    pub fn filtered(&self, skip: &[String]) -> BTreeMap<String, Option<String>> {
        self.entries
            .iter()
            .map(|(k, v)| (k.config_name(), v.clone()))
            .filter(|(name, _)| !skip.contains(name))
            .collect()
    }

    /// Sorted view augmented with the defaults the given protocol version
    /// understands. An off output keeps only its off flag.
    pub fn with_defaults(
        &self,
        version: RandrVersion,
        skip: &[String],
    ) -> BTreeMap<String, Option<String>> {
        if self.contains(&OptionKey::Off) {
            return self.filtered(skip);
        }
        let mut merged: BTreeMap<String, Option<String>> = BTreeMap::new();
        for key in ALL_DEFAULTED_KEYS {
            if let Some((default, minimum)) = key.default_value()
                && version.at_least(minimum)
            {
                merged.insert(key.config_name(), Some(default.to_string()));
            }
        }
        for (key, value) in &self.entries {
            merged.insert(key.config_name(), value.clone());
        }
        merged.retain(|name, _| !skip.contains(name));
        merged
    }
}

/// One physical connector and its (normalized) configuration
#[derive(Debug, Clone)]
pub struct Output {
    pub name: String,
    /// Raw hex identity descriptor; None when disconnected
    pub edid: Option<String>,
    /// Stable serial derived from the identity descriptor, when available
    pub serial: Option<String>,
    pub options: OptionSet,
}

impl Output {
    pub fn new(name: String, edid: Option<String>, mut options: OptionSet) -> Output {
        options.normalize();
        let serial = edid.as_deref().and_then(edid::derive_serial);
        Output {
            name,
            edid,
            serial,
            options,
        }
    }

    /// Synthesized off-record carrying an existing identity
    pub fn off(name: &str, edid: Option<String>) -> Output {
        Output::new(name.to_string(), edid, OptionSet::off())
    }

    pub fn has_off_option(&self) -> bool {
        self.options.contains(&OptionKey::Off)
    }

    /// An output without an identity cannot be driven and counts as off
    pub fn is_enabled(&self) -> bool {
        self.edid.is_some() && !self.has_off_option()
    }

    /// Target screen position, when one is set and parseable
    pub fn position(&self) -> Option<(i32, i32)> {
        let pos = self.options.value(&OptionKey::Pos)??;
        let (x, y) = pos.split_once('x')?;
        Some((x.parse().ok()?, y.parse().ok()?))
    }

    /// Key used to order outputs for sequencing: identity-less first, then
    /// explicitly-off, then by ascending screen position
    pub fn sort_key(&self) -> f64 {
        if self.edid.is_none() {
            return -2.0;
        }
        if self.has_off_option() {
            return -1.0;
        }
        match self.position() {
            Some((x, y)) => x as f64 + 10_000.0 * y as f64,
            None => 0.0,
        }
    }

    /// Argument vector for one apply invocation, defaults included per the
    /// given protocol version
    pub fn option_vector(&self, version: RandrVersion, skip: &[String]) -> Vec<String> {
        let mut args = vec!["--output".to_string(), self.name.clone()];
        for (name, value) in self.options.with_defaults(version, skip) {
            if let Some(prop) = name
                .strip_prefix(PROPERTY_PREFIX)
                .and_then(property_display_name)
            {
                args.push("--set".to_string());
                args.push(prop.to_string());
                args.push(value.unwrap_or_default());
            } else {
                args.push(format!("--{name}"));
                if let Some(value) = value {
                    args.push(value);
                }
            }
        }
        args
    }

    /// Config-file rendering of this output's option block
    pub fn option_string(&self, skip: &[String]) -> String {
        let mut lines = vec![format!("output {}", self.name)];
        for (name, value) in self.options.filtered(skip) {
            match value {
                Some(value) => lines.push(format!("{name} {value}")),
                None => lines.push(name),
            }
        }
        lines.join("\n")
    }
}

/// A full display-server state, live or target, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    outputs: Vec<Output>,
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration::default()
    }

    /// Insert or replace by output name, preserving declaration order
    pub fn insert(&mut self, output: Output) {
        if let Some(slot) = self.outputs.iter_mut().find(|o| o.name == output.name) {
            *slot = output;
        } else {
            self.outputs.push(output);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Output> {
        let index = self.outputs.iter().position(|o| o.name == name)?;
        Some(self.outputs.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Output> {
        self.outputs.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Output> {
        self.outputs.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Names of outputs that will be driven by this configuration
    pub fn enabled_outputs(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|o| o.is_enabled())
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Protocol version of the display server's configuration interface,
/// probed once by the caller and injected where behavior depends on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RandrVersion {
    pub major: u32,
    pub minor: u32,
}

impl RandrVersion {
    pub const V1_2: RandrVersion = RandrVersion { major: 1, minor: 2 };
    pub const V1_3: RandrVersion = RandrVersion { major: 1, minor: 3 };

    pub fn new(major: u32, minor: u32) -> RandrVersion {
        RandrVersion { major, minor }
    }

    /// Parse "1.5" or "1.5.1" style version strings
    pub fn parse(text: &str) -> Option<RandrVersion> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(RandrVersion { major, minor })
    }

    pub fn at_least(self, other: RandrVersion) -> bool {
        self >= other
    }
}

impl std::fmt::Display for RandrVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
