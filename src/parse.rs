//! Parser for the display server's verbose status report
//!
//! `xrandr --verbose` prints one block per connector: a header line with
//! connection state and active geometry, an indented property body (gamma,
//! transform matrix, EDID payload, vendor properties) and a trailing mode
//! table. The grammar is externally defined and only semi-structured, so
//! parsing is deliberately strict: anything the grammar rules cannot
//! account for is a fatal error with the offending byte offset, never a
//! silently dropped line.

use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::edid::EDID_UNAVAILABLE;
use crate::model::{
    Configuration, Mode, ModeCatalog, OptionKey, OptionSet, Output, RandrVersion,
    OUTPUT_PROPERTIES,
};

/// The display server's configuration tool
pub const XRANDR: &str = "xrandr";

/// Reciprocal gamma clamp; the server auto-corrects 0 to 1, we approximate
const GAMMA_EPSILON: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no output boundaries found in status report")]
    NoBoundaries,
    #[error("unmatched content at byte {offset}: ..`{snippet}`")]
    Unmatched { offset: usize, snippet: String },
    #[error("output `{output}` has a mode table but no parseable modes")]
    NoModes { output: String },
    #[error("malformed {what} for output `{output}`: `{text}`")]
    Malformed {
        output: String,
        what: &'static str,
        text: String,
    },
}

/// A new connector block starts at any line of this shape
static BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([^ ]+) (connected|disconnected|unknown connection)").unwrap()
});

static SCREEN_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Screen [0-9].*$").unwrap());

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<name>[^\ ]+)\ (?P<connection>connected|disconnected|unknown\ connection)
        \s*(?P<primary>primary\ )?
        (?:
            (?P<width>[0-9]+)x(?P<height>[0-9]+)
            \+(?P<x>-?[0-9]+)\+(?P<y>-?[0-9]+)
            (?:\s+\(0x[0-9a-fA-F]+\))?
            \s+(?P<rotate>normal|left|right|inverted)
            (?:\s+(?P<reflect>X\ and\ Y|X|Y)\ axis)?
        )?",
    )
    .unwrap()
});

static PANNING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"panning ([0-9]+x[0-9]+\+[0-9]+\+[0-9]+)").unwrap());
static TRACKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tracking ([0-9]+x[0-9]+\+[0-9]+\+[0-9]+)").unwrap());
static BORDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"border ((?:[0-9]+/){3}[0-9]+)").unwrap());

static EDID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*EDID:\s*\n(?P<hex>(?:[ \t]+[0-9a-fA-F]+\n?)+)").unwrap());
static GAMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Gamma:\s*(?P<gamma>[0-9.:einf ]+?)\s*$").unwrap());
static TRANSFORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Transform:\s*(?P<rows>[-0-9.e ]+\n\s*[-0-9.e ]+\n\s*[-0-9.e ]+)").unwrap()
});
static CRTC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*CRTC:\s*(?P<crtc>[0-9]+)\s*$").unwrap());

/// First line of the mode table; distinctive enough not to collide with
/// property or timing lines
static MODE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]+\S+[ \t]+\(0x[0-9a-fA-F]+\)[ \t]+[0-9.]+MHz").unwrap()
});

static MODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?m)^[\ \t]+(?P<name>\S+)[\ \t]+\(0x[0-9a-fA-F]+\)[\ \t]+
        [0-9.]+MHz(?P<flags>[^\n]*)\n
        \s*h:\s+width\s+(?P<width>[0-9]+)[^\n]*\n
        \s*v:\s+height\s+(?P<height>[0-9]+)[^\n]*?clock\s+(?P<rate>[0-9.]+)Hz",
    )
    .unwrap()
});

/// Parse the whole verbose status report into the live configuration plus
/// the per-output mode catalog.
pub fn parse_verbose(report: &str) -> Result<(Configuration, ModeCatalog), ParseError> {
    let report = report.replace("\r\n", "\n");
    // Screen summary lines carry no per-connector state
    let report = SCREEN_LINE_RE.replace_all(&report, "");
    let report = report.trim_start_matches('\n');

    let boundaries: Vec<usize> = BOUNDARY_RE.find_iter(report).map(|m| m.start()).collect();
    if boundaries.is_empty() {
        return Err(ParseError::NoBoundaries);
    }
    if !report[..boundaries[0]].trim().is_empty() {
        return Err(ParseError::Unmatched {
            offset: 0,
            snippet: snippet_of(report),
        });
    }

    let mut configuration = Configuration::new();
    let mut catalog = ModeCatalog::default();
    for (index, start) in boundaries.iter().enumerate() {
        let end = boundaries.get(index + 1).copied().unwrap_or(report.len());
        let (output, modes) = parse_output(&report[*start..end], *start)?;
        debug!(output = %output.name, options = output.options.len(), modes = modes.len(), "parsed output");
        if !modes.is_empty() {
            catalog.insert(output.name.clone(), modes);
        }
        configuration.insert(output);
    }
    Ok((configuration, catalog))
}

/// Parse one connector block. `base` is the block's byte offset in the
/// report, used for error positions.
fn parse_output(segment: &str, base: usize) -> Result<(Output, Vec<Mode>), ParseError> {
    let (header, body) = segment.split_once('\n').unwrap_or((segment, ""));
    let captures = HEADER_RE.captures(header).ok_or_else(|| ParseError::Unmatched {
        offset: base,
        snippet: snippet_of(segment),
    })?;
    let name = captures["name"].to_string();
    let connected = &captures["connection"] == "connected";

    // Everything up to the first mode line is the property body
    let (properties, mode_table) = match MODE_START_RE.find(body) {
        Some(found) => body.split_at(found.start()),
        None => (body, ""),
    };
    validate_indented(properties, base + header.len() + 1)?;

    let modes = parse_mode_table(&name, mode_table, base + header.len() + 1 + properties.len())?;
    let current = modes.iter().position(|(_, current)| *current);
    if modes.iter().filter(|(_, current)| *current).count() > 1 {
        warn!(output = %name, "more than one mode marked current, using the first");
    }
    let modes: Vec<Mode> = modes.into_iter().map(|(mode, _)| mode).collect();

    let edid = if !connected {
        None
    } else if let Some(found) = EDID_RE.captures(properties) {
        Some(found["hex"].split_whitespace().collect::<String>())
    } else {
        Some(format!("{EDID_UNAVAILABLE}{name}"))
    };

    let mut options = OptionSet::new();
    if let Some(width) = captures.name("width") {
        // The connector currently drives a mode; disconnected outputs can
        // reach this branch with residual geometry, which is legal.
        let rotate = &captures["rotate"];
        let current_mode = current.map(|i| &modes[i]);
        let mode_value = match current_mode {
            Some(mode) => mode.name.clone(),
            None => {
                let (w, h) = (width.as_str(), &captures["height"]);
                if rotate == "left" || rotate == "right" {
                    format!("{h}x{w}")
                } else {
                    format!("{w}x{h}")
                }
            }
        };
        options.insert(OptionKey::Mode, Some(mode_value));
        options.insert(OptionKey::Rotate, Some(rotate.to_string()));
        if captures.name("primary").is_some() {
            options.insert(OptionKey::Primary, None);
        }
        if let Some(reflect) = captures.name("reflect") {
            let value = match reflect.as_str() {
                "X" => "x",
                "Y" => "y",
                _ => "xy",
            };
            options.insert(OptionKey::Reflect, Some(value.to_string()));
        }
        options.insert(
            OptionKey::Pos,
            Some(format!("{}x{}", &captures["x"], &captures["y"])),
        );
        if let Some(panning) = PANNING_RE.captures(header) {
            let mut value = panning[1].to_string();
            if let Some(tracking) = TRACKING_RE.captures(header) {
                value.push('/');
                value.push_str(&tracking[1]);
                if let Some(border) = BORDER_RE.captures(header) {
                    value.push('/');
                    value.push_str(&border[1]);
                }
            }
            options.insert(OptionKey::Panning, Some(value));
        }
        if let Some(transform) = parse_transform(&name, properties)? {
            options.insert(OptionKey::Transform, Some(transform));
        }
        if let Some(found) = GAMMA_RE.captures(properties) {
            options.insert(
                OptionKey::Gamma,
                Some(reciprocal_gamma(&name, &found["gamma"])?),
            );
        }
        if let Some(mode) = current_mode {
            options.insert(OptionKey::Rate, Some(format!("{:.2}", mode.refresh_hz)));
        }
        if let Some(found) = CRTC_RE.captures(properties) {
            options.insert(OptionKey::Crtc, Some(found["crtc"].to_string()));
        }
        for property in OUTPUT_PROPERTIES {
            if let Some(value) = property_value(properties, property) {
                options.insert(OptionKey::property(property), Some(value));
            }
        }
    } else {
        options.insert(OptionKey::Off, None);
    }

    Ok((Output::new(name, edid, options), modes))
}

/// Every body line is indented under its connector header; a flush-left
/// line here means the grammar no longer matches the report.
fn validate_indented(properties: &str, base: usize) -> Result<(), ParseError> {
    let mut offset = base;
    for line in properties.split_inclusive('\n') {
        let text = line.trim_end_matches('\n');
        if !text.is_empty() && !text.starts_with([' ', '\t']) {
            return Err(ParseError::Unmatched {
                offset,
                snippet: snippet_of(text),
            });
        }
        offset += line.len();
    }
    Ok(())
}

/// Parse the mode table, returning each mode plus its currently-active flag
fn parse_mode_table(
    output: &str,
    table: &str,
    base: usize,
) -> Result<Vec<(Mode, bool)>, ParseError> {
    if table.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut modes = Vec::new();
    let mut consumed = 0;
    for found in MODE_RE.captures_iter(table) {
        let whole = found.get(0).unwrap_or_else(|| unreachable!());
        if !table[consumed..whole.start()].trim().is_empty() {
            return Err(ParseError::Unmatched {
                offset: base + consumed,
                snippet: snippet_of(&table[consumed..]),
            });
        }
        consumed = whole.end();
        let flags = &found["flags"];
        let mode = Mode {
            name: found["name"].to_string(),
            width: found["width"].parse().map_err(|_| ParseError::Malformed {
                output: output.to_string(),
                what: "mode width",
                text: found["width"].to_string(),
            })?,
            height: found["height"].parse().map_err(|_| ParseError::Malformed {
                output: output.to_string(),
                what: "mode height",
                text: found["height"].to_string(),
            })?,
            refresh_hz: found["rate"].parse().unwrap_or(0.0),
            preferred: flags.contains("+preferred"),
        };
        modes.push((mode, flags.contains("*current")));
    }
    if modes.is_empty() {
        return Err(ParseError::NoModes {
            output: output.to_string(),
        });
    }
    // Trailing timing lines belong to the last matched mode; anything else
    // left over is a grammar regression we refuse to paper over.
    let remainder = &table[consumed..];
    let residual_ok = remainder
        .lines()
        .all(|line| line.trim().is_empty() || line.trim_start().starts_with(['h', 'v']));
    if !residual_ok {
        return Err(ParseError::Unmatched {
            offset: base + consumed,
            snippet: snippet_of(remainder),
        });
    }
    Ok(modes)
}

/// Canonicalize the 3x3 transform matrix to a comma-joined 9-tuple; the
/// identity matrix is omitted entirely to keep diffs and invocations short.
fn parse_transform(output: &str, properties: &str) -> Result<Option<String>, ParseError> {
    let Some(found) = TRANSFORM_RE.captures(properties) else {
        return Ok(None);
    };
    let tokens: Vec<&str> = found["rows"].split_whitespace().collect();
    if tokens.len() != 9 {
        return Err(ParseError::Malformed {
            output: output.to_string(),
            what: "transform matrix",
            text: found["rows"].to_string(),
        });
    }
    let mut values = [0f64; 9];
    for (slot, token) in values.iter_mut().zip(&tokens) {
        *slot = token.parse().map_err(|_| ParseError::Malformed {
            output: output.to_string(),
            what: "transform matrix",
            text: (*token).to_string(),
        })?;
    }
    const IDENTITY: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
    if values == IDENTITY {
        return Ok(None);
    }
    Ok(Some(tokens.join(",")))
}

/// Re-encode the reported per-channel gamma multiplier into the reciprocal
/// form the configuration interface expects, rounded to 3 decimals.
fn reciprocal_gamma(output: &str, reported: &str) -> Result<String, ParseError> {
    let mut channels = Vec::new();
    for component in reported.split(':') {
        let value: f64 = component.trim().parse().map_err(|_| ParseError::Malformed {
            output: output.to_string(),
            what: "gamma",
            text: reported.to_string(),
        })?;
        let reciprocal = if value == 0.0 {
            GAMMA_EPSILON
        } else {
            ((1.0 / value) * 1000.0).round() / 1000.0
        };
        let reciprocal = reciprocal.max(GAMMA_EPSILON);
        if reciprocal.fract() == 0.0 {
            channels.push(format!("{reciprocal:.1}"));
        } else {
            channels.push(format!("{reciprocal}"));
        }
    }
    Ok(channels.join(":"))
}

/// Value of a verbatim-captured output property, first line only
fn property_value(properties: &str, name: &str) -> Option<String> {
    for line in properties.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix(name)
            && let Some(value) = rest.strip_prefix(':')
        {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn snippet_of(text: &str) -> String {
    text.chars().take(24).collect()
}

/// Query the live state from the display server
pub fn current_state() -> Result<(Configuration, ModeCatalog)> {
    let result = Command::new(XRANDR)
        .args(["-q", "--verbose"])
        .output()
        .context("failed to run the display query tool")?;
    if !result.status.success() {
        anyhow::bail!("display query tool exited with {}", result.status);
    }
    let report = String::from_utf8_lossy(&result.stdout);
    if report.trim().is_empty() {
        anyhow::bail!("display query tool produced no output");
    }
    let state = parse_verbose(&report)?;
    Ok(state)
}

/// Probe the configuration interface version once; injected everywhere the
/// behavior is version-gated. Falls back to 1.3 when the probe is unreadable.
pub fn probe_version() -> RandrVersion {
    static VERSION_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"program version\s+([0-9.]+)").unwrap());
    let fallback = RandrVersion::V1_3;
    let Ok(result) = Command::new(XRANDR).arg("-v").output() else {
        warn!("version probe failed to run, assuming {fallback}");
        return fallback;
    };
    let text = String::from_utf8_lossy(&result.stdout);
    match VERSION_RE
        .captures(&text)
        .and_then(|found| RandrVersion::parse(&found[1]))
    {
        Some(version) => version,
        None => {
            warn!("version probe output unreadable, assuming {fallback}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Screen 0: minimum 8 x 8, current 3200 x 1080, maximum 16384 x 16384
DP-1 connected primary 1920x1080+0+0 (0x47) normal (normal left inverted right x axis y axis) 531mm x 299mm
\tIdentifier: 0x42
\tTimestamp:  76680
\tSubpixel:  unknown
\tGamma:      2.0:1.0:0.5
\tBrightness: 1.0
\tClones:
\tCRTC:      0
\tCRTCs:     0
\tTransform: 1.000000 0.000000 0.000000
\t           0.000000 1.000000 0.000000
\t           0.000000 0.000000 1.000000
\t           filter:
\tEDID:
\t\t00ffffffffffff0010acb8a042524530
\t\t0f18010380342078ea04955e558d2712
\t\t505400a54b00714f8180a9c0d1c00101
\t\t010101010101023a801871382d40582c
\t\t450009252100001e000000ff00353944
\t\t460f4c0a202020202020000000fc0044
\t\t454c4c205532343134480a000000fd00
\t\t384c1e5311000a202020202020200039
\taspect ratio: Automatic
\t\tsupported: Automatic, 4:3, 16:9
  1920x1080 (0x47) 148.500MHz +HSync +VSync *current +preferred
        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz
        v: height 1080 start 1084 end 1089 total 1125           clock  60.00Hz
  1280x1024 (0x49) 135.000MHz +HSync +VSync
        h: width  1280 start 1296 end 1440 total 1688 skew    0 clock  79.98KHz
        v: height 1024 start 1025 end 1028 total 1066           clock  60.02Hz
HDMI-1 disconnected (normal left inverted right x axis y axis)
\tIdentifier: 0x43
\tCRTC:      1
\tCRTCs:     1
";

    #[test]
    fn parses_connected_and_disconnected_outputs() {
        let (config, catalog) = parse_verbose(REPORT).unwrap();
        let names: Vec<_> = config.names().collect();
        assert_eq!(names, vec!["DP-1", "HDMI-1"]);

        let dp = config.get("DP-1").unwrap();
        assert!(dp.edid.as_deref().unwrap().starts_with("00ffffffffffff00"));
        assert_eq!(dp.edid.as_deref().unwrap().len(), 256);
        assert_eq!(dp.options.value(&OptionKey::Mode), Some(Some("1920x1080")));
        assert_eq!(dp.options.value(&OptionKey::Pos), Some(Some("0x0")));
        assert_eq!(dp.options.value(&OptionKey::Rate), Some(Some("60.00")));
        assert_eq!(dp.options.value(&OptionKey::Crtc), Some(Some("0")));
        assert!(dp.options.contains(&OptionKey::Primary));
        // rotate=normal is a protocol default and must be stripped
        assert!(!dp.options.contains(&OptionKey::Rotate));
        // identity transform must be omitted entirely
        assert!(!dp.options.contains(&OptionKey::Transform));
        assert_eq!(
            dp.options.value(&OptionKey::property("aspect ratio")),
            Some(Some("Automatic"))
        );

        let hdmi = config.get("HDMI-1").unwrap();
        assert_eq!(hdmi.edid, None);
        assert!(hdmi.has_off_option());
        assert_eq!(hdmi.options.len(), 1);

        let modes = catalog.get("DP-1").unwrap();
        assert_eq!(modes.len(), 2);
        assert!(modes[0].preferred);
        assert_eq!(modes[0].width, 1920);
        assert_eq!(modes[1].name, "1280x1024");
        assert!((modes[1].refresh_hz - 60.02).abs() < 1e-9);
        assert!(catalog.get("HDMI-1").is_none());
    }

    #[test]
    fn gamma_is_reciprocal_and_rounded() {
        let (config, _) = parse_verbose(REPORT).unwrap();
        let dp = config.get("DP-1").unwrap();
        assert_eq!(dp.options.value(&OptionKey::Gamma), Some(Some("0.5:1.0:2.0")));
    }

    #[test]
    fn zero_gamma_multiplier_is_clamped_not_divided() {
        let value = reciprocal_gamma("DP-1", "0:1.0:1.0").unwrap();
        assert!(value.starts_with("0.0000000001:"));
    }

    #[test]
    fn rounded_gamma_keeps_three_decimals() {
        assert_eq!(reciprocal_gamma("DP-1", "1.1:1.1:1.1").unwrap(), "0.909:0.909:0.909");
    }

    #[test]
    fn disconnected_output_with_stale_geometry_still_emits_a_mode() {
        let report = "\
VGA-1 disconnected 1280x1024+0+0 (0x4a) left (normal left inverted right x axis y axis)
\tIdentifier: 0x44
\tCRTC:      0
";
        let (config, _) = parse_verbose(report).unwrap();
        let vga = config.get("VGA-1").unwrap();
        assert_eq!(vga.edid, None);
        assert!(!vga.has_off_option());
        // left rotation swaps the synthesized dimensions
        assert_eq!(vga.options.value(&OptionKey::Mode), Some(Some("1024x1280")));
        assert_eq!(vga.options.value(&OptionKey::Rotate), Some(Some("left")));
    }

    #[test]
    fn connected_without_payload_gets_placeholder_identity() {
        let report = "\
DVI-1 connected 1024x768+0+0 (0x40) normal (normal left inverted right x axis y axis) 0mm x 0mm
\tIdentifier: 0x45
  1024x768 (0x40) 65.000MHz +HSync +VSync *current
        h: width  1024 start 1048 end 1184 total 1344 skew    0 clock  48.36KHz
        v: height  768 start  771 end  777 total  806           clock  60.00Hz
";
        let (config, _) = parse_verbose(report).unwrap();
        let dvi = config.get("DVI-1").unwrap();
        assert_eq!(
            dvi.edid.as_deref(),
            Some("--CONNECTED-BUT-EDID-UNAVAILABLE-DVI-1")
        );
    }

    #[test]
    fn reflection_and_panning_are_captured() {
        let report = "\
DP-2 connected 1920x1080+0+0 (0x47) normal X axis panning 3840x1080+0+0 tracking 0x0+0+0 border 0/0/0/0 (normal left inverted right x axis y axis) 531mm x 299mm
\tIdentifier: 0x46
  1920x1080 (0x47) 148.500MHz +HSync +VSync *current +preferred
        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz
        v: height 1080 start 1084 end 1089 total 1125           clock  60.00Hz
";
        let (config, _) = parse_verbose(report).unwrap();
        let dp = config.get("DP-2").unwrap();
        assert_eq!(dp.options.value(&OptionKey::Reflect), Some(Some("x")));
        assert_eq!(
            dp.options.value(&OptionKey::Panning),
            Some(Some("3840x1080+0+0/0x0+0+0/0/0/0/0"))
        );
    }

    #[test]
    fn non_identity_transform_is_canonicalized() {
        let report = "\
DP-1 connected 1920x1080+0+0 (0x47) normal (normal left inverted right x axis y axis) 531mm x 299mm
\tIdentifier: 0x42
\tTransform: 1.500000 0.000000 -240.000000
\t           0.000000 1.500000 -135.000000
\t           0.000000 0.000000 1.000000
  1920x1080 (0x47) 148.500MHz +HSync +VSync *current +preferred
        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz
        v: height 1080 start 1084 end 1089 total 1125           clock  60.00Hz
";
        let (config, _) = parse_verbose(report).unwrap();
        let dp = config.get("DP-1").unwrap();
        assert_eq!(
            dp.options.value(&OptionKey::Transform),
            Some(Some(
                "1.500000,0.000000,-240.000000,0.000000,1.500000,-135.000000,0.000000,0.000000,1.000000"
            ))
        );
    }

    #[test]
    fn flush_left_garbage_is_fatal() {
        let report = REPORT.to_string() + "stray trailing line\n";
        let error = parse_verbose(&report).unwrap_err();
        assert!(matches!(error, ParseError::Unmatched { .. }));
    }

    #[test]
    fn unparseable_mode_table_is_fatal() {
        let report = "\
DP-1 connected 1920x1080+0+0 (0x47) normal (normal left inverted right x axis y axis) 531mm x 299mm
\tIdentifier: 0x42
  1920x1080 (0x47) 148.500MHz +HSync +VSync *current
        h: broken line without width
        v: also broken
";
        let error = parse_verbose(report).unwrap_err();
        assert!(matches!(error, ParseError::NoModes { .. }));
    }

    #[test]
    fn report_without_boundaries_is_fatal() {
        assert!(matches!(
            parse_verbose("Screen 0: nothing else\n"),
            Err(ParseError::NoBoundaries)
        ));
    }

    #[test]
    fn probe_version_parse_shape() {
        assert_eq!(RandrVersion::parse("1.5.1"), Some(RandrVersion::new(1, 5)));
    }
}
