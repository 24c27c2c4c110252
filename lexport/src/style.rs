//! Style pass
//!
//! Translates named colour styles into source-highlight style files and a
//! 256-colour escape-sequence output language. Each style's colours form a
//! palette; every logical colour name of the target is bound to the closest
//! palette colour and to the nearest xterm-256 index.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::StyleError;
use crate::token::{Taxonomy, TokenType};

/// An RGB triple
pub type Rgb = (u8, u8, u8);

/// Name of the output language table file
pub const OUTLANG_MAP: &str = "outlang.map";

/// The target's logical colour names
pub const LOGICAL_COLORS: [(&str, Rgb); 18] = [
    ("black", (0, 0, 0)),
    ("red", (255, 0, 0)),
    ("darkred", (170, 0, 0)),
    ("brown", (170, 85, 0)),
    ("yellow", (255, 255, 0)),
    ("cyan", (0, 255, 255)),
    ("blue", (0, 0, 255)),
    ("pink", (255, 0, 255)),
    ("purple", (170, 0, 170)),
    ("orange", (252, 127, 0)),
    ("brightorange", (252, 170, 0)),
    ("green", (0, 255, 0)),
    ("brightgreen", (85, 255, 85)),
    ("darkgreen", (0, 128, 0)),
    ("teal", (0, 128, 128)),
    ("gray", (170, 170, 170)),
    ("darkblue", (0, 0, 170)),
    ("white", (255, 255, 255)),
];

const MODIFIERS: [(&str, &str); 3] = [("bold", "b"), ("italic", "i"), ("underline", "u")];

/// Parts that only switch attributes off and have no equivalent
const IGNORED: [&str; 4] = ["noinherit", "nobold", "noitalic", "nounderline"];

/// A set of named styles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleSheet {
    /// Styles in file order
    pub styles: Vec<StyleDef>,
}

impl StyleSheet {
    /// Parse a style sheet from its JSON text
    pub fn from_json(text: &str) -> Result<Self, StyleError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a style sheet file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StyleError> {
        let text = std::fs::read_to_string(path)?;
        StyleSheet::from_json(&text)
    }
}

/// One named style: token category to style string
///
/// Style strings combine `#rrggbb` / `#rgb` colours, `bg:` colours and the
/// `bold`, `italic`, `underline` modifiers. An empty string inherits the
/// parent category's style.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleDef {
    /// Style name, e.g. `monokai`
    pub name: String,
    /// Token category to style string
    pub styles: BTreeMap<TokenType, String>,
}

/// Rendered artifacts of one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleArtifacts {
    /// Style name
    pub name: String,
    /// `<name>.style` contents
    pub style: String,
    /// `<name>_esc256.outlang` contents
    pub outlang: String,
}

impl StyleArtifacts {
    /// File name of the style file
    pub fn style_file(&self) -> String {
        format!("{}.style", self.name.to_lowercase())
    }

    /// Output language name, as listed in `outlang.map`
    pub fn outlang_name(&self) -> String {
        format!("{}_esc256", self.name.to_lowercase())
    }

    /// File name of the output language
    pub fn outlang_file(&self) -> String {
        format!("{}.outlang", self.outlang_name())
    }
}

/// Logical colour bindings for one palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorMap {
    names_to_hexes: BTreeMap<&'static str, String>,
    hexes_to_names: BTreeMap<String, &'static str>,
    names_to_short: BTreeMap<&'static str, u8>,
}

impl ColorMap {
    /// Bind every logical colour to its closest palette colour
    pub fn new(palette: &BTreeMap<String, Rgb>) -> Option<Self> {
        if palette.is_empty() {
            return None;
        }
        let mut names_to_hexes = BTreeMap::new();
        let mut hexes_to_names = BTreeMap::new();
        let mut names_to_short = BTreeMap::new();
        for (name, target) in LOGICAL_COLORS {
            let (hex, rgb) = closest(target, palette.iter().map(|(h, rgb)| (h.as_str(), *rgb)))?;
            names_to_hexes.insert(name, hex.to_string());
            hexes_to_names.insert(hex.to_string(), name);
            names_to_short.insert(name, xterm256(rgb));
        }
        Some(ColorMap {
            names_to_hexes,
            hexes_to_names,
            names_to_short,
        })
    }

    /// Palette colour bound to a logical name
    pub fn hex(&self, name: &str) -> Option<&str> {
        self.names_to_hexes.get(name).map(String::as_str)
    }

    /// xterm-256 index bound to a logical name
    pub fn short(&self, name: &str) -> Option<u8> {
        self.names_to_short.get(name).copied()
    }

    /// Logical name for a hex colour
    ///
    /// Colours no logical name was bound to take the nearest logical colour.
    pub fn name_for(&self, hex: &str) -> Option<&'static str> {
        if let Some(name) = self.hexes_to_names.get(hex) {
            return Some(*name);
        }
        let rgb = parse_hex(hex)?;
        closest(rgb, LOGICAL_COLORS.iter().copied()).map(|(name, _)| name)
    }

    /// The default foreground: the largest bound hex value
    pub fn foreground(&self) -> Option<&str> {
        self.hexes_to_names.keys().next_back().map(String::as_str)
    }
}

fn distance(a: Rgb, b: Rgb) -> u32 {
    let d = |x: u8, y: u8| (i32::from(x) - i32::from(y)).pow(2) as u32;
    d(a.0, b.0) + d(a.1, b.1) + d(a.2, b.2)
}

/// The candidate nearest to `target`; the first one wins ties
fn closest<K>(target: Rgb, candidates: impl Iterator<Item = (K, Rgb)>) -> Option<(K, Rgb)> {
    let mut best: Option<(K, Rgb, u32)> = None;
    for (key, rgb) in candidates {
        let d = distance(target, rgb);
        if best.as_ref().is_none_or(|(_, _, bd)| d < *bd) {
            best = Some((key, rgb, d));
        }
    }
    best.map(|(key, rgb, _)| (key, rgb))
}

/// Nearest xterm-256 colour index, from the colour cube and the grey ramp
pub fn xterm256(rgb: Rgb) -> u8 {
    const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
    let cube = (0..216u16).map(|i| {
        let (r, g, b) = (i / 36, (i / 6) % 6, i % 6);
        (
            16 + i,
            (LEVELS[r as usize], LEVELS[g as usize], LEVELS[b as usize]),
        )
    });
    let grays = (0..24u16).map(|i| {
        let level = (8 + 10 * i) as u8;
        (232 + i, (level, level, level))
    });
    closest(rgb, cube.chain(grays)).map_or(16, |(index, _)| index as u8)
}

/// Parse `rgb` or `rrggbb` (without `#`)
fn parse_hex(hex: &str) -> Option<Rgb> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Normalized six-digit lowercase hex for a `#...` colour
fn color_hex(color: &str) -> Result<String, StyleError> {
    let hex = color.trim_start_matches('#').to_lowercase();
    let rgb = parse_hex(&hex).ok_or_else(|| StyleError::InvalidColor(color.to_string()))?;
    Ok(format!("{:02x}{:02x}{:02x}", rgb.0, rgb.1, rgb.2))
}

/// Every colour a style uses
pub fn palette(style: &StyleDef) -> Result<BTreeMap<String, Rgb>, StyleError> {
    let mut colors = BTreeMap::new();
    for spec in style.styles.values() {
        for part in spec.split_whitespace() {
            let color = part
                .strip_prefix("bg:")
                .or_else(|| part.strip_prefix("border:"))
                .unwrap_or(part);
            if color.starts_with('#') {
                let hex = color_hex(color)?;
                if let Some(rgb) = parse_hex(&hex) {
                    colors.insert(hex, rgb);
                }
            }
        }
    }
    Ok(colors)
}

/// Translate one style string to the target's colour syntax
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use lexport::style::{ColorMap, translate_color};
///
/// let palette = BTreeMap::from([("ff0000".to_string(), (255, 0, 0))]);
/// let colors = ColorMap::new(&palette).unwrap();
/// assert_eq!(translate_color("bold #f00", &colors).unwrap(), "white b");
/// ```
pub fn translate_color(spec: &str, colors: &ColorMap) -> Result<String, StyleError> {
    let untranslatable = || StyleError::Untranslatable(spec.to_string());
    let mut translated = Vec::new();
    let mut modifiers = Vec::new();
    for part in spec.split_whitespace() {
        if let Some(color) = part.strip_prefix("bg:") {
            if color.is_empty() {
                continue;
            }
            let name = colors.name_for(&color_hex(color)?).ok_or_else(untranslatable)?;
            translated.push(format!("bg:{}", name));
        } else if part.starts_with('#') {
            let name = colors.name_for(&color_hex(part)?).ok_or_else(untranslatable)?;
            translated.push(name.to_string());
        } else if let Some((_, short)) = MODIFIERS.iter().find(|(m, _)| *m == part) {
            modifiers.push(*short);
        } else if IGNORED.contains(&part) {
            continue;
        } else {
            return Err(untranslatable());
        }
    }
    if !modifiers.is_empty() {
        translated.push(modifiers.join(", "));
    }
    Ok(translated.join(" "))
}

/// Render the `.style` file and the escape-sequence output language
pub fn generate_style(style: &StyleDef) -> Result<StyleArtifacts, StyleError> {
    info!(style = %style.name, "generating style");
    let palette = palette(style)?;
    let colors =
        ColorMap::new(&palette).ok_or_else(|| StyleError::EmptyPalette(style.name.clone()))?;
    let foreground = colors
        .foreground()
        .map(|hex| format!("#{}", hex))
        .ok_or_else(|| StyleError::EmptyPalette(style.name.clone()))?;
    debug!(style = %style.name, colors = palette.len(), %foreground, "palette");

    let taxonomy: Taxonomy<&String> = style.styles.iter().map(|(t, s)| (t.clone(), s)).collect();
    let mut lines = String::new();
    for token in style.styles.keys() {
        let spec = taxonomy
            .lookup_with(token, |s| !s.trim().is_empty())
            .map_or(foreground.as_str(), |s| s.as_str());
        let translated = translate_color(spec, &colors)?;
        lines.push_str(&format!("{} {};\n", token.rule_name(), translated));
    }

    Ok(StyleArtifacts {
        name: style.name.clone(),
        style: lines,
        outlang: render_outlang(&style.name, &colors),
    })
}

fn render_outlang(name: &str, colors: &ColorMap) -> String {
    let map: Vec<String> = colors
        .names_to_short
        .iter()
        .map(|(name, short)| format!("\"{}\" \"{}\"", name, short))
        .collect();
    format!(
        "# style map for {name}\n\
         extension \"txt\"\n\
         \n\
         styletemplate \"\\x1b[$stylem$text\\x1b[m\"\n\
         color \"00;38;05;$style\"\n\
         \n\
         colormap\n\
         {colors}\n\
         default \"255\"\n\
         end\n",
        name = name,
        colors = map.join("\n")
    )
}

/// `outlang.map` contents for generated output languages
pub fn render_outlang_map<'a>(names: impl IntoIterator<Item = &'a StyleArtifacts>) -> String {
    let entries: BTreeMap<String, String> = names
        .into_iter()
        .map(|a| (a.outlang_name(), a.outlang_file()))
        .collect();
    entries
        .iter()
        .map(|(name, file)| format!("{} = {}\n", name, file))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(entries: &[(&str, &str)]) -> StyleDef {
        StyleDef {
            name: "Test".into(),
            styles: entries
                .iter()
                .map(|(t, s)| (TokenType::new(t).unwrap(), s.to_string()))
                .collect(),
        }
    }

    fn sample_style() -> StyleDef {
        style(&[
            ("Token", "#ffffff"),
            ("Keyword", "bold #ff0000"),
            ("Keyword.Constant", ""),
            ("Comment", "italic #000"),
            ("Error", "bg:#ff0000 #ffffff"),
        ])
    }

    #[test]
    fn test_xterm256() {
        assert_eq!(xterm256((0, 0, 0)), 16);
        assert_eq!(xterm256((255, 0, 0)), 196);
        assert_eq!(xterm256((255, 255, 255)), 231);
        assert_eq!(xterm256((128, 128, 128)), 244);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex("1e0010"), Some((30, 0, 16)));
        assert_eq!(parse_hex("12345"), None);
        assert_eq!(parse_hex("zzzzzz"), None);
    }

    #[test]
    fn test_palette_collects_all_colours() {
        let palette = palette(&sample_style()).unwrap();
        let keys: Vec<&str> = palette.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["000000", "ff0000", "ffffff"]);
    }

    #[test]
    fn test_color_map_binds_closest() {
        let colors = ColorMap::new(&palette(&sample_style()).unwrap()).unwrap();
        assert_eq!(colors.hex("black"), Some("000000"));
        assert_eq!(colors.hex("orange"), Some("ff0000"));
        assert_eq!(colors.hex("gray"), Some("ffffff"));
        assert_eq!(colors.short("red"), Some(196));
        // the last logical colour bound to a hex names it
        assert_eq!(colors.name_for("000000"), Some("darkblue"));
        assert_eq!(colors.name_for("ff0000"), Some("brightorange"));
        assert_eq!(colors.foreground(), Some("ffffff"));
    }

    #[test]
    fn test_unbound_hex_takes_nearest_logical() {
        let palette = BTreeMap::from([("ff0000".to_string(), (255, 0, 0))]);
        let colors = ColorMap::new(&palette).unwrap();
        assert_eq!(colors.name_for("00ff00"), Some("green"));
    }

    #[test]
    fn test_translate_color() {
        let colors = ColorMap::new(&palette(&sample_style()).unwrap()).unwrap();
        assert_eq!(
            translate_color("bold italic #ff0000", &colors).unwrap(),
            "brightorange b, i"
        );
        assert_eq!(
            translate_color("bg:#ff0000 #fff", &colors).unwrap(),
            "bg:brightorange white"
        );
        assert_eq!(translate_color("noinherit underline", &colors).unwrap(), "u");
        assert_eq!(
            translate_color("mono #fff", &colors),
            Err(StyleError::Untranslatable("mono #fff".into()))
        );
        assert_eq!(
            translate_color("#ggg", &colors),
            Err(StyleError::InvalidColor("#ggg".into()))
        );
    }

    #[test]
    fn test_generate_style_file() {
        let artifacts = generate_style(&sample_style()).unwrap();
        assert_eq!(
            artifacts.style,
            "Token white;\n\
             Token_Comment darkblue i;\n\
             Token_Error bg:brightorange white;\n\
             Token_Keyword brightorange b;\n\
             Token_Keyword_Constant brightorange b;\n"
        );
        assert_eq!(artifacts.style_file(), "test.style");
        assert_eq!(artifacts.outlang_file(), "test_esc256.outlang");
    }

    #[test]
    fn test_missing_colour_takes_foreground() {
        let artifacts = generate_style(&style(&[
            ("Name", ""),
            ("Keyword", "#ff0000"),
            ("Text", "#00ff00"),
        ]))
        .unwrap();
        let name_line = artifacts
            .style
            .lines()
            .find(|l| l.starts_with("Token_Name "))
            .unwrap()
            .to_string();
        // largest bound hex is ff0000, last bound to brightorange
        assert_eq!(name_line, "Token_Name brightorange;");
    }

    #[test]
    fn test_outlang() {
        let artifacts = generate_style(&sample_style()).unwrap();
        assert!(artifacts.outlang.starts_with("# style map for Test\nextension \"txt\"\n"));
        assert!(artifacts.outlang.contains("styletemplate \"\\x1b[$stylem$text\\x1b[m\"\n"));
        assert!(artifacts.outlang.contains("colormap\n\"black\" \"16\"\n\"blue\" \"16\"\n"));
        assert!(artifacts.outlang.contains("\"white\" \"231\"\n\"yellow\" \"196\"\ndefault \"255\"\nend\n"));
        assert_eq!(
            render_outlang_map([&artifacts]),
            "test_esc256 = test_esc256.outlang\n"
        );
    }

    #[test]
    fn test_empty_palette() {
        assert_eq!(
            generate_style(&style(&[("Keyword", "bold")])),
            Err(StyleError::EmptyPalette("Test".into()))
        );
    }

    #[test]
    fn test_style_sheet_json() {
        let sheet = StyleSheet::from_json(
            r##"{"styles": [{"name": "mini", "background": "#000",
                 "styles": {"Token": "#fff", "Keyword": "bold #f00"}}]}"##,
        )
        .unwrap();
        assert_eq!(sheet.styles.len(), 1);
        assert_eq!(sheet.styles[0].styles.len(), 2);
        assert!(StyleSheet::from_json("{").is_err());
    }
}
