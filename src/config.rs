// Construction options for the widget plus the demo host's settings.
// Everything is optional in the TOML file; missing keys take the defaults below.

use crate::error::Result;
use crate::media::{FacingMode, StreamConstraints};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest blur (px) a roughness of 1.0 maps to.
pub const MAX_BLUR_PX: f64 = 16.0;

/// Linear remap of `number` from `[in_min, in_max]` to `[out_min, out_max]`.
/// Values outside the input range extrapolate; nothing is clamped.
pub fn scale(number: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    ((number - in_min) * (out_max - out_min)) / (in_max - in_min) + out_min
}

/// Roughness (nominally 0..1) to blur radius in pixels.
pub fn blur_radius(roughness: f64) -> i64 {
    // Ties round toward +inf, so -0.5px maps to 0 rather than -1.
    (scale(roughness, 0.0, 1.0, 0.0, MAX_BLUR_PX) + 0.5).floor() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonOptions {
    pub roughness: f64,
    /// Kept for callers that read it back; the widget never uses it.
    pub offset: f64,
    pub text: String,
    pub width: u32,
    pub height: u32,
    #[serde(alias = "borderRadius")]
    pub border_radius: u32,
    /// Unrecognized keys, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            roughness: 0.2,
            offset: -200.0,
            text: "Button".to_string(),
            width: 300,
            height: 100,
            border_radius: 56,
            extra: BTreeMap::new(),
        }
    }
}

impl ButtonOptions {
    pub fn blur_radius(&self) -> i64 {
        blur_radius(self.roughness)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self { index: 0, width: 600, height: 600, facing_mode: FacingMode::User }
    }
}

impl CameraSettings {
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            ideal_width: self.width,
            ideal_height: self.height,
            facing_mode: self.facing_mode,
            audio: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Identifies the host to the corner-radius shim. `None` uses the built-in agent string.
    pub user_agent: Option<String>,
    /// Empty space around the widget inside the window.
    pub margin: u32,
    /// Page colour behind the widget, 0x00RRGGBB.
    pub background: u32,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self { user_agent: None, margin: 48, background: 0x00_14_16_1A }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub button: ButtonOptions,
    pub camera: CameraSettings,
    pub host: HostSettings,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn blur_mapping_matches_rounded_scale() {
        assert_eq!(blur_radius(0.0), 0);
        assert_eq!(blur_radius(1.0), 16);
        assert_eq!(blur_radius(0.5), 8);
        assert_eq!(blur_radius(0.2), 3);
        assert_eq!(blur_radius(0.03), 0);
        assert_eq!(blur_radius(0.97), 16);
    }

    #[test]
    fn blur_mapping_is_not_clamped() {
        assert_eq!(blur_radius(2.0), 32);
        assert_eq!(blur_radius(-0.5), -8);
        assert_eq!(blur_radius(-1.0 / 32.0), 0);
        assert_eq!(blur_radius(-3.0 / 32.0), -1);
        assert_eq!(blur_radius(1.0 / 32.0), 1);
    }

    #[test]
    fn defaults_match_documented_values() {
        let o = ButtonOptions::default();
        assert_eq!(o.roughness, 0.2);
        assert_eq!(o.offset, -200.0);
        assert_eq!(o.text, "Button");
        assert_eq!((o.width, o.height), (300, 100));
        assert_eq!(o.border_radius, 56);
        assert!(o.extra.is_empty());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let c = Config::from_toml_str("").unwrap();
        assert_eq!(c, Config::default());
        assert_eq!(c.camera.constraints().ideal_width, 600);
        assert!(!c.camera.constraints().audio);
    }

    #[test]
    fn unknown_button_keys_pass_through() {
        let c = Config::from_toml_str(
            r#"
            [button]
            text = "Press"
            borderRadius = 12
            accent = "gold"
            "#,
        )
        .unwrap();
        assert_eq!(c.button.text, "Press");
        assert_eq!(c.button.border_radius, 12);
        assert_eq!(c.button.extra.get("accent"), Some(&toml::Value::String("gold".into())));
        assert_eq!(c.button.width, 300);
    }

    #[test]
    fn explicit_zero_roughness_is_kept() {
        let c = Config::from_toml_str("[button]\nroughness = 0.0\n").unwrap();
        assert_eq!(c.button.roughness, 0.0);
        assert_eq!(c.button.blur_radius(), 0);
    }

    #[test]
    fn facing_mode_parses() {
        let c = Config::from_toml_str("[camera]\nfacing_mode = \"environment\"\nindex = 2\n").unwrap();
        assert_eq!(c.camera.facing_mode, FacingMode::Environment);
        assert_eq!(c.camera.index, 2);
    }

    #[test]
    fn load_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[button]\nwidth = 420\n[host]\nmargin = 10").unwrap();
        let c = Config::load(f.path()).unwrap();
        assert_eq!(c.button.width, 420);
        assert_eq!(c.host.margin, 10);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = Config::from_toml_str("[button\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
