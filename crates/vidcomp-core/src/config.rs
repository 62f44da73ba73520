use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::features::{option_groups, parse_enabled};
use crate::{Features, VideoError};

/// Colour painted around the video when it does not fill the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterboxColour {
    #[default]
    Black,
    Gray25,
}

impl LetterboxColour {
    /// Clear colour as RGBA bytes.
    pub fn clear_rgba(self) -> [u8; 4] {
        match self {
            LetterboxColour::Black => [0, 0, 0, 0],
            LetterboxColour::Gray25 => [127, 127, 127, 127],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "black" => Some(LetterboxColour::Black),
            "gray25" | "grey25" => Some(LetterboxColour::Gray25),
            _ => None,
        }
    }
}

/// What the option string asks of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Features not disabled by the user.
    pub enabled: Features,
    /// Use bicubic rather than a plain blit when upscaling.
    pub bicubic_upscale: bool,
}

impl RenderOptions {
    pub fn parse(options: &str) -> Self {
        let bicubic_upscale = option_groups(options).iter().any(|(key, values)| {
            matches!(key.as_str(), "openglbicubic" | "bicubic")
                || values.iter().any(|v| v == "openglbicubic" || v == "bicubic")
        });
        Self {
            enabled: parse_enabled(options),
            bicubic_upscale,
        }
    }
}

/// Read-only key/value settings store.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Output configuration of one compositor instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoOutputConfig {
    /// Comma separated `key=value` option string, see [`crate::features::negotiate`].
    pub options: String,
    pub letterbox: LetterboxColour,
    pub allow_upscale: bool,
    /// Frames arrive as RGBA from a hardware decoder.
    pub hardware_decoded: bool,
    /// This instance owns the viewport and clears the window.
    pub viewport_control: bool,
    /// Name of the deinterlacer applied by the CPU before upload (may be empty).
    pub software_deinterlacer: String,
    /// Name of the shader deinterlacer (may be empty).
    pub hardware_deinterlacer: String,
}

impl Default for VideoOutputConfig {
    fn default() -> Self {
        Self {
            options: String::new(),
            letterbox: LetterboxColour::Black,
            allow_upscale: true,
            hardware_decoded: false,
            viewport_control: true,
            software_deinterlacer: String::new(),
            hardware_deinterlacer: String::new(),
        }
    }
}

impl VideoOutputConfig {
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| VideoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: VideoOutputConfig =
            serde_json::from_str(&text).map_err(|source| VideoError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    /// Reads the `OpenGL*` keys. Missing or unparsable values keep their defaults.
    pub fn from_settings(settings: &dyn SettingsSource) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = settings.get("OpenGLOptions") {
            cfg.options = v;
        }
        if let Some(v) = settings.get("OpenGLLetterboxColour") {
            match LetterboxColour::from_name(&v) {
                Some(c) => cfg.letterbox = c,
                None => tracing::warn!(value = %v, "unknown letterbox colour, using black"),
            }
        }
        let flags: [(&str, &mut bool); 3] = [
            ("OpenGLAllowUpscale", &mut cfg.allow_upscale),
            ("OpenGLHardwareDecoded", &mut cfg.hardware_decoded),
            ("OpenGLViewportControl", &mut cfg.viewport_control),
        ];
        for (key, slot) in flags {
            if let Some(b) = settings.get(key).as_deref().and_then(parse_bool) {
                *slot = b;
            }
        }
        if let Some(v) = settings.get("OpenGLSoftwareDeinterlacer") {
            cfg.software_deinterlacer = v.trim().to_owned();
        }
        if let Some(v) = settings.get("OpenGLHardwareDeinterlacer") {
            cfg.hardware_deinterlacer = v.trim().to_owned();
        }
        cfg
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::parse(&self.options)
    }

    fn validate(&self, path: &Path) -> Result<(), VideoError> {
        let hw = self.hardware_deinterlacer.trim();
        if !hw.is_empty() && !hw.starts_with("opengl") {
            return Err(VideoError::InvalidConfig {
                path: PathBuf::from(path),
                msg: format!("hardware_deinterlacer '{hw}' is not a shader deinterlacer"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bicubic_token_is_found_standalone_or_in_a_list() {
        assert!(RenderOptions::parse("openglbicubic").bicubic_upscale);
        assert!(RenderOptions::parse("opengloptions=nopbo,openglbicubic").bicubic_upscale);
        assert!(!RenderOptions::parse("opengloptions=nopbo").bicubic_upscale);
    }

    #[test]
    fn settings_override_defaults() {
        let mut s = HashMap::new();
        s.insert("OpenGLOptions".to_string(), "openglbicubic".to_string());
        s.insert("OpenGLLetterboxColour".to_string(), "gray25".to_string());
        s.insert("OpenGLAllowUpscale".to_string(), "0".to_string());
        s.insert("OpenGLHardwareDeinterlacer".to_string(), " openglyadif ".to_string());

        let cfg = VideoOutputConfig::from_settings(&s);
        assert_eq!(cfg.letterbox, LetterboxColour::Gray25);
        assert!(!cfg.allow_upscale);
        assert!(cfg.viewport_control);
        assert_eq!(cfg.hardware_deinterlacer, "openglyadif");
        assert!(cfg.render_options().bicubic_upscale);
    }

    #[test]
    fn json_uses_defaults_for_missing_fields() {
        let cfg: VideoOutputConfig =
            serde_json::from_str(r#"{ "letterbox": "gray25", "hardware_decoded": true }"#)
                .expect("parse");
        assert_eq!(cfg.letterbox.clear_rgba(), [127; 4]);
        assert!(cfg.hardware_decoded);
        assert!(cfg.allow_upscale);
    }

    #[test]
    fn json_file_round_trip_and_validation() {
        let dir = std::env::temp_dir().join(format!("vidcomp-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("tmp dir");

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{ "hardware_deinterlacer": "opengllinearblend" }"#).expect("write");
        let cfg = VideoOutputConfig::from_json_path(&good).expect("load");
        assert_eq!(cfg.hardware_deinterlacer, "opengllinearblend");

        let bad = dir.join("bad.json");
        std::fs::write(&bad, r#"{ "hardware_deinterlacer": "linearblend" }"#).expect("write");
        assert!(matches!(
            VideoOutputConfig::from_json_path(&bad),
            Err(VideoError::InvalidConfig { .. })
        ));

        assert!(matches!(
            VideoOutputConfig::from_json_path(dir.join("missing.json")),
            Err(VideoError::Io { .. })
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
