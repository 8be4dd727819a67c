//! Viewer configuration.
//!
//! [`ViewerConfig`] bundles everything that is tweakable without touching code:
//! surface creation flags, camera projection, orbit controls, asset paths and
//! the resize debounce. It can be read from a TOML file where every field is
//! optional and falls back to the showcase defaults.

use std::path::Path;

use instant::Duration;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file `{path}`: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// GPU preference requested when the adapter is selected.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
    Default,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::Default => wgpu::PowerPreference::None,
        }
    }
}

/// Curve applied to linear HDR colour before it is written to the surface.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToneMapping {
    #[default]
    AcesFilmic,
    None,
}

/// Flags used to acquire the render surface.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurfaceSettings {
    pub antialias: bool,
    pub power_preference: PowerPreference,
    /// Keeps the presented frame readable after presentation.
    pub preserve_drawing_buffer: bool,
    /// Upper bound for the device pixel ratio applied to the surface size.
    pub max_pixel_ratio: f64,
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
    pub clear_colour: [f64; 4],
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            antialias: true,
            power_preference: PowerPreference::HighPerformance,
            preserve_drawing_buffer: true,
            max_pixel_ratio: 2.0,
            tone_mapping: ToneMapping::AcesFilmic,
            tone_mapping_exposure: 0.8,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [1.0, 1.0, 5.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlSettings {
    pub enabled: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_damping: true,
            damping_factor: 0.05,
            enable_zoom: false,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetSettings {
    /// Directory (native) or URL path segment (web) all asset paths are relative to.
    pub root: String,
    pub environment: Option<String>,
    pub model: Option<String>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            root: "assets".to_string(),
            environment: Some("3d_Models_and_Background/horn-koppe_snow_4k.hdr".to_string()),
            model: Some("3d_Models_and_Background/armored_mech_noir_npr.glb".to_string()),
        }
    }
}

/// A unit cube that spins around x and y with the elapsed time.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CubeSettings {
    pub size: f32,
    pub color: [f32; 3],
}

impl Default for CubeSettings {
    fn default() -> Self {
        Self {
            size: 1.0,
            color: [1.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub surface: SurfaceSettings,
    pub camera: CameraSettings,
    pub controls: ControlSettings,
    pub assets: AssetSettings,
    pub resize_debounce_ms: u64,
    pub cube: Option<CubeSettings>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::showcase()
    }
}

impl ViewerConfig {
    /// HDRI background, glTF model and orbit controls.
    pub fn showcase() -> Self {
        Self {
            title: "hdri-viewer".to_string(),
            surface: SurfaceSettings::default(),
            camera: CameraSettings::default(),
            controls: ControlSettings::default(),
            assets: AssetSettings::default(),
            resize_debounce_ms: 200,
            cube: None,
        }
    }

    /// A single red cube rotating in front of the camera. No assets, no controls.
    pub fn spinning_cube() -> Self {
        Self {
            title: "spinning-cube".to_string(),
            surface: SurfaceSettings {
                tone_mapping: ToneMapping::None,
                tone_mapping_exposure: 1.0,
                ..Default::default()
            },
            camera: CameraSettings {
                fov_degrees: 65.0,
                near: 0.1,
                far: 100.0,
                position: [0.0, 0.0, 5.0],
                target: [0.0, 0.0, 0.0],
            },
            controls: ControlSettings {
                enabled: false,
                ..Default::default()
            },
            assets: AssetSettings {
                environment: None,
                model: None,
                ..Default::default()
            },
            cube: Some(CubeSettings::default()),
            ..Self::showcase()
        }
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Reads `path` if it exists and falls back to `fallback` otherwise.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or(path: impl AsRef<Path>, fallback: Self) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(fallback);
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_showcase_defaults() {
        let config = ViewerConfig::from_toml_str("", "inline").unwrap();
        assert_eq!(config, ViewerConfig::showcase());
        assert_eq!(config.resize_debounce(), Duration::from_millis(200));
        assert_eq!(config.controls.damping_factor, 0.05);
        assert!(!config.controls.enable_zoom);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let text = r#"
            resize_debounce_ms = 50

            [surface]
            power_preference = "low-power"

            [camera]
            fov_degrees = 60.0

            [cube]
            color = [0.0, 1.0, 0.0]
        "#;
        let config = ViewerConfig::from_toml_str(text, "inline").unwrap();
        assert_eq!(config.resize_debounce_ms, 50);
        assert_eq!(config.surface.power_preference, PowerPreference::LowPower);
        assert!(config.surface.antialias);
        assert_eq!(config.camera.fov_degrees, 60.0);
        assert_eq!(config.camera.far, 1000.0);
        let cube = config.cube.unwrap();
        assert_eq!(cube.color, [0.0, 1.0, 0.0]);
        assert_eq!(cube.size, 1.0);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let err = ViewerConfig::from_toml_str("[camera]\nfov_degrees = \"wide\"", "inline")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back() {
        let config =
            ViewerConfig::load_or("does/not/exist/viewer.toml", ViewerConfig::spinning_cube())
                .unwrap();
        assert_eq!(config.camera.fov_degrees, 65.0);
        assert!(config.assets.model.is_none());
        assert!(!config.controls.enabled);
        assert_eq!(config.surface.tone_mapping, ToneMapping::None);
    }

    #[test]
    fn tone_mapping_can_be_switched_off() {
        let config =
            ViewerConfig::from_toml_str("[surface]\ntone_mapping = \"none\"", "inline").unwrap();
        assert_eq!(config.surface.tone_mapping, ToneMapping::None);
        assert_eq!(config.surface.tone_mapping_exposure, 0.8);
    }
}
