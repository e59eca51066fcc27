use std::{fmt, str::FromStr};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BITRATE, DEFAULT_CODEC, DEFAULT_FRAMERATE, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    /// Parses the `<width>x<height>` form used by the resolution select.
    fn from_str(s: &str) -> Result<Self> {
        let Some((width, height)) = s.trim().split_once('x') else {
            bail!("Resolution must be <width>x<height>: {:?}", s);
        };
        let width: u32 = width
            .trim()
            .parse()
            .with_context(|| format!("Invalid resolution width: {:?}", s))?;
        let height: u32 = height
            .trim()
            .parse()
            .with_context(|| format!("Invalid resolution height: {:?}", s))?;
        if width == 0 || height == 0 {
            bail!("Resolution must not be empty: {:?}", s);
        }
        Ok(Resolution::new(width, height))
    }
}

impl TryFrom<String> for Resolution {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HardwareAcceleration {
    #[default]
    #[serde(alias = "allow")]
    NoPreference,
    #[serde(alias = "require")]
    PreferHardware,
    #[serde(alias = "deny")]
    PreferSoftware,
}

impl FromStr for HardwareAcceleration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "no-preference" | "allow" => Ok(HardwareAcceleration::NoPreference),
            "prefer-hardware" | "require" => Ok(HardwareAcceleration::PreferHardware),
            "prefer-software" | "deny" => Ok(HardwareAcceleration::PreferSoftware),
            other => bail!("Unknown hardware acceleration: {:?}", other),
        }
    }
}

/// Where raw frames come from: the camera track itself, or periodic
/// snapshots of the preview element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameSource {
    #[default]
    Camera,
    Canvas,
}

impl From<&str> for FrameSource {
    fn from(value: &str) -> Self {
        match value.trim() {
            "camera" => FrameSource::Camera,
            _ => FrameSource::Canvas,
        }
    }
}

impl From<String> for FrameSource {
    fn from(value: String) -> Self {
        FrameSource::from(value.as_str())
    }
}

impl From<FrameSource> for String {
    fn from(value: FrameSource) -> Self {
        match value {
            FrameSource::Camera => "camera".to_string(),
            FrameSource::Canvas => "canvas".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopbackSettings {
    pub codec: String,
    pub resolution: Resolution,
    pub framerate: f64,
    pub bitrate: u64,
    pub num_temporal_layers: u32,
    pub acceleration: HardwareAcceleration,
    pub frame_source: FrameSource,
}

impl Default for LoopbackSettings {
    fn default() -> Self {
        LoopbackSettings {
            codec: DEFAULT_CODEC.to_string(),
            resolution: Resolution::default(),
            framerate: DEFAULT_FRAMERATE,
            bitrate: DEFAULT_BITRATE,
            num_temporal_layers: 1,
            acceleration: HardwareAcceleration::default(),
            frame_source: FrameSource::default(),
        }
    }
}

impl LoopbackSettings {
    /// Builds settings from the raw values of the page's form controls.
    #[allow(clippy::too_many_arguments)]
    pub fn from_form(
        codec: &str,
        resolution: &str,
        framerate: &str,
        bitrate: &str,
        num_temporal_layers: &str,
        acceleration: &str,
        frame_source: &str,
    ) -> Result<Self> {
        let settings = LoopbackSettings {
            codec: codec.trim().to_string(),
            resolution: resolution.parse::<Resolution>().context("videoResolution")?,
            framerate: framerate
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid videoFrameRate: {:?}", framerate))?,
            bitrate: bitrate
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid videoBitrate: {:?}", bitrate))?,
            num_temporal_layers: num_temporal_layers
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid numTemporalLayers: {:?}", num_temporal_layers))?,
            acceleration: acceleration
                .parse::<HardwareAcceleration>()
                .context("acceleration")?,
            frame_source: FrameSource::from(frame_source),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.codec.is_empty() {
            bail!("videoCodec must not be empty");
        }
        if !(self.framerate.is_finite() && self.framerate > 0.0) {
            bail!("videoFrameRate must be positive: {}", self.framerate);
        }
        if self.bitrate == 0 {
            bail!("videoBitrate must be positive");
        }
        Ok(())
    }

    /// Period of the snapshot timer used by [`FrameSource::Canvas`].
    pub fn frame_interval_millis(&self) -> f64 {
        1000.0 / self.framerate
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use crate::settings::{FrameSource, HardwareAcceleration, LoopbackSettings, Resolution};

        #[test]
        fn parse_resolution() {
            let resolution: Resolution = "1280x720".parse().unwrap();
            assert_eq!(resolution, Resolution::new(1280, 720));
            assert_eq!(resolution.to_string(), "1280x720");
        }

        #[test]
        fn parse_acceleration_with_legacy_values() {
            let cases = [
                ("no-preference", HardwareAcceleration::NoPreference),
                ("prefer-hardware", HardwareAcceleration::PreferHardware),
                ("prefer-software", HardwareAcceleration::PreferSoftware),
                ("allow", HardwareAcceleration::NoPreference),
                ("require", HardwareAcceleration::PreferHardware),
                ("deny", HardwareAcceleration::PreferSoftware),
            ];
            for (value, expected) in cases {
                assert_eq!(value.parse::<HardwareAcceleration>().unwrap(), expected);
            }
        }

        #[test]
        fn frame_source_falls_back_to_canvas() {
            assert_eq!(FrameSource::from("camera"), FrameSource::Camera);
            assert_eq!(FrameSource::from("canvas"), FrameSource::Canvas);
            assert_eq!(FrameSource::from("anything"), FrameSource::Canvas);
        }

        #[test]
        fn from_form() {
            let settings = LoopbackSettings::from_form(
                "vp09.00.10.08",
                "640x480",
                "15",
                "500000",
                "3",
                "prefer-hardware",
                "canvas",
            )
            .unwrap();

            let expected = LoopbackSettings {
                codec: "vp09.00.10.08".to_string(),
                resolution: Resolution::new(640, 480),
                framerate: 15.0,
                bitrate: 500_000,
                num_temporal_layers: 3,
                acceleration: HardwareAcceleration::PreferHardware,
                frame_source: FrameSource::Canvas,
            };
            assert_eq!(settings, expected);
            assert!((settings.frame_interval_millis() - 1000.0 / 15.0).abs() < f64::EPSILON);
        }

        #[test]
        fn deserialize_partial_object() {
            let settings: LoopbackSettings = serde_json::from_str(
                r#"{"codec":"avc1.42001f","resolution":"1920x1080","numTemporalLayers":2,"acceleration":"deny"}"#,
            )
            .unwrap();

            assert_eq!(settings.codec, "avc1.42001f");
            assert_eq!(settings.resolution, Resolution::new(1920, 1080));
            assert_eq!(settings.num_temporal_layers, 2);
            assert_eq!(settings.acceleration, HardwareAcceleration::PreferSoftware);
            assert_eq!(settings.framerate, 30.0);
            assert_eq!(settings.frame_source, FrameSource::Camera);
        }
    }

    mod failure {
        use crate::settings::{LoopbackSettings, Resolution};

        #[test]
        fn malformed_resolution() {
            for value in ["640", "x480", "640x", "axb", "0x480", "640x0", ""] {
                assert!(value.parse::<Resolution>().is_err(), "{value:?}");
            }
        }

        #[test]
        fn unknown_acceleration() {
            let result =
                LoopbackSettings::from_form("vp8", "640x480", "30", "1000", "1", "gpu", "camera");
            assert!(result.is_err());
        }

        #[test]
        fn empty_codec() {
            let result =
                LoopbackSettings::from_form("  ", "640x480", "30", "1000", "1", "allow", "camera");
            assert!(result.is_err());
        }

        #[test]
        fn non_positive_framerate() {
            let result =
                LoopbackSettings::from_form("vp8", "640x480", "0", "1000", "1", "allow", "camera");
            assert!(result.is_err());
        }

        #[test]
        fn non_numeric_bitrate() {
            let result = LoopbackSettings::from_form(
                "vp8", "640x480", "30", "fast", "1", "allow", "camera",
            );
            assert!(result.is_err());
        }
    }
}
