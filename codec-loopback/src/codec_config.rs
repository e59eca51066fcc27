use serde::{Deserialize, Serialize};

use crate::settings::{HardwareAcceleration, LoopbackSettings};

/// Scalability mode for `n` temporal layers with a single spatial layer.
/// One layer needs no mode at all.
pub fn scalability_mode(num_temporal_layers: u32) -> Option<String> {
    if num_temporal_layers > 1 {
        Some(format!("L1T{}", num_temporal_layers))
    } else {
        None
    }
}

/// Mirrors the WebCodecs `VideoEncoderConfig` dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderConfig {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
    pub framerate: f64,
    pub hardware_acceleration: HardwareAcceleration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
}

impl EncoderConfig {
    pub fn from_settings(settings: &LoopbackSettings) -> Self {
        EncoderConfig {
            codec: settings.codec.clone(),
            width: settings.resolution.width,
            height: settings.resolution.height,
            bitrate: settings.bitrate,
            framerate: settings.framerate,
            hardware_acceleration: settings.acceleration,
            scalability_mode: scalability_mode(settings.num_temporal_layers),
        }
    }
}

/// Mirrors the WebCodecs `VideoDecoderConfig` dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub codec: String,
}

impl DecoderConfig {
    pub fn new(codec: impl Into<String>) -> Self {
        DecoderConfig {
            codec: codec.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeOptions {
    pub key_frame: bool,
}

/// `VideoFrameInit` for frames snapshotted from the preview element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInit {
    /// Microseconds.
    pub timestamp: f64,
}

impl FrameInit {
    pub fn from_epoch_millis(millis: f64) -> Self {
        FrameInit {
            timestamp: 1000.0 * millis,
        }
    }
}
