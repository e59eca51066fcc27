use serde::{Deserialize, Serialize};

use crate::settings::LoopbackSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy> Range<T> {
    pub fn exact(value: T) -> Self {
        Range {
            min: value,
            max: value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: Range<u32>,
    pub height: Range<u32>,
    pub frame_rate: Range<f64>,
}

/// Argument of `getUserMedia`. Video only, pinned to the selected resolution
/// and framerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: VideoConstraints,
}

impl MediaConstraints {
    pub fn from_settings(settings: &LoopbackSettings) -> Self {
        MediaConstraints {
            audio: false,
            video: VideoConstraints {
                width: Range::exact(settings.resolution.width),
                height: Range::exact(settings.resolution.height),
                frame_rate: Range::exact(settings.framerate),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    mod success {
        use crate::{
            constraints::MediaConstraints,
            settings::{LoopbackSettings, Resolution},
        };
        use serde_json::json;

        #[test]
        fn pinned_to_selection() {
            let settings = LoopbackSettings {
                resolution: Resolution::new(1280, 720),
                framerate: 24.0,
                ..Default::default()
            };
            let constraints = MediaConstraints::from_settings(&settings);

            let expected = json!({
                "audio": false,
                "video": {
                    "width": { "min": 1280, "max": 1280 },
                    "height": { "min": 720, "max": 720 },
                    "frameRate": { "min": 24.0, "max": 24.0 },
                },
            });
            assert_eq!(serde_json::to_value(&constraints).unwrap(), expected);
        }
    }
}
