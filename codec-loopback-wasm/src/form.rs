use anyhow::{Context, Result, anyhow};
use codec_loopback::LoopbackSettings;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlInputElement, HtmlSelectElement};

pub fn element_by_id<T: JsCast>(document: &Document, id: &str) -> Result<T> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("#{} not found", id))?
        .dyn_into::<T>()
        .map_err(|_| anyhow!("#{} has an unexpected element type", id))
}

/// The seven controls that make up a loopback run.
pub struct FormControls {
    video_codec: HtmlSelectElement,
    video_resolution: HtmlSelectElement,
    video_frame_rate: HtmlSelectElement,
    video_bitrate: HtmlInputElement,
    num_temporal_layers: HtmlSelectElement,
    acceleration: HtmlSelectElement,
    frame_source: HtmlSelectElement,
}

impl FormControls {
    pub fn bind(document: &Document) -> Result<Self> {
        Ok(FormControls {
            video_codec: element_by_id(document, "videoCodec")?,
            video_resolution: element_by_id(document, "videoResolution")?,
            video_frame_rate: element_by_id(document, "videoFrameRate")?,
            video_bitrate: element_by_id(document, "videoBitrate")?,
            num_temporal_layers: element_by_id(document, "numTemporalLayers")?,
            acceleration: element_by_id(document, "acceleration")?,
            frame_source: element_by_id(document, "frameSource")?,
        })
    }

    pub fn read_settings(&self) -> Result<LoopbackSettings> {
        LoopbackSettings::from_form(
            &self.video_codec.value(),
            &self.video_resolution.value(),
            &self.video_frame_rate.value(),
            &self.video_bitrate.value(),
            &self.num_temporal_layers.value(),
            &self.acceleration.value(),
            &self.frame_source.value(),
        )
        .context("Failed to read loopback settings from the form")
    }
}
