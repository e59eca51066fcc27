use anyhow::{Result, anyhow, bail};
use codec_loopback::{FrameInit, MediaConstraints, MediaTrack};
use js_sys::Array;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    HtmlVideoElement, ImageBitmap, MediaStream, MediaStreamConstraints, MediaStreamTrack,
    MediaStreamTrackProcessor, MediaStreamTrackProcessorInit, ReadableStreamDefaultReader,
    VideoFrame, VideoFrameInit, Window,
};

use crate::{
    js::{error_message, js_error, to_dictionary},
    render::create_image_bitmap,
};

/// The camera track feeding a session.
pub struct CameraTrack(pub MediaStreamTrack);

impl MediaTrack for CameraTrack {
    fn stop(&self) {
        tracing::debug!("stopping camera track {}", self.0.label());
        self.0.stop();
    }
}

/// Stops every track of `stream`.
pub fn stop_stream(stream: &MediaStream) {
    for track in stream.get_tracks().iter() {
        track.unchecked_into::<MediaStreamTrack>().stop();
    }
}

/// Stops every track of the stream attached to `preview` and detaches it.
pub fn detach_preview(preview: &HtmlVideoElement) {
    if let Some(stream) = preview.src_object() {
        stop_stream(&stream);
        preview.set_src_object(None);
    }
}

/// Shows `stream` in `preview`, stopping whatever stream was there before.
pub fn attach_preview(preview: &HtmlVideoElement, stream: &MediaStream) {
    detach_preview(preview);
    preview.set_src_object(Some(stream));
}

/// Opens the camera with `constraints`.
pub async fn open_user_media(
    window: &Window,
    constraints: &MediaConstraints,
) -> Result<MediaStream> {
    let constraints: MediaStreamConstraints = to_dictionary(constraints)?;
    let media_devices = window.navigator().media_devices().map_err(js_error)?;
    let promise = media_devices
        .get_user_media_with_constraints(&constraints)
        .map_err(js_error)?;
    let stream: MediaStream = JsFuture::from(promise).await.map_err(js_error)?.unchecked_into();
    Ok(stream)
}

/// First video track of `stream`.
pub fn video_track(stream: &MediaStream) -> Result<MediaStreamTrack> {
    let tracks: Array = stream.get_video_tracks();
    tracing::info!("video tracks: {:?}", tracks);
    if tracks.length() == 0 {
        bail!("Camera stream has no video track");
    }
    Ok(tracks.get(0).unchecked_into())
}

/// Reader over the frames of a camera track.
pub fn track_reader(track: &MediaStreamTrack) -> Result<ReadableStreamDefaultReader> {
    let init = js_sys::Object::new();
    js_sys::Reflect::set(&init, &JsValue::from_str("track"), track).map_err(js_error)?;
    let init: MediaStreamTrackProcessorInit = init.unchecked_into();

    let processor = MediaStreamTrackProcessor::new(&init).map_err(js_error)?;
    ReadableStreamDefaultReader::new(&processor.readable()).map_err(js_error)
}

/// Next frame from `reader`, or `None` once the track has ended.
pub async fn read_frame(reader: &ReadableStreamDefaultReader) -> Result<Option<VideoFrame>> {
    let ret = JsFuture::from(reader.read()).await.map_err(js_error)?;

    let ret_value = js_sys::Reflect::get(&ret, &JsValue::from_str("value")).map_err(js_error)?;
    let ret_done = js_sys::Reflect::get(&ret, &JsValue::from_str("done")).map_err(js_error)?;
    let ret_done = js_sys::Boolean::from(ret_done).value_of();

    if ret_done {
        return Ok(None);
    }
    Ok(Some(ret_value.unchecked_into()))
}

/// Snapshots the preview into a frame stamped with `timestamp_millis`.
/// Returns `None` while the preview has no picture yet.
pub async fn snapshot_frame(
    window: &Window,
    preview: &HtmlVideoElement,
    timestamp_millis: f64,
) -> Result<Option<VideoFrame>> {
    if preview.video_width() == 0 {
        return Ok(None);
    }

    let bitmap: ImageBitmap = JsFuture::from(create_image_bitmap(window, preview)?)
        .await
        .map_err(js_error)?
        .unchecked_into();
    let init: VideoFrameInit = to_dictionary(&FrameInit::from_epoch_millis(timestamp_millis))?;

    let frame = VideoFrame::new_with_image_bitmap_and_video_frame_init(&bitmap, &init)
        .map_err(|e| anyhow!("Failed to create frame from preview: {}", error_message(&e)))?;
    bitmap.close();
    Ok(Some(frame))
}
