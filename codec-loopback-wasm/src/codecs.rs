use anyhow::Result;
use codec_loopback::{
    ChunkDecoder, DecoderConfig, EncodeOptions, EncoderConfig, FrameEncoder, Releasable,
};
use wasm_bindgen::{JsCast, JsValue, closure::Closure};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    EncodedVideoChunk, VideoDecoder, VideoDecoderConfig, VideoDecoderInit, VideoEncoder,
    VideoEncoderConfig, VideoEncoderEncodeOptions, VideoEncoderInit, VideoFrame,
};

use crate::js::{error_message, js_error, to_dictionary};

type OutputCallback<T> = Closure<dyn FnMut(T, JsValue)>;
type ErrorCallback = Closure<dyn FnMut(JsValue)>;

/// A raw or decoded frame, closed on release.
pub struct Frame(pub VideoFrame);

impl Releasable for Frame {
    fn release(&self) {
        self.0.close();
    }
}

fn codec_init<T: JsCast>(output: &JsValue, error: &JsValue) -> Result<T> {
    let init = js_sys::Object::new();
    js_sys::Reflect::set(&init, &JsValue::from_str("output"), output).map_err(js_error)?;
    js_sys::Reflect::set(&init, &JsValue::from_str("error"), error).map_err(js_error)?;
    Ok(init.unchecked_into())
}

fn error_callback(kind: &'static str) -> ErrorCallback {
    Closure::new(move |e: JsValue| {
        tracing::error!("{} error: {}", kind, error_message(&e));
    })
}

/// Temporal layer of an encoded chunk, from `metadata.svc` or, on older
/// browsers, from the metadata itself.
pub fn temporal_layer_id(metadata: &JsValue) -> Option<u32> {
    if !metadata.is_object() {
        return None;
    }
    let svc = js_sys::Reflect::get(metadata, &JsValue::from_str("svc"))
        .ok()
        .filter(|svc| svc.is_object());
    let holder = svc.as_ref().unwrap_or(metadata);
    js_sys::Reflect::get(holder, &JsValue::from_str("temporalLayerId"))
        .ok()?
        .as_f64()
        .map(|id| id as u32)
}

pub struct PlatformEncoder {
    encoder: VideoEncoder,
    _output: OutputCallback<EncodedVideoChunk>,
    _error: ErrorCallback,
}

impl PlatformEncoder {
    pub fn new<F>(config: &EncoderConfig, on_chunk: F) -> Result<Self>
    where
        F: FnMut(EncodedVideoChunk, JsValue) + 'static,
    {
        let output: OutputCallback<EncodedVideoChunk> = Closure::new(on_chunk);
        let error = error_callback("encoder");
        let init: VideoEncoderInit = codec_init(output.as_ref(), error.as_ref())?;
        let encoder = VideoEncoder::new(&init).map_err(js_error)?;

        tracing::info!("encoder config: {:?}", config);
        let config: VideoEncoderConfig = to_dictionary(config)?;
        encoder.configure(&config).map_err(js_error)?;

        Ok(PlatformEncoder {
            encoder,
            _output: output,
            _error: error,
        })
    }

    /// Flushes pending output and resets the encoder. The callbacks are
    /// dropped afterwards, once nothing can invoke them.
    pub async fn shutdown(self) {
        if let Err(e) = JsFuture::from(self.encoder.flush()).await {
            tracing::warn!("encoder flush failed: {}", error_message(&e));
        }
        if let Err(e) = self.encoder.reset() {
            tracing::warn!("encoder reset failed: {}", error_message(&e));
        }
    }
}

impl FrameEncoder for PlatformEncoder {
    type Frame = Frame;

    fn encode(&self, frame: &Frame, options: EncodeOptions) -> Result<()> {
        let options: VideoEncoderEncodeOptions = to_dictionary(&options)?;
        self.encoder
            .encode_with_options(&frame.0, &options)
            .map_err(js_error)
    }
}

pub struct PlatformDecoder {
    decoder: VideoDecoder,
    _output: Closure<dyn FnMut(VideoFrame)>,
    _error: ErrorCallback,
}

impl PlatformDecoder {
    pub fn new<F>(config: &DecoderConfig, on_frame: F) -> Result<Self>
    where
        F: FnMut(VideoFrame) + 'static,
    {
        let output: Closure<dyn FnMut(VideoFrame)> = Closure::new(on_frame);
        let error = error_callback("decoder");
        let init: VideoDecoderInit = codec_init(output.as_ref(), error.as_ref())?;
        let decoder = VideoDecoder::new(&init).map_err(js_error)?;

        tracing::info!("decoder config: {:?}", config);
        let config: VideoDecoderConfig = to_dictionary(config)?;
        decoder.configure(&config).map_err(js_error)?;

        Ok(PlatformDecoder {
            decoder,
            _output: output,
            _error: error,
        })
    }

    pub async fn shutdown(self) {
        if let Err(e) = JsFuture::from(self.decoder.flush()).await {
            tracing::warn!("decoder flush failed: {}", error_message(&e));
        }
        if let Err(e) = self.decoder.reset() {
            tracing::warn!("decoder reset failed: {}", error_message(&e));
        }
    }
}

impl ChunkDecoder for PlatformDecoder {
    type Chunk = EncodedVideoChunk;

    fn decode(&self, chunk: &EncodedVideoChunk) -> Result<()> {
        self.decoder.decode(chunk).map_err(js_error)
    }

    fn decode_queue_size(&self) -> u32 {
        self.decoder.decode_queue_size()
    }
}
