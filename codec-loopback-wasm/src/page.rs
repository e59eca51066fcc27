use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use anyhow::{Context, Result, anyhow, bail};
use codec_loopback::{
    ChunkOutcome, DecoderConfig, EncoderConfig, FrameOutcome, FrameSource, LoopbackSettings,
    MediaConstraints, Pipeline, StartTicket, Teardown, present_frame,
};
use wasm_bindgen::prelude::*;
use web_sys::{
    EncodedVideoChunk, HtmlButtonElement, HtmlCanvasElement, HtmlVideoElement,
    MediaStreamTrack, VideoFrame, Window,
};

use crate::{
    alert,
    capture::{self, CameraTrack},
    codecs::{Frame, PlatformDecoder, PlatformEncoder, temporal_layer_id},
    form::{FormControls, element_by_id},
    js::{error_message, to_js_error},
    render, settings_from_js,
};

type LoopbackPipeline = Pipeline<PlatformEncoder, PlatformDecoder, CameraTrack>;

struct Elements {
    window: Window,
    start_button: HtmlButtonElement,
    stop_button: HtmlButtonElement,
    user_media: HtmlVideoElement,
    playback_canvas: HtmlCanvasElement,
    form: FormControls,
}

impl Elements {
    fn bind() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow!("No window"))?;
        let document = window.document().ok_or_else(|| anyhow!("No document"))?;
        Ok(Elements {
            start_button: element_by_id(&document, "startButton")?,
            stop_button: element_by_id(&document, "stopButton")?,
            user_media: element_by_id(&document, "userMedia")?,
            playback_canvas: element_by_id(&document, "playbackCanvas")?,
            form: FormControls::bind(&document)?,
            window,
        })
    }

    fn show_running(&self, running: bool) {
        self.start_button.set_disabled(running);
        self.stop_button.set_disabled(!running);
    }
}

/// `setInterval` registration snapshotting the preview. Cleared on drop.
struct SnapshotTimer {
    window: Window,
    handle: i32,
    _tick: Closure<dyn FnMut()>,
}

impl Drop for SnapshotTimer {
    fn drop(&mut self) {
        self.window.clear_interval_with_handle(self.handle);
    }
}

struct Session {
    pipeline: LoopbackPipeline,
    settings: LoopbackSettings,
    timer: Option<SnapshotTimer>,
}

struct PageInner {
    elements: Elements,
    session: RefCell<Session>,
    listeners: RefCell<Vec<Closure<dyn FnMut()>>>,
}

#[wasm_bindgen]
pub struct LoopbackPage {
    inner: Rc<PageInner>,
}

#[wasm_bindgen]
impl LoopbackPage {
    /// Binds to the page's elements and wires the start/stop buttons.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<LoopbackPage, JsValue> {
        let elements = Elements::bind().map_err(to_js_error)?;
        elements.show_running(false);

        let inner = Rc::new(PageInner {
            elements,
            session: RefCell::new(Session {
                pipeline: LoopbackPipeline::new(),
                settings: LoopbackSettings::default(),
                timer: None,
            }),
            listeners: RefCell::new(Vec::new()),
        });
        inner
            .listen(&inner.elements.start_button, |inner| {
                wasm_bindgen_futures::spawn_local(async move {
                    inner.start(None).await;
                });
            })
            .map_err(to_js_error)?;
        inner
            .listen(&inner.elements.stop_button, |inner| {
                wasm_bindgen_futures::spawn_local(async move {
                    inner.stop().await;
                });
            })
            .map_err(to_js_error)?;

        Ok(LoopbackPage { inner })
    }

    /// Starts a run with the settings currently selected in the form.
    pub async fn start(&self) -> Result<(), JsValue> {
        self.inner.clone().start(None).await;
        Ok(())
    }

    /// Starts a run with a settings object instead of the form.
    #[wasm_bindgen(js_name = startWithSettings)]
    pub async fn start_with_settings(&self, settings: JsValue) -> Result<(), JsValue> {
        let settings = settings_from_js(settings)?;
        self.inner.clone().start(Some(settings)).await;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), JsValue> {
        self.inner.clone().stop().await;
        Ok(())
    }

    pub fn state(&self) -> String {
        self.inner.session.borrow().pipeline.state().as_str().to_string()
    }
}

impl PageInner {
    fn listen<F>(self: &Rc<Self>, button: &HtmlButtonElement, on_click: F) -> Result<()>
    where
        F: Fn(Rc<PageInner>) + 'static,
    {
        let weak = Rc::downgrade(self);
        let listener: Closure<dyn FnMut()> = Closure::new(move || {
            if let Some(inner) = weak.upgrade() {
                on_click(inner);
            }
        });
        button
            .add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())
            .map_err(|e| anyhow!("addEventListener failed: {}", error_message(&e)))?;
        self.listeners.borrow_mut().push(listener);
        Ok(())
    }

    async fn start(self: Rc<Self>, settings: Option<LoopbackSettings>) {
        let requested = self.session.borrow_mut().pipeline.begin_start();
        let (ticket, leftover) = match requested {
            Ok(requested) => requested,
            Err(e) => {
                tracing::warn!("start ignored: {}", e);
                return;
            }
        };

        self.elements.show_running(true);
        shutdown_codecs(leftover).await;

        let result = match self.open_session(ticket, settings).await {
            Ok((generation, settings, track)) => {
                self.start_frame_source(generation, &settings, track)
            }
            // A stop or a newer start took over while this one was waiting.
            Err(e) if !self.session.borrow().pipeline.is_pending(ticket) => {
                tracing::info!("start cancelled: {:?}", e);
                return;
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!("start error: {:?}", e);
            alert("start error!");
            self.stop().await;
        }
    }

    /// Opens the camera and starts the pipeline. Fails without side effects
    /// on the session once `ticket` is no longer pending.
    async fn open_session(
        self: &Rc<Self>,
        ticket: StartTicket,
        settings: Option<LoopbackSettings>,
    ) -> Result<(u64, LoopbackSettings, MediaStreamTrack)> {
        let settings = match settings {
            Some(settings) => settings,
            None => self.elements.form.read_settings()?,
        };
        tracing::info!("starting loopback with {:?}", settings);

        let stream = capture::open_user_media(
            &self.elements.window,
            &MediaConstraints::from_settings(&settings),
        )
        .await
        .context("getUserMedia failed")?;
        if !self.session.borrow().pipeline.is_pending(ticket) {
            capture::stop_stream(&stream);
            bail!("Loopback stopped while waiting for the camera");
        }
        capture::attach_preview(&self.elements.user_media, &stream);
        let track = capture::video_track(&stream)?;

        let generation = self.session.borrow().pipeline.next_generation();
        let weak = Rc::downgrade(self);
        let encoder = PlatformEncoder::new(
            &EncoderConfig::from_settings(&settings),
            move |chunk: EncodedVideoChunk, metadata: JsValue| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_encoded_chunk(generation, chunk, &metadata);
                }
            },
        );
        let encoder = match encoder {
            Ok(encoder) => encoder,
            Err(e) => {
                track.stop();
                return Err(e.context("Failed to create encoder"));
            }
        };

        {
            let mut session = self.session.borrow_mut();
            session
                .pipeline
                .start(ticket, CameraTrack(track.clone()), encoder)?;
            session.settings = settings.clone();
        }

        Ok((generation, settings, track))
    }

    fn start_frame_source(
        self: &Rc<Self>,
        generation: u64,
        settings: &LoopbackSettings,
        track: MediaStreamTrack,
    ) -> Result<()> {
        tracing::info!("frame source is {}", String::from(settings.frame_source));
        match settings.frame_source {
            FrameSource::Camera => {
                let weak = Rc::downgrade(self);
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = read_camera_frames(weak, track, generation).await {
                        tracing::warn!("camera frame loop ended: {:?}", e);
                    }
                });
            }
            FrameSource::Canvas => {
                let timer = self.start_snapshot_timer(generation, settings)?;
                self.session.borrow_mut().timer = Some(timer);
            }
        }

        Ok(())
    }

    fn start_snapshot_timer(
        self: &Rc<Self>,
        generation: u64,
        settings: &LoopbackSettings,
    ) -> Result<SnapshotTimer> {
        let weak = Rc::downgrade(self);
        let tick: Closure<dyn FnMut()> = Closure::new(move || {
            let weak = weak.clone();
            let timestamp_millis = js_sys::Date::now();
            wasm_bindgen_futures::spawn_local(async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match capture::snapshot_frame(
                    &inner.elements.window,
                    &inner.elements.user_media,
                    timestamp_millis,
                )
                .await
                {
                    Ok(Some(frame)) => {
                        inner.deliver_frame(generation, frame);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("snapshot failed: {:?}", e),
                }
            });
        });

        let handle = self
            .elements
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                tick.as_ref().unchecked_ref(),
                settings.frame_interval_millis() as i32,
            )
            .map_err(|e| anyhow!("setInterval failed: {}", error_message(&e)))?;

        Ok(SnapshotTimer {
            window: self.elements.window.clone(),
            handle,
            _tick: tick,
        })
    }

    /// Feeds one raw frame into the session. Returns whether the session
    /// still accepts frames.
    fn deliver_frame(&self, generation: u64, frame: VideoFrame) -> bool {
        tracing::debug!("raw frame {:?}", frame);
        let mut session = self.session.borrow_mut();
        match session.pipeline.on_frame(generation, Frame(frame)) {
            FrameOutcome::Encoded { key_frame } => {
                tracing::debug!("frame submitted, key frame: {}", key_frame);
            }
            FrameOutcome::Dropped => tracing::debug!("frame dropped"),
            FrameOutcome::Failed => {}
        }
        session.pipeline.accepts(generation)
    }

    fn on_encoded_chunk(
        self: Rc<Self>,
        generation: u64,
        chunk: EncodedVideoChunk,
        metadata: &JsValue,
    ) {
        tracing::debug!("encoded chunk {:?}", chunk);

        let outcome = {
            let mut session = self.session.borrow_mut();
            let Session {
                pipeline, settings, ..
            } = &mut *session;

            let decoder_config = DecoderConfig::new(settings.codec.clone());
            let window = self.elements.window.clone();
            let canvas = self.elements.playback_canvas.clone();
            pipeline.on_chunk(generation, &chunk, temporal_layer_id(metadata), move || {
                PlatformDecoder::new(&decoder_config, move |frame: VideoFrame| {
                    tracing::debug!("decoded frame {:?}", frame);
                    let result = present_frame(Frame(frame), |frame| {
                        render::draw_frame(&window, &canvas, &frame.0)
                    });
                    if let Err(e) = result {
                        tracing::warn!("failed to draw frame: {:?}", e);
                    }
                })
            })
        };

        if outcome == ChunkOutcome::Halted {
            wasm_bindgen_futures::spawn_local(async move {
                self.stop().await;
            });
        }
    }

    async fn stop(self: Rc<Self>) {
        tracing::info!("stop");
        let teardown = {
            let mut session = self.session.borrow_mut();
            session.timer = None;
            session.pipeline.stop()
        };
        capture::detach_preview(&self.elements.user_media);
        shutdown_codecs(teardown).await;

        render::clear_canvas(&self.elements.playback_canvas);
        self.elements.show_running(false);
    }
}

async fn shutdown_codecs(teardown: Teardown<PlatformEncoder, PlatformDecoder>) {
    if let Some(encoder) = teardown.encoder {
        encoder.shutdown().await;
    }
    if let Some(decoder) = teardown.decoder {
        decoder.shutdown().await;
    }
}

async fn read_camera_frames(
    weak: Weak<PageInner>,
    track: MediaStreamTrack,
    generation: u64,
) -> Result<()> {
    let reader = capture::track_reader(&track)?;

    while let Some(frame) = capture::read_frame(&reader).await? {
        let Some(inner) = weak.upgrade() else {
            frame.close();
            break;
        };
        if !inner.deliver_frame(generation, frame) {
            break;
        }
    }

    reader.release_lock();
    tracing::debug!("camera frame loop for session {} finished", generation);
    Ok(())
}
