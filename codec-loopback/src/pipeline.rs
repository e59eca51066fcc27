use anyhow::{Result, bail};

use crate::{
    codec_config::EncodeOptions,
    constants::{KEY_FRAME_INTERVAL, MAX_DECODE_QUEUE_SIZE},
};

/// A platform resource that must be closed explicitly after use.
pub trait Releasable {
    fn release(&self);
}

pub trait FrameEncoder {
    type Frame: Releasable;

    fn encode(&self, frame: &Self::Frame, options: EncodeOptions) -> Result<()>;
}

pub trait ChunkDecoder {
    type Chunk;

    fn decode(&self, chunk: &Self::Chunk) -> Result<()>;
    fn decode_queue_size(&self) -> u32;
}

pub trait MediaTrack {
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    UserRequested,
    QueueOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped(HaltReason),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopped(HaltReason::UserRequested) => "stopped",
            SessionState::Stopped(HaltReason::QueueOverflow) => "halted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Encoded { key_frame: bool },
    Dropped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Decoded,
    Dropped,
    /// The decoder fell too far behind and the session stopped itself.
    Halted,
    DecoderUnavailable,
    Failed,
}

/// Codec objects taken out of a stopped session. The caller flushes and
/// resets them; the camera track has already been stopped.
#[derive(Debug)]
pub struct Teardown<E, D> {
    pub encoder: Option<E>,
    pub decoder: Option<D>,
}

/// Token for a start that is waiting on the camera. Only the latest ticket
/// can complete, and [`Pipeline::stop`] cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartTicket(u64);

/// Loopback session: raw frames go to the encoder, encoded chunks go to a
/// decoder created on the first chunk.
#[derive(Debug)]
pub struct Pipeline<E, D, T> {
    state: SessionState,
    generation: u64,
    start_requests: u64,
    pending_start: Option<StartTicket>,
    frames_submitted: u64,
    track: Option<T>,
    encoder: Option<E>,
    decoder: Option<D>,
}

impl<E, D, T> Default for Pipeline<E, D, T> {
    fn default() -> Self {
        Pipeline {
            state: SessionState::Idle,
            generation: 0,
            start_requests: 0,
            pending_start: None,
            frames_submitted: 0,
            track: None,
            encoder: None,
            decoder: None,
        }
    }
}

impl<E, D, T> Pipeline<E, D, T>
where
    E: FrameEncoder,
    D: ChunkDecoder,
    T: MediaTrack,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Incremented by every successful [`Pipeline::start`]. Callbacks capture
    /// it to recognise that they belong to an earlier session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation the next successful [`Pipeline::start`] will return.
    pub fn next_generation(&self) -> u64 {
        self.generation + 1
    }

    pub fn encoder(&self) -> Option<&E> {
        self.encoder.as_ref()
    }

    pub fn decoder(&self) -> Option<&D> {
        self.decoder.as_ref()
    }

    pub fn track(&self) -> Option<&T> {
        self.track.as_ref()
    }

    /// Whether input stamped with `generation` belongs to the running session.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_running() && self.generation == generation
    }

    /// Registers a start request. Codecs left behind by a halted session are
    /// handed back so the caller can shut them down.
    pub fn begin_start(&mut self) -> Result<(StartTicket, Teardown<E, D>)> {
        if self.is_running() {
            bail!("Loopback session is already running");
        }
        if let Some(previous) = self.track.take() {
            previous.stop();
        }

        self.start_requests += 1;
        let ticket = StartTicket(self.start_requests);
        self.pending_start = Some(ticket);

        Ok((
            ticket,
            Teardown {
                encoder: self.encoder.take(),
                decoder: self.decoder.take(),
            },
        ))
    }

    /// False once `ticket` was cancelled by [`Pipeline::stop`] or superseded
    /// by a later [`Pipeline::begin_start`].
    pub fn is_pending(&self, ticket: StartTicket) -> bool {
        self.pending_start == Some(ticket)
    }

    pub fn start(&mut self, ticket: StartTicket, track: T, encoder: E) -> Result<u64> {
        if self.is_running() {
            track.stop();
            bail!("Loopback session is already running");
        }
        if !self.is_pending(ticket) {
            track.stop();
            bail!("Start request {} was cancelled", ticket.0);
        }

        self.pending_start = None;
        self.generation += 1;
        self.frames_submitted = 0;
        self.track = Some(track);
        self.encoder = Some(encoder);
        self.decoder = None;
        self.state = SessionState::Running;
        tracing::info!("loopback session {} started", self.generation);

        Ok(self.generation)
    }

    pub fn on_frame(&mut self, generation: u64, frame: E::Frame) -> FrameOutcome {
        let outcome = if self.generation == generation {
            self.encode_frame(&frame)
        } else {
            tracing::debug!("frame from session {} dropped", generation);
            FrameOutcome::Dropped
        };
        frame.release();
        outcome
    }

    fn encode_frame(&mut self, frame: &E::Frame) -> FrameOutcome {
        if !self.is_running() {
            return FrameOutcome::Dropped;
        }
        let Some(encoder) = &self.encoder else {
            return FrameOutcome::Dropped;
        };

        let key_frame = self.frames_submitted % KEY_FRAME_INTERVAL == 0;
        self.frames_submitted += 1;

        match encoder.encode(frame, EncodeOptions { key_frame }) {
            Ok(()) => FrameOutcome::Encoded { key_frame },
            Err(e) => {
                tracing::warn!("encode failed: {:?}", e);
                FrameOutcome::Failed
            }
        }
    }

    pub fn on_chunk<F>(
        &mut self,
        generation: u64,
        chunk: &D::Chunk,
        temporal_layer_id: Option<u32>,
        create_decoder: F,
    ) -> ChunkOutcome
    where
        F: FnOnce() -> Result<D>,
    {
        tracing::debug!(
            "encoded chunk metadata temporal layer index {:?}",
            temporal_layer_id
        );

        if !self.accepts(generation) {
            return ChunkOutcome::Dropped;
        }

        if self.decoder.is_none() {
            match create_decoder() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(e) => {
                    tracing::error!("failed to create decoder: {:?}", e);
                    return ChunkOutcome::DecoderUnavailable;
                }
            }
        }
        let Some(decoder) = &self.decoder else {
            return ChunkOutcome::DecoderUnavailable;
        };

        let queue_size = decoder.decode_queue_size();
        if queue_size >= MAX_DECODE_QUEUE_SIZE {
            tracing::warn!("Stopped, too many queued frames {}", queue_size);
            self.state = SessionState::Stopped(HaltReason::QueueOverflow);
            return ChunkOutcome::Halted;
        }

        match decoder.decode(chunk) {
            Ok(()) => ChunkOutcome::Decoded,
            Err(e) => {
                tracing::warn!("decode failed: {:?}", e);
                ChunkOutcome::Failed
            }
        }
    }

    /// Stops the session whatever state it is in.
    pub fn stop(&mut self) -> Teardown<E, D> {
        if self.state != SessionState::Stopped(HaltReason::QueueOverflow) {
            self.state = SessionState::Stopped(HaltReason::UserRequested);
        }
        self.pending_start = None;
        if let Some(track) = self.track.take() {
            track.stop();
        }
        tracing::info!("loopback session {} stopped", self.generation);

        Teardown {
            encoder: self.encoder.take(),
            decoder: self.decoder.take(),
        }
    }
}

/// Hands a decoded frame to `render` and closes it afterwards, even when
/// rendering fails.
pub fn present_frame<F, R>(frame: F, render: R) -> Result<()>
where
    F: Releasable,
    R: FnOnce(&F) -> Result<()>,
{
    let result = render(&frame);
    frame.release();
    result
}
