pub mod codec_config;
pub mod constants;
pub mod constraints;
pub mod pipeline;
pub mod settings;

pub use codec_config::{DecoderConfig, EncodeOptions, EncoderConfig, FrameInit, scalability_mode};
pub use constraints::{MediaConstraints, Range, VideoConstraints};
pub use pipeline::{
    ChunkDecoder, ChunkOutcome, FrameEncoder, FrameOutcome, HaltReason, MediaTrack, Pipeline,
    Releasable, SessionState, StartTicket, Teardown, present_frame,
};
pub use settings::{FrameSource, HardwareAcceleration, LoopbackSettings, Resolution};
