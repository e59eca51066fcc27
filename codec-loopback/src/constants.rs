// A key frame is requested on every Nth submitted frame, starting with the first.
pub const KEY_FRAME_INTERVAL: u64 = 30;

// The pipeline halts once the decoder reports this many pending decodes.
pub const MAX_DECODE_QUEUE_SIZE: u32 = 15;

pub const DEFAULT_CODEC: &str = "vp8";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FRAMERATE: f64 = 30.0;
pub const DEFAULT_BITRATE: u64 = 1_000_000;
