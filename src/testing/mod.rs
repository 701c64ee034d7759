//! Testing utilities
//!
//! Synthetic media generators and in-memory collaborator doubles for
//! offline testing without cameras, microphones, or codec libraries.

pub mod doubles;
pub mod synthetic_data;

pub use doubles::{
    CodecFailure, FailingAudioCodec, MemorySink, MemorySinkView, PassthroughAudioCodec,
    PassthroughVideoCodec,
};
pub use synthetic_data::{synthetic_audio_buffer, synthetic_video_frame};
