//! Assembly stages driven through the external media tool (FFmpeg).

mod audio_mix;
mod filter_graph;
mod tool;
mod transition;

#[cfg(test)]
mod testing;

pub use audio_mix::{mix_filter, validate_volume, AudioMixer};
pub use filter_graph::{FilterGraph, Pad};
pub use tool::{FfmpegTool, MediaError, MediaTool};
pub use transition::{
    concat_manifest, crossfade_offsets, ClipHandle, Compositor, TransitionKind, TransitionPlan,
};
