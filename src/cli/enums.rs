//! CLI enum types for generation and assembly options.

use clap::ValueEnum;

use storyreel::fal::{AspectRatio, ClipDuration, Resolution};
use storyreel::media::TransitionKind;

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AspectRatioArg {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(a: AspectRatioArg) -> Self {
        match a {
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
        }
    }
}

/// Output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionArg {
    #[value(name = "720p")]
    Hd,
    #[value(name = "1080p")]
    FullHd,
}

impl From<ResolutionArg> for Resolution {
    fn from(r: ResolutionArg) -> Self {
        match r {
            ResolutionArg::Hd => Resolution::Hd,
            ResolutionArg::FullHd => Resolution::FullHd,
        }
    }
}

/// Length of each generated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DurationArg {
    #[value(name = "4s")]
    Four,
    #[value(name = "6s")]
    Six,
    #[value(name = "8s")]
    Eight,
}

impl From<DurationArg> for ClipDuration {
    fn from(d: DurationArg) -> Self {
        match d {
            DurationArg::Four => ClipDuration::Four,
            DurationArg::Six => ClipDuration::Six,
            DurationArg::Eight => ClipDuration::Eight,
        }
    }
}

/// How adjacent clips are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransitionArg {
    Cut,
    Crossfade,
    Fade,
}

impl From<TransitionArg> for TransitionKind {
    fn from(t: TransitionArg) -> Self {
        match t {
            TransitionArg::Cut => TransitionKind::Cut,
            TransitionArg::Crossfade => TransitionKind::Crossfade,
            TransitionArg::Fade => TransitionKind::Fade,
        }
    }
}
