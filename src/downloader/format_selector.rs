// FormatSelector - picks the streams a job downloads
//
// Combined mode: highest-resolution video-only stream in the target
// container plus the first audio-only stream in that container.
// Audio mode: highest-bitrate audio-only stream inside a fixed bitrate tier,
// matched on the format's advertised bitrate, with no fallback to other tiers.

use serde::{Deserialize, Serialize};

use super::models::{OutputKind, StreamDescriptor};

/// Nominal audio bitrate accepted in audio-only mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitrateTier {
    pub nominal_kbps: u32,
}

impl BitrateTier {
    /// Allowed deviation from the nominal bitrate, in percent
    const TOLERANCE_PERCENT: u32 = 10;

    pub fn new(nominal_kbps: u32) -> Self {
        Self { nominal_kbps }
    }

    /// Whether `kbps` falls inside this tier
    pub fn contains(&self, kbps: u32) -> bool {
        let slack = self.nominal_kbps.saturating_mul(Self::TOLERANCE_PERCENT) / 100;
        kbps.abs_diff(self.nominal_kbps) <= slack
    }
}

impl Default for BitrateTier {
    fn default() -> Self {
        Self::new(160)
    }
}

/// How streams are chosen for a video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    Combined { container: &'static str },
    AudioOnly { tier: BitrateTier },
}

impl SelectionPolicy {
    pub fn for_output(kind: OutputKind, tier: BitrateTier) -> Self {
        match kind {
            OutputKind::CombinedVideo => Self::Combined {
                container: kind.container(),
            },
            OutputKind::AudioOnly => Self::AudioOnly { tier },
        }
    }
}

/// Streams picked for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSelection {
    Combined {
        video: StreamDescriptor,
        audio: StreamDescriptor,
    },
    AudioOnly {
        audio: StreamDescriptor,
    },
}

/// Why nothing could be selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMiss {
    NoVideoStream,
    NoAudioStream,
    NoAudioInTier(u32),
}

impl std::fmt::Display for SelectionMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoVideoStream => write!(f, "no video-only stream in the target container"),
            Self::NoAudioStream => write!(f, "no audio-only stream in the target container"),
            Self::NoAudioInTier(kbps) => write!(f, "no audio stream at {}kbps", kbps),
        }
    }
}

/// Format selector over a fixed list of stream descriptors
pub struct FormatSelector;

impl FormatSelector {
    pub fn select(
        streams: &[StreamDescriptor],
        policy: SelectionPolicy,
    ) -> Result<StreamSelection, SelectionMiss> {
        match policy {
            SelectionPolicy::Combined { container } => {
                let video = Self::find_best_video(streams, container);
                let audio = Self::find_first_audio(streams, container);
                match (video, audio) {
                    (Some(video), Some(audio)) => Ok(StreamSelection::Combined {
                        video: video.clone(),
                        audio: audio.clone(),
                    }),
                    (None, _) => Err(SelectionMiss::NoVideoStream),
                    (_, None) => Err(SelectionMiss::NoAudioStream),
                }
            }
            SelectionPolicy::AudioOnly { tier } => Self::find_audio_in_tier(streams, tier)
                .map(|audio| StreamSelection::AudioOnly {
                    audio: audio.clone(),
                })
                .ok_or(SelectionMiss::NoAudioInTier(tier.nominal_kbps)),
        }
    }

    /// Highest resolution video-only stream, ties broken by bitrate then
    /// format id so the result does not depend on input order
    fn find_best_video<'a>(
        streams: &'a [StreamDescriptor],
        container: &str,
    ) -> Option<&'a StreamDescriptor> {
        streams
            .iter()
            .filter(|s| s.only_video && s.container == container)
            .filter(|s| s.resolution.is_some())
            .max_by(|a, b| {
                a.resolution
                    .cmp(&b.resolution)
                    .then_with(|| a.total_bitrate_kbps.cmp(&b.total_bitrate_kbps))
                    .then_with(|| b.format_id.cmp(&a.format_id))
            })
    }

    /// First audio-only stream in the container; no quality preference
    fn find_first_audio<'a>(
        streams: &'a [StreamDescriptor],
        container: &str,
    ) -> Option<&'a StreamDescriptor> {
        streams
            .iter()
            .find(|s| s.only_audio && s.container == container)
    }

    fn find_audio_in_tier(
        streams: &[StreamDescriptor],
        tier: BitrateTier,
    ) -> Option<&StreamDescriptor> {
        streams
            .iter()
            .filter(|s| s.only_audio)
            .filter(|s| s.tier_kbps().is_some_and(|kbps| tier.contains(kbps)))
            .max_by(|a, b| {
                a.tier_kbps()
                    .cmp(&b.tier_kbps())
                    .then_with(|| a.abr_kbps.cmp(&b.abr_kbps))
                    .then_with(|| b.format_id.cmp(&a.format_id))
            })
    }
}
