//! Piano montuno generation.
//!
//! Turns a chord progression into a voiced, rhythmically phrased keyboard
//! part by replaying the rhythm of a short reference performance with new
//! pitches.
//!
//! # Example
//!
//! ```
//! use montuno::{arrange, Note, Performance, RhythmPattern, BASELINE_PITCHES};
//!
//! // A one-slot reference: the full baseline chord on the downbeat.
//! let reference = Performance {
//!     notes: BASELINE_PITCHES
//!         .iter()
//!         .map(|&pitch| Note { pitch, velocity: 100, start: 0.0, end: 0.2 })
//!         .collect(),
//!     bpm: 120.0,
//! };
//!
//! let arrangement = arrange("Cmaj7 | Dm7 G7 | Cmaj7", &RhythmPattern::clave_2_3(), &reference, None)?;
//! assert_eq!(arrangement.voicings.len(), 4);
//! # Ok::<(), montuno::Error>(())
//! ```

pub mod chord;
pub mod harmonize;
pub mod render;
pub mod schedule;
pub mod voicing;

use serde::Serialize;

pub use chord::{ChordQuality, ChordSymbol};
pub use harmonize::Harmonization;
pub use render::{render, Grid, Note, Performance, BASELINE_PITCHES};
pub use schedule::{schedule, Assignment, RhythmPattern, Schedule, SlotSpan};
pub use voicing::{generate, Voicing};

/// Errors from scheduling, voicing and rendering.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized chord symbol: {symbol:?}")]
    UnrecognizedChord { symbol: String },

    #[error("bar {segment:?} holds {chords} chords; expected one or two")]
    MalformedSegment { segment: String, chords: usize },

    #[error("unknown harmonization marker: {marker}")]
    UnknownMarker { marker: String },

    #[error("invalid rhythm pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),

    #[error("reference performance has no baseline pitches (G2, A2, C3, E3)")]
    NoReferencePositions,

    #[error("{assignments} scheduled chords but {voicings} voicings")]
    VoicingMismatch { assignments: usize, voicings: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Everything one run of the pipeline produces.
#[derive(Debug, Clone, Serialize)]
pub struct Arrangement {
    pub schedule: Schedule,
    pub voicings: Vec<Voicing>,
    pub notes: Vec<Note>,
    pub bpm: f64,
}

/// Schedule, voice and render a progression against a reference performance.
pub fn arrange(
    text: &str,
    pattern: &RhythmPattern,
    reference: &Performance,
    default: Option<Harmonization>,
) -> Result<Arrangement> {
    let schedule = schedule::schedule(text, pattern, default)?;
    let voicings = voicing::generate(&schedule.chords());
    let notes = render::render(reference, &voicings, &schedule, schedule.destination_slots())?;

    Ok(Arrangement {
        schedule,
        voicings,
        notes,
        bpm: reference.bpm,
    })
}
