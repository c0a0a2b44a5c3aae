//! Reference performances in and rendered montunos out, as Standard MIDI Files.

pub mod read;
pub mod tempo;
pub mod write;

pub use read::{read_reference, ReferenceTrack, TrackInfo};
pub use tempo::TempoMap;
pub use write::{performance_to_midi, ExportOptions};

/// Errors from MIDI reading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("MIDI file contains no notes")]
    NoNotes,
}

pub type Result<T> = std::result::Result<T, Error>;
