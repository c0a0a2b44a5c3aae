use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use montuno::{Note, Performance};
use serde::{Deserialize, Serialize};

use crate::tempo::{TempoChange, TempoMap, Timebase};
use crate::{Error, Result};

/// Identity of the reference instrument, carried over to the rendered file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: Option<String>,
    pub program: u8,
    pub channel: u8,
}

/// The first instrument of a reference file, timed in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTrack {
    pub performance: Performance,
    pub track: TrackInfo,
    /// Ticks per quarter note of the source, 480 for timecode files.
    pub ppq: u16,
    pub track_index: usize,
}

/// Notes of one track, still in ticks.
#[derive(Debug, Default)]
struct TrackNotes {
    notes: Vec<(u64, u64, u8, u8, u8)>,
    name: Option<String>,
    programs: HashMap<u8, u8>,
}

/// Read the first track that holds notes.
///
/// Note-ons are paired with note-offs per (channel, pitch); a note-on with
/// velocity 0 counts as a note-off and notes left open close at the end of
/// their track.
pub fn read_reference(midi_bytes: &[u8]) -> Result<ReferenceTrack> {
    let smf = Smf::parse(midi_bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let mut tempo_changes = Vec::new();
    let tracks: Vec<TrackNotes> = smf
        .tracks
        .iter()
        .map(|track| collect_track(track, &mut tempo_changes))
        .collect();
    let tempo = TempoMap::new(smf.header.timing.into(), tempo_changes);

    let (track_index, source) = tracks
        .into_iter()
        .enumerate()
        .find(|(_, t)| !t.notes.is_empty())
        .ok_or(Error::NoNotes)?;

    let channel = source.notes[0].4;
    let program = source.programs.get(&channel).copied().unwrap_or(0);

    let mut notes: Vec<Note> = source
        .notes
        .iter()
        .filter(|n| n.4 == channel)
        .map(|&(onset, offset, pitch, velocity, _)| Note {
            pitch,
            velocity,
            start: tempo.seconds_at(onset),
            end: tempo.seconds_at(offset),
        })
        .collect();
    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    let ppq = match tempo.timebase() {
        Timebase::Metrical(ppq) => ppq,
        Timebase::Timecode(_) => 480,
    };

    tracing::debug!(
        track = track_index,
        notes = notes.len(),
        bpm = tempo.initial_bpm(),
        tempo_changes = tempo.changes().len(),
        "read reference"
    );

    Ok(ReferenceTrack {
        performance: Performance {
            notes,
            bpm: tempo.initial_bpm(),
        },
        track: TrackInfo {
            name: source.name,
            program,
            channel,
        },
        ppq,
        track_index,
    })
}

fn collect_track(track: &[midly::TrackEvent], tempo_changes: &mut Vec<TempoChange>) -> TrackNotes {
    let mut out = TrackNotes::default();
    let mut current_tick: u64 = 0;
    // (channel, pitch) → stack of (onset, velocity)
    let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

    for event in track {
        current_tick += event.delta.as_int() as u64;

        match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                tempo_changes.push(TempoChange {
                    tick: current_tick,
                    microseconds_per_beat: tempo.as_int(),
                });
            }
            TrackEventKind::Meta(MetaMessage::TrackName(name)) if out.name.is_none() => {
                out.name = Some(String::from_utf8_lossy(name).into_owned());
            }
            TrackEventKind::Midi { channel, message } => {
                let ch = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        pending
                            .entry((ch, key.as_int()))
                            .or_default()
                            .push((current_tick, vel.as_int()));
                    }
                    MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                        let key = (ch, key.as_int());
                        if let Some((onset, velocity)) =
                            pending.get_mut(&key).and_then(|stack| stack.pop())
                        {
                            out.notes.push((onset, current_tick, key.1, velocity, ch));
                        }
                    }
                    MidiMessage::ProgramChange { program } => {
                        out.programs.entry(ch).or_insert(program.as_int());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    for ((ch, pitch), stack) in pending {
        for (onset, velocity) in stack {
            out.notes.push((onset, current_tick, pitch, velocity, ch));
        }
    }
    out.notes.sort_by_key(|&(onset, _, pitch, _, _)| (onset, pitch));
    out
}
