use montuno::Note;
use serde::{Deserialize, Serialize};

use crate::read::TrackInfo;

/// Options for MIDI export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Ticks per quarter note. Default: 480.
    pub ppq: u16,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { ppq: 480 }
    }
}

/// Write a rendered performance as Standard MIDI File format 1 bytes.
///
/// Track 0: tempo. Track 1: track name, program change, note events.
pub fn performance_to_midi(
    notes: &[Note],
    bpm: f64,
    track: &TrackInfo,
    options: &ExportOptions,
) -> Vec<u8> {
    let tracks = [
        build_tempo_track(bpm),
        build_note_track(notes, bpm, track, options.ppq),
    ];
    tracing::debug!(notes = notes.len(), bpm, ppq = options.ppq, "wrote performance");
    build_midi_file(options.ppq, &tracks)
}

fn microseconds_per_beat(bpm: f64) -> u32 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 500_000;
    }
    (60_000_000.0 / bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32
}

fn build_tempo_track(bpm: f64) -> Vec<u8> {
    let usec = microseconds_per_beat(bpm);
    let mut track_data = Vec::new();

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    track_data
}

fn build_note_track(notes: &[Note], bpm: f64, track: &TrackInfo, ppq: u16) -> Vec<u8> {
    let channel = track.channel & 0x0F;
    let ticks_per_second = 60_000_000.0 / microseconds_per_beat(bpm) as f64 * ppq as f64;
    let to_tick = |seconds: f64| (seconds.max(0.0) * ticks_per_second).round() as u64;

    let mut events: Vec<(u64, Vec<u8>)> = Vec::new();

    if let Some(name) = &track.name {
        let mut name_event = vec![0xFF, 0x03];
        write_vlq(&mut name_event, name.len() as u32);
        name_event.extend_from_slice(name.as_bytes());
        events.push((0, name_event));
    }
    events.push((0, vec![0xC0 | channel, track.program & 0x7F]));

    for note in notes {
        let pitch = note.pitch & 0x7F;
        let velocity = note.velocity.clamp(1, 127);
        let on = to_tick(note.start);
        let off = to_tick(note.end).max(on + 1);
        events.push((on, vec![0x90 | channel, pitch, velocity]));
        events.push((off, vec![0x80 | channel, pitch, 0]));
    }

    // meta events first, then note-offs before note-ons at the same tick
    let rank = |data: &[u8]| match data.first().copied() {
        Some(0xFF) | Some(0xC0..=0xCF) => 0,
        Some(b) if b & 0xF0 == 0x80 => 1,
        _ => 2,
    };
    events.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| rank(&a.1).cmp(&rank(&b.1))));

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, data) in events {
        write_vlq(&mut track_data, (tick - last_tick) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    track_data
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{MidiMessage, Smf, TrackEventKind};

    fn note(pitch: u8, start: f64, end: f64) -> Note {
        Note {
            pitch,
            velocity: 100,
            start,
            end,
        }
    }

    #[test]
    fn writes_format_1_with_tempo_and_notes() {
        let notes = vec![note(60, 0.0, 0.25), note(64, 0.25, 0.5)];
        let bytes = performance_to_midi(&notes, 120.0, &TrackInfo::default(), &ExportOptions::default());

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert!(matches!(smf.header.timing, midly::Timing::Metrical(t) if t.as_int() == 480));
        assert_eq!(smf.tracks.len(), 2);

        let tempo = smf.tracks[0].iter().find_map(|e| match e.kind {
            TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        });
        assert_eq!(tempo, Some(500_000));
    }

    #[test]
    fn note_offs_precede_note_ons_at_same_tick() {
        // repeated pitch: the first note ends where the second begins
        let notes = vec![note(60, 0.0, 0.25), note(60, 0.25, 0.5)];
        let bytes = performance_to_midi(&notes, 120.0, &TrackInfo::default(), &ExportOptions::default());
        let smf = Smf::parse(&bytes).unwrap();

        let mut tick = 0u32;
        let mut sequence = Vec::new();
        for event in &smf.tracks[1] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                match message {
                    MidiMessage::NoteOn { .. } => sequence.push((tick, "on")),
                    MidiMessage::NoteOff { .. } => sequence.push((tick, "off")),
                    _ => {}
                }
            }
        }
        assert_eq!(
            sequence,
            vec![(0, "on"), (240, "off"), (240, "on"), (480, "off")]
        );
    }

    #[test]
    fn track_name_and_program() {
        let info = TrackInfo {
            name: Some("Montuno".to_string()),
            program: 4,
            channel: 2,
        };
        let bytes = performance_to_midi(&[note(55, 0.0, 0.1)], 90.0, &info, &ExportOptions::default());
        let smf = Smf::parse(&bytes).unwrap();

        let name = smf.tracks[1].iter().find_map(|e| match e.kind {
            TrackEventKind::Meta(midly::MetaMessage::TrackName(n)) => Some(n.to_vec()),
            _ => None,
        });
        assert_eq!(name, Some(b"Montuno".to_vec()));

        let program = smf.tracks[1].iter().find_map(|e| match e.kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program },
            } => Some((channel.as_int(), program.as_int())),
            _ => None,
        });
        assert_eq!(program, Some((2, 4)));
    }

    #[test]
    fn vlq_encoding() {
        let mut buf = Vec::new();
        write_vlq(&mut buf, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        write_vlq(&mut buf, 127);
        assert_eq!(buf, vec![0x7F]);

        buf.clear();
        write_vlq(&mut buf, 480);
        assert_eq!(buf, vec![0x83, 0x60]);
    }
}
