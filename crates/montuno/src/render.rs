//! Re-pitching a reference performance over a scheduled progression.
//!
//! The reference is a short recording whose baseline pitches stand for voice
//! positions. Its rhythm is replayed slot by slot across the destination
//! length, and every baseline note takes the pitch of the matching voice in
//! the chord that owns its slot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::harmonize::harmonize;
use crate::schedule::Schedule;
use crate::voicing::Voicing;
use crate::{Error, Result};

/// Reference pitches standing for voice positions 0..3 (G2, A2, C3, E3).
pub const BASELINE_PITCHES: [u8; 4] = [43, 45, 48, 52];

/// Pitch of the note closing a rendered performance.
///
/// Played at velocity 1 for a sixty-fourth note, it is meant to be inaudible:
/// it only marks where the file ends, not musical output.
pub const END_MARKER_PITCH: u8 = 0;

/// A timed note, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Notes plus the tempo they were played at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub notes: Vec<Note>,
    pub bpm: f64,
}

/// Eighth-note grid for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    eighth: f64,
}

impl Grid {
    pub fn from_bpm(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidTempo(bpm));
        }
        Ok(Self { eighth: 30.0 / bpm })
    }

    /// Length of one slot in seconds.
    pub fn eighth(&self) -> f64 {
        self.eighth
    }

    pub fn slot_of(&self, seconds: f64) -> u32 {
        (seconds / self.eighth).round().max(0.0) as u32
    }

    pub fn time_of(&self, slot: u32) -> f64 {
        slot as f64 * self.eighth
    }
}

/// A baseline note of the reference, relative to its slot.
#[derive(Debug, Clone, Copy)]
struct Position {
    voice: usize,
    offset: f64,
    duration: f64,
    velocity: u8,
}

/// A substituted note before octave placement.
#[derive(Debug, Clone)]
struct Emission {
    owner: usize,
    pitches: Vec<i16>,
    start: f64,
    end: f64,
    velocity: u8,
}

/// Replay `reference` over `destination_slots` slots with the given voicings.
///
/// `voicings[i]` voices `schedule.assignments[i]`.
pub fn render(
    reference: &Performance,
    voicings: &[Voicing],
    schedule: &Schedule,
    destination_slots: u32,
) -> Result<Vec<Note>> {
    if voicings.len() != schedule.assignments.len() {
        return Err(Error::VoicingMismatch {
            assignments: schedule.assignments.len(),
            voicings: voicings.len(),
        });
    }
    let grid = Grid::from_bpm(reference.bpm)?;

    let (positions, span) = decompose(reference, &grid)?;
    tracing::debug!(
        positions = positions.values().map(Vec::len).sum::<usize>(),
        span,
        eighth = grid.eighth(),
        "decomposed reference"
    );

    let emissions = replay(&positions, span, voicings, schedule, destination_slots, &grid);
    tracing::debug!(emitted = emissions.len(), "substituted pitches");

    let notes = place_octaves(emissions, schedule);
    let notes = resolve_overlaps(notes);
    tracing::debug!(notes = notes.len(), "resolved overlaps");

    let notes = truncate(notes, &grid, destination_slots);
    tracing::debug!(notes = notes.len(), "rendered");
    Ok(notes)
}

/// Baseline notes grouped by slot, and the reference length in slots.
fn decompose(reference: &Performance, grid: &Grid) -> Result<(BTreeMap<u32, Vec<Position>>, u32)> {
    let mut positions: BTreeMap<u32, Vec<Position>> = BTreeMap::new();

    for note in &reference.notes {
        let Some(voice) = BASELINE_PITCHES.iter().position(|&p| p == note.pitch) else {
            continue;
        };
        let slot = grid.slot_of(note.start);
        positions.entry(slot).or_default().push(Position {
            voice,
            offset: note.start - grid.time_of(slot),
            duration: note.duration(),
            velocity: note.velocity,
        });
    }

    if positions.is_empty() {
        return Err(Error::NoReferencePositions);
    }

    let end = reference
        .notes
        .iter()
        .map(|n| n.end)
        .fold(0.0_f64, f64::max);
    let last_onset = positions.keys().next_back().map_or(0, |slot| slot + 1);
    let span = grid.slot_of(end).max(last_onset).max(1);
    Ok((positions, span))
}

fn replay(
    positions: &BTreeMap<u32, Vec<Position>>,
    span: u32,
    voicings: &[Voicing],
    schedule: &Schedule,
    destination_slots: u32,
    grid: &Grid,
) -> Vec<Emission> {
    let scheduled_end = schedule
        .assignments
        .last()
        .map_or(0, |a| a.slots.end + 1);
    let horizon = destination_slots.max(scheduled_end);

    (0..horizon)
        .filter_map(|slot| {
            let owner = schedule.owner_of(slot)?;
            let group = positions.get(&(slot % span))?;
            Some((slot, owner, group))
        })
        .flat_map(|(slot, owner, group)| {
            let assignment = &schedule.assignments[owner];
            let voicing = &voicings[owner];
            group.iter().filter_map(move |position| {
                let tone = voicing.voice(position.voice)?;
                let start = grid.time_of(slot) + position.offset;
                Some(Emission {
                    owner,
                    pitches: harmonize(tone as i16, &assignment.chord, assignment.harmonization),
                    start,
                    end: start + position.duration,
                    velocity: position.velocity,
                })
            })
        })
        .collect()
}

/// Shift each run of equally-harmonized chords so the line stays continuous
/// where the style changes, then fold into the MIDI range.
fn place_octaves(emissions: Vec<Emission>, schedule: &Schedule) -> Vec<Note> {
    let mut lowest: BTreeMap<usize, i16> = BTreeMap::new();
    for emission in &emissions {
        if let Some(&low) = emission.pitches.iter().min() {
            lowest
                .entry(emission.owner)
                .and_modify(|l| *l = (*l).min(low))
                .or_insert(low);
        }
    }

    let mut shifts = vec![0_i16; schedule.assignments.len()];
    let mut previous_low: Option<i16> = None;
    let mut run_shift = 0_i16;
    let mut pending = false;
    for (idx, assignment) in schedule.assignments.iter().enumerate() {
        if idx > 0 && schedule.assignments[idx - 1].harmonization != assignment.harmonization {
            pending = true;
            run_shift = 0;
        }

        if let Some(&low) = lowest.get(&idx) {
            if pending {
                run_shift = previous_low.map_or(0, |prev| 12 * (prev - low + 6).div_euclid(12));
                pending = false;
                if run_shift != 0 {
                    tracing::trace!(chord = idx, shift = run_shift, "octave shift at style change");
                }
            }
            previous_low = Some(low + run_shift);
        }
        shifts[idx] = run_shift;
    }

    emissions
        .into_iter()
        .flat_map(|emission| {
            let shift = shifts[emission.owner];
            emission.pitches.into_iter().map(move |pitch| Note {
                pitch: fold_midi(pitch + shift),
                velocity: emission.velocity,
                start: emission.start,
                end: emission.end,
            })
        })
        .collect()
}

fn fold_midi(mut pitch: i16) -> u8 {
    while pitch < 0 {
        pitch += 12;
    }
    while pitch > 127 {
        pitch -= 12;
    }
    pitch as u8
}

/// Cut each note at the next start of the same pitch; drop what is left empty.
fn resolve_overlaps(mut notes: Vec<Note>) -> Vec<Note> {
    notes.sort_by(|a, b| {
        a.pitch
            .cmp(&b.pitch)
            .then(a.start.total_cmp(&b.start))
            .then(a.end.total_cmp(&b.end))
    });

    for i in 1..notes.len() {
        let next = notes[i];
        let prev = &mut notes[i - 1];
        if prev.pitch == next.pitch && prev.end > next.start {
            prev.end = next.start;
        }
    }

    notes.retain(|n| n.end > n.start);
    notes
}

/// Clip to the destination length and close with the end marker.
fn truncate(mut notes: Vec<Note>, grid: &Grid, destination_slots: u32) -> Vec<Note> {
    if destination_slots == 0 {
        return Vec::new();
    }
    let limit = grid.time_of(destination_slots);

    notes.retain(|n| n.start < limit);
    for note in &mut notes {
        note.end = note.end.min(limit);
    }
    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));

    notes.push(Note {
        pitch: END_MARKER_PITCH,
        velocity: 1,
        start: limit - grid.eighth() / 8.0,
        end: limit,
    });
    notes
}
