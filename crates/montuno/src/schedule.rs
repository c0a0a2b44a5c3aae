//! Progression text to slot assignments.
//!
//! A progression is a `|`-delimited list of bars. Each bar holds one chord,
//! which takes two consecutive values from the rhythm pattern, or two chords,
//! which take one value each. Slots are eighth notes counted from the start
//! of the progression.

use serde::Serialize;
use winnow::prelude::*;
use winnow::combinator::delimited;
use winnow::token::take_while;

use crate::chord::ChordSymbol;
use crate::harmonize::Harmonization;
use crate::{Error, Result};

type PResult<T> = winnow::ModalResult<T>;

/// Slots per bar on the destination timeline.
pub const SLOTS_PER_BAR: u32 = 8;

/// Repeating sequence of slot counts: a lead-in played once, then a steady
/// cycle repeated forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RhythmPattern {
    lead_in: Vec<u32>,
    steady: Vec<u32>,
}

impl RhythmPattern {
    pub fn new(lead_in: Vec<u32>, steady: Vec<u32>) -> Result<Self> {
        if steady.is_empty() {
            return Err(Error::InvalidPattern(
                "steady cycle must not be empty".to_string(),
            ));
        }
        if let Some(zero) = lead_in.iter().chain(&steady).position(|&v| v == 0) {
            return Err(Error::InvalidPattern(format!(
                "slot count at position {} is zero",
                zero
            )));
        }
        Ok(Self { lead_in, steady })
    }

    /// Son clave, two side first.
    pub fn clave_2_3() -> Self {
        Self {
            lead_in: vec![3, 4, 4, 3],
            steady: vec![5, 4, 4, 3],
        }
    }

    /// Son clave, three side first.
    pub fn clave_3_2() -> Self {
        Self {
            lead_in: vec![3, 3, 5, 4],
            steady: vec![4, 3, 5, 4],
        }
    }

    pub fn lead_in(&self) -> &[u32] {
        &self.lead_in
    }

    pub fn steady(&self) -> &[u32] {
        &self.steady
    }

    /// The n-th slot count.
    pub fn value_at(&self, n: usize) -> u32 {
        match self.lead_in.get(n) {
            Some(&value) => value,
            None => self.steady[(n - self.lead_in.len()) % self.steady.len()],
        }
    }

    /// Every slot count from the start; never ends.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..).map(move |n| self.value_at(n))
    }
}

/// Inclusive range of slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotSpan {
    pub start: u32,
    pub end: u32,
}

impl SlotSpan {
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, slot: u32) -> bool {
        (self.start..=self.end).contains(&slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub chord: ChordSymbol,
    pub slots: SlotSpan,
    pub harmonization: Option<Harmonization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub assignments: Vec<Assignment>,
    pub bar_count: usize,
}

impl Schedule {
    /// Length of the destination timeline in slots.
    pub fn destination_slots(&self) -> u32 {
        self.bar_count as u32 * SLOTS_PER_BAR
    }

    pub fn chords(&self) -> Vec<ChordSymbol> {
        self.assignments.iter().map(|a| a.chord).collect()
    }

    /// Index of the assignment owning `slot`, if any.
    pub fn owner_of(&self, slot: u32) -> Option<usize> {
        let idx = self
            .assignments
            .partition_point(|a| a.slots.end < slot);
        self.assignments
            .get(idx)
            .filter(|a| a.slots.contains(slot))
            .map(|_| idx)
    }
}

/// Carried across segments and tokens.
#[derive(Debug, Default)]
struct FoldState {
    cursor: usize,
    next_slot: u32,
    style: Option<Harmonization>,
    assignments: Vec<Assignment>,
    bar_count: usize,
}

impl FoldState {
    fn take(&mut self, pattern: &RhythmPattern, groups: usize) -> SlotSpan {
        let len: u32 = (self.cursor..self.cursor + groups)
            .map(|n| pattern.value_at(n))
            .sum();
        self.cursor += groups;
        let span = SlotSpan {
            start: self.next_slot,
            end: self.next_slot + len - 1,
        };
        self.next_slot += len;
        span
    }
}

/// Split progression text into chord assignments.
///
/// `default` is the harmonization in force before the first inline marker.
/// A bar holding only markers changes the style and takes no slots.
pub fn schedule(
    text: &str,
    pattern: &RhythmPattern,
    default: Option<Harmonization>,
) -> Result<Schedule> {
    let initial = FoldState {
        style: default,
        ..FoldState::default()
    };

    let state = text
        .split('|')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .try_fold(initial, |mut state, segment| {
            let (chords, style) = segment.split_whitespace().try_fold(
                (Vec::new(), state.style),
                |(mut chords, style), token| {
                    let (chord, style) = parse_token(token, style)?;
                    chords.extend(chord.map(|c| (c, style)));
                    Ok::<_, Error>((chords, style))
                },
            )?;
            state.style = style;

            match chords.len() {
                0 => return Ok(state),
                1 => {
                    let (chord, style) = chords[0];
                    let slots = state.take(pattern, 2);
                    state.assignments.push(Assignment {
                        chord,
                        slots,
                        harmonization: style,
                    });
                }
                2 => {
                    for (chord, style) in chords {
                        let slots = state.take(pattern, 1);
                        state.assignments.push(Assignment {
                            chord,
                            slots,
                            harmonization: style,
                        });
                    }
                }
                n => {
                    return Err(Error::MalformedSegment {
                        segment: segment.to_string(),
                        chords: n,
                    })
                }
            }

            state.bar_count += 1;
            Ok(state)
        })?;

    tracing::debug!(
        chords = state.assignments.len(),
        bars = state.bar_count,
        slots = state.next_slot,
        "scheduled progression"
    );

    Ok(Schedule {
        assignments: state.assignments,
        bar_count: state.bar_count,
    })
}

/// One whitespace-separated token: leading markers, then an optional chord.
fn parse_token(
    token: &str,
    mut style: Option<Harmonization>,
) -> Result<(Option<ChordSymbol>, Option<Harmonization>)> {
    let mut input = token;
    loop {
        let checkpoint = input;
        let Ok(marker) = parse_marker(&mut input) else {
            input = checkpoint;
            break;
        };
        style = Some(
            Harmonization::from_marker(marker).ok_or_else(|| Error::UnknownMarker {
                marker: format!("({})", marker),
            })?,
        );
    }

    if input.is_empty() {
        return Ok((None, style));
    }
    let chord: ChordSymbol = input.parse()?;
    tracing::trace!(%chord, ?style, "token");
    Ok((Some(chord), style))
}

/// An inline style marker such as `(10)`.
fn parse_marker<'s>(input: &mut &'s str) -> PResult<&'s str> {
    delimited('(', take_while(1.., |c: char| c != ')'), ')').parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spans(schedule: &Schedule) -> Vec<(u32, u32)> {
        schedule
            .assignments
            .iter()
            .map(|a| (a.slots.start, a.slots.end))
            .collect()
    }

    #[test]
    fn test_pattern_values() {
        let pattern = RhythmPattern::clave_2_3();
        let values: Vec<u32> = pattern.values().take(10).collect();
        assert_eq!(values, vec![3, 4, 4, 3, 5, 4, 4, 3, 5, 4]);
        assert_eq!(pattern.value_at(1000), pattern.value_at(1004));
    }

    #[test]
    fn test_pattern_without_lead_in() {
        let pattern = RhythmPattern::new(vec![], vec![4]).unwrap();
        assert_eq!(pattern.value_at(0), 4);
        assert_eq!(pattern.value_at(7), 4);
    }

    #[test]
    fn test_pattern_validation() {
        assert!(matches!(
            RhythmPattern::new(vec![3], vec![]),
            Err(Error::InvalidPattern(_))
        ));
        assert!(matches!(
            RhythmPattern::new(vec![3, 0], vec![4]),
            Err(Error::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_one_and_two_chord_bars() {
        let s = schedule(
            "Cmaj7 | Dm7 G7 | Cmaj7",
            &RhythmPattern::clave_2_3(),
            None,
        )
        .unwrap();
        assert_eq!(spans(&s), vec![(0, 6), (7, 10), (11, 13), (14, 22)]);
        assert_eq!(s.bar_count, 3);
        assert_eq!(s.destination_slots(), 24);
    }

    #[test]
    fn test_three_two_pattern() {
        let s = schedule("C7 | F7 | G7 C7", &RhythmPattern::clave_3_2(), None).unwrap();
        assert_eq!(spans(&s), vec![(0, 5), (6, 14), (15, 18), (19, 21)]);
    }

    #[test]
    fn test_blank_segments_skipped() {
        let s = schedule("| C7 || F7 |", &RhythmPattern::clave_2_3(), None).unwrap();
        assert_eq!(s.bar_count, 2);
        assert_eq!(spans(&s), vec![(0, 6), (7, 13)]);
    }

    #[test]
    fn test_three_chords_is_malformed() {
        let err = schedule("C7 F7 G7", &RhythmPattern::clave_2_3(), None).unwrap_err();
        assert!(matches!(err, Error::MalformedSegment { chords: 3, .. }));
    }

    #[test]
    fn test_marker_only_segment_changes_style() {
        let s = schedule("C7 | (10) | F7", &RhythmPattern::clave_2_3(), None).unwrap();
        assert_eq!(s.bar_count, 2);
        assert_eq!(spans(&s), vec![(0, 6), (7, 13)]);
        assert_eq!(s.assignments[0].harmonization, None);
        assert_eq!(s.assignments[1].harmonization, Some(Harmonization::Tenths));
    }

    #[test]
    fn test_marker_applies_forward() {
        let s = schedule(
            "C7 | (10)F7 Bb7 | G7",
            &RhythmPattern::clave_2_3(),
            Some(Harmonization::Octaves),
        )
        .unwrap();
        let styles: Vec<_> = s.assignments.iter().map(|a| a.harmonization).collect();
        assert_eq!(
            styles,
            vec![
                Some(Harmonization::Octaves),
                Some(Harmonization::Tenths),
                Some(Harmonization::Tenths),
                Some(Harmonization::Tenths),
            ]
        );
    }

    #[test]
    fn test_standalone_marker_token() {
        let s = schedule("C7 (13) | F7", &RhythmPattern::clave_2_3(), None).unwrap();
        assert_eq!(s.assignments[0].harmonization, None);
        assert_eq!(s.assignments[1].harmonization, Some(Harmonization::Thirteenths));
    }

    #[test]
    fn test_unknown_marker() {
        let err = schedule("(9)C7", &RhythmPattern::clave_2_3(), None).unwrap_err();
        assert!(matches!(err, Error::UnknownMarker { ref marker } if marker == "(9)"));
    }

    #[test]
    fn test_chord_suffix_parens_are_not_markers() {
        let s = schedule("G7(b9)", &RhythmPattern::clave_2_3(), None).unwrap();
        assert_eq!(s.assignments[0].chord.to_string(), "G7(b9)");
    }

    #[test]
    fn test_owner_of() {
        let s = schedule("Cmaj7 | Dm7 G7", &RhythmPattern::clave_2_3(), None).unwrap();
        assert_eq!(s.owner_of(0), Some(0));
        assert_eq!(s.owner_of(6), Some(0));
        assert_eq!(s.owner_of(7), Some(1));
        assert_eq!(s.owner_of(13), Some(2));
        assert_eq!(s.owner_of(14), None);
    }

    #[test]
    fn test_empty_progression() {
        let s = schedule("  |  ", &RhythmPattern::clave_2_3(), None).unwrap();
        assert!(s.assignments.is_empty());
        assert_eq!(s.destination_slots(), 0);
    }
}
