//! Four-note voicings with a voice-led bass.
//!
//! The bass of each voicing is the chord's fifth or seventh, whichever lies
//! closer to the previous bass. The other three tones stack above it near
//! fixed reference positions, kept within the middle register.

use serde::Serialize;

use crate::chord::{pitch_name, ChordSymbol};

/// Reference positions for the four voices, lowest first.
pub const REFERENCE_POSITIONS: [u8; 4] = [55, 57, 60, 64];

/// Register the bass and upper voices are folded into, inclusive.
pub const VOICING_RANGE: (i16, i16) = (53, 67);

/// Which chord tone carries the bass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BassTone {
    Fifth,
    Seventh,
}

/// Four MIDI pitches, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Voicing {
    pub pitches: [u8; 4],
    pub bass_tone: BassTone,
}

impl Voicing {
    pub fn bass(&self) -> u8 {
        self.pitches[0]
    }

    /// Tone at a voice-order position, 0 being the lowest.
    pub fn voice(&self, order: usize) -> Option<u8> {
        self.pitches.get(order).copied()
    }
}

/// The pitch with class `pc` nearest to `target`; ties go up.
pub fn nearest(pc: u8, target: i16) -> i16 {
    let above = target + (pc as i16 - target).rem_euclid(12);
    if (above - target).abs() > (above - 12 - target).abs() {
        above - 12
    } else {
        above
    }
}

fn fold_into_range(mut pitch: i16) -> i16 {
    let (low, high) = VOICING_RANGE;
    while pitch < low {
        pitch += 12;
    }
    while pitch > high {
        pitch -= 12;
    }
    pitch
}

fn raise_above(mut pitch: i16, floor: i16) -> i16 {
    while pitch <= floor {
        pitch += 12;
    }
    pitch
}

/// One voicing per chord, each bass led from the one before.
pub fn generate(chords: &[ChordSymbol]) -> Vec<Voicing> {
    let mut prev_bass = REFERENCE_POSITIONS[0] as i16;

    chords
        .iter()
        .map(|chord| {
            let voicing = voice_chord(chord, prev_bass);
            prev_bass = voicing.bass() as i16;
            voicing
        })
        .collect()
}

fn voice_chord(chord: &ChordSymbol, prev_bass: i16) -> Voicing {
    let fifth = nearest(chord.fifth(), prev_bass);
    let seventh = nearest(chord.seventh(), prev_bass);

    let (bass, bass_tone, remaining) =
        if (seventh - prev_bass).abs() < (fifth - prev_bass).abs() {
            (seventh, BassTone::Seventh, chord.fifth())
        } else {
            (fifth, BassTone::Fifth, chord.seventh())
        };
    let bass = fold_into_range(bass);

    let intervals = chord.intervals();
    let upper = [
        (chord.root + intervals[0]) % 12,
        (chord.root + intervals[1]) % 12,
        remaining,
    ];

    let mut pitches = [bass; 4];
    for (slot, (pc, reference)) in upper
        .iter()
        .zip(&REFERENCE_POSITIONS[1..])
        .enumerate()
    {
        let pitch = raise_above(nearest(*pc, *reference as i16), bass);
        pitches[slot + 1] = raise_above(fold_into_range(pitch), bass);
    }
    pitches.sort_unstable();

    let pitches = pitches.map(|p| p as u8);
    tracing::debug!(
        %chord,
        pitches = ?pitches.map(pitch_name),
        bass = ?bass_tone,
        "voiced chord"
    );

    Voicing { pitches, bass_tone }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::ChordQuality;
    use pretty_assertions::assert_eq;

    fn chords(symbols: &[&str]) -> Vec<ChordSymbol> {
        symbols.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_nearest() {
        assert_eq!(nearest(7, 55), 55);
        assert_eq!(nearest(0, 55), 60);
        assert_eq!(nearest(3, 55), 51);
        // six semitones either way: up wins
        assert_eq!(nearest(1, 55), 61);
    }

    #[test]
    fn test_first_chord_from_g3() {
        let v = generate(&chords(&["C7"]));
        assert_eq!(v[0].pitches, [55, 58, 60, 64]);
        assert_eq!(v[0].bass_tone, BassTone::Fifth);
    }

    #[test]
    fn test_seventh_bass_when_closer() {
        // Ab is a semitone above G3, F two below
        let v = generate(&chords(&["Bb7"]));
        assert_eq!(v[0].bass_tone, BassTone::Seventh);
        assert_eq!(v[0].bass(), 56);
    }

    #[test]
    fn test_bass_led_from_previous_bass() {
        // C7: G3 55 (0) beats Bb3 58 (3)
        // F7 from 55: Eb3 51 (4) beats C4 60 (5), folded up to 63
        // Bb7 from 63: F4 65 (2) beats Ab4 68 (5)
        // Eb7 from 65: Db4 61 (4) beats Bb4 70 (5)
        // Emaj7 from 61: B3 59 and Eb4 63 are both 2 away, fifth wins
        let v = generate(&chords(&["C7", "F7", "Bb7", "Eb7", "Emaj7"]));
        let basses: Vec<(u8, BassTone)> = v.iter().map(|v| (v.bass(), v.bass_tone)).collect();
        assert_eq!(
            basses,
            vec![
                (55, BassTone::Fifth),
                (63, BassTone::Seventh),
                (65, BassTone::Fifth),
                (61, BassTone::Seventh),
                (59, BassTone::Fifth),
            ]
        );
    }

    #[test]
    fn test_equidistant_bass_prefers_fifth() {
        // from G3: F3 53 and A3 57 are both 2 away
        let v = generate(&chords(&["Bbmaj7"]));
        assert_eq!(v[0].bass(), 53);
        assert_eq!(v[0].bass_tone, BassTone::Fifth);
    }

    #[test]
    fn test_bass_is_fifth_or_seventh_for_every_chord() {
        let roots = ["C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B"];
        let symbols: Vec<String> = roots
            .iter()
            .flat_map(|r| ChordQuality::ALL.iter().map(move |q| format!("{}{}", r, q.suffix())))
            .collect();
        let parsed: Vec<ChordSymbol> = symbols.iter().map(|s| s.parse().unwrap()).collect();

        for (chord, voicing) in parsed.iter().zip(generate(&parsed)) {
            let bass_pc = voicing.bass() % 12;
            assert!(
                bass_pc == chord.fifth() || bass_pc == chord.seventh(),
                "{} voiced {:?}",
                chord,
                voicing.pitches
            );
            assert!(voicing.pitches.windows(2).all(|w| w[0] < w[1]), "{:?}", voicing);

            let (low, high) = VOICING_RANGE;
            assert!((low..=high).contains(&(voicing.bass() as i16)));

            let mut classes: Vec<u8> = voicing.pitches.iter().map(|p| p % 12).collect();
            let mut expected: Vec<u8> = chord.pitch_classes().into_iter().take(4).collect();
            classes.sort_unstable();
            expected.sort_unstable();
            assert_eq!(classes, expected, "{}", chord);
        }
    }

    #[test]
    fn test_flat_ninth_voices_core_tones() {
        let v = generate(&chords(&["G7(b9)"]));
        let classes: Vec<u8> = v[0].pitches.iter().map(|p| p % 12).collect();
        assert!(!classes.contains(&8));
    }

    #[test]
    fn test_empty() {
        assert!(generate(&[]).is_empty());
    }
}
