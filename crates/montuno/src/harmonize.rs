//! Harmonization styles: how a substituted voicing tone is doubled or
//! re-harmonized before it is emitted.
//!
//! Pitches are handled as `i16` here; the render engine folds the result
//! back into the MIDI range.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chord::ChordSymbol;
use crate::Error;

/// A rule for duplicating or repositioning a substituted tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Harmonization {
    /// Tone plus the octave above.
    Octaves,
    /// Octave below and octave above; the tone itself is dropped.
    DoubleOctave,
    /// Tone plus a tenth above, chosen by the tone's chord function.
    Tenths,
    /// Tone raised an octave over a companion a thirteenth below.
    Thirteenths,
}

impl Harmonization {
    pub const ALL: [Harmonization; 4] = [
        Harmonization::Octaves,
        Harmonization::DoubleOctave,
        Harmonization::Tenths,
        Harmonization::Thirteenths,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Harmonization::Octaves => "octaves",
            Harmonization::DoubleOctave => "double-octave",
            Harmonization::Tenths => "tenths",
            Harmonization::Thirteenths => "thirteenths",
        }
    }

    /// Resolve the text between the parentheses of an inline marker, e.g. `10` in `(10)`.
    pub fn from_marker(marker: &str) -> Option<Harmonization> {
        match marker.trim().to_ascii_lowercase().as_str() {
            "8" | "8va" | "oct" => Some(Harmonization::Octaves),
            "15" | "15ma" | "2oct" => Some(Harmonization::DoubleOctave),
            "10" | "10ths" => Some(Harmonization::Tenths),
            "13" | "13ths" => Some(Harmonization::Thirteenths),
            _ => None,
        }
    }
}

impl fmt::Display for Harmonization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Harmonization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Harmonization::ALL
            .into_iter()
            .find(|h| h.name() == normalized)
            .or_else(|| Harmonization::from_marker(&normalized))
            .ok_or_else(|| Error::UnknownMarker {
                marker: s.to_string(),
            })
    }
}

/// Role of a tone within its chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordFunction {
    Root,
    /// Third, or the suspended second/fourth standing in for it.
    Third,
    Fifth,
    /// Added sixth, or the bb7 of a diminished seventh chord.
    Sixth,
    Seventh,
    Ninth,
}

/// Classify a pitch against the chord's interval set by pitch class.
pub fn classify(pitch: i16, chord: &ChordSymbol) -> Option<ChordFunction> {
    let pc = pitch.rem_euclid(12) as u8;
    let intervals = chord.intervals();
    let position = intervals
        .iter()
        .position(|&i| (chord.root + i) % 12 == pc)?;

    Some(match position {
        0 => ChordFunction::Root,
        1 => ChordFunction::Third,
        2 => ChordFunction::Fifth,
        3 if intervals[3] == 9 => ChordFunction::Sixth,
        3 => ChordFunction::Seventh,
        _ => ChordFunction::Ninth,
    })
}

/// Companion tone a tenth above `pitch`, placed by chord function.
///
/// The companion is `root + target + offset`, where `root` is the chord root
/// at or below `pitch`:
///
/// | function      | target                              | offset |
/// |---------------|-------------------------------------|--------|
/// | root          | third                               | 12     |
/// | third         | fifth                               | 12     |
/// | fifth         | seventh (major seventh on 6 chords) | 12     |
/// | sixth         | root                                | 24     |
/// | seventh       | ninth (flat when the chord has one) | 24     |
///
/// Ninths never appear in a voicing, so they have no companion.
pub fn companion(pitch: i16, chord: &ChordSymbol) -> Option<i16> {
    let intervals = chord.intervals();
    let function = classify(pitch, chord)?;

    let (target, offset): (u8, i16) = match function {
        ChordFunction::Root => (intervals[1], 12),
        ChordFunction::Third => (intervals[2], 12),
        ChordFunction::Fifth if chord.quality.is_sixth_chord() => (11, 12),
        ChordFunction::Fifth => (intervals[3], 12),
        ChordFunction::Sixth => (0, 24),
        ChordFunction::Seventh => (intervals.get(4).map_or(2, |ninth| ninth % 12), 24),
        ChordFunction::Ninth => return None,
    };

    let below = (pitch - chord.root as i16).rem_euclid(12);
    let root = pitch - below;
    Some(root + target as i16 + offset)
}

/// Pitches emitted for one substituted tone under a style.
///
/// `None` is the plain style: the tone alone. A tone with no recognized
/// chord function falls back to the plain tone under tenths and thirteenths.
pub fn harmonize(tone: i16, chord: &ChordSymbol, style: Option<Harmonization>) -> Vec<i16> {
    match style {
        None => vec![tone],
        Some(Harmonization::Octaves) => vec![tone, tone + 12],
        Some(Harmonization::DoubleOctave) => vec![tone - 12, tone + 12],
        Some(Harmonization::Tenths) => match companion(tone, chord) {
            Some(upper) => vec![tone, upper],
            None => vec![tone],
        },
        Some(Harmonization::Thirteenths) => match companion(tone, chord) {
            Some(upper) => vec![upper - 24, tone + 12],
            None => vec![tone],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chord(s: &str) -> ChordSymbol {
        s.parse().unwrap()
    }

    #[test]
    fn test_marker_names() {
        assert_eq!(Harmonization::from_marker("8"), Some(Harmonization::Octaves));
        assert_eq!(Harmonization::from_marker("15"), Some(Harmonization::DoubleOctave));
        assert_eq!(Harmonization::from_marker("10"), Some(Harmonization::Tenths));
        assert_eq!(Harmonization::from_marker("13ths"), Some(Harmonization::Thirteenths));
        assert_eq!(Harmonization::from_marker("9"), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("double-octave".parse::<Harmonization>().unwrap(), Harmonization::DoubleOctave);
        assert_eq!("Double Octave".parse::<Harmonization>().unwrap(), Harmonization::DoubleOctave);
        assert_eq!("tenths".parse::<Harmonization>().unwrap(), Harmonization::Tenths);
        assert!("sixths".parse::<Harmonization>().is_err());
    }

    #[test]
    fn test_classify_dominant() {
        let g7 = chord("G7");
        assert_eq!(classify(55, &g7), Some(ChordFunction::Root));
        assert_eq!(classify(59, &g7), Some(ChordFunction::Third));
        assert_eq!(classify(62, &g7), Some(ChordFunction::Fifth));
        assert_eq!(classify(65, &g7), Some(ChordFunction::Seventh));
        assert_eq!(classify(61, &g7), None);
    }

    #[test]
    fn test_classify_sixth_and_diminished() {
        assert_eq!(classify(57, &chord("C6")), Some(ChordFunction::Sixth));
        assert_eq!(classify(57, &chord("Cº7")), Some(ChordFunction::Sixth));
        assert_eq!(classify(56, &chord("G7(b9)")), Some(ChordFunction::Ninth));
    }

    #[test]
    fn test_companions_are_tenths() {
        for symbol in ["C7", "Dm7", "F∆", "C6", "Am6", "Bø", "Cº7", "G7(b9)", "C7sus4"] {
            let c = chord(symbol);
            for &interval in &c.intervals()[..4] {
                let tone = 48 + ((c.root + interval) % 12) as i16;
                let upper = companion(tone, &c).unwrap();
                let gap = upper - tone;
                assert!(
                    (13..=17).contains(&gap),
                    "{} tone {} companion {} gap {}",
                    symbol,
                    tone,
                    upper,
                    gap
                );
            }
        }
    }

    #[test]
    fn test_companion_targets() {
        // C7: E3 (third) → G4
        assert_eq!(companion(52, &chord("C7")), Some(67));
        // C6: G3 (fifth) → B4, the major seventh
        assert_eq!(companion(55, &chord("C6")), Some(71));
        // C6: A3 (sixth) → C5
        assert_eq!(companion(57, &chord("C6")), Some(72));
        // C7: Bb3 (seventh) → D5
        assert_eq!(companion(58, &chord("C7")), Some(74));
        // C7(b9): Bb3 (seventh) → Db5
        assert_eq!(companion(58, &chord("C7(b9)")), Some(73));
    }

    #[test]
    fn test_harmonize_styles() {
        let c7 = chord("C7");
        assert_eq!(harmonize(60, &c7, None), vec![60]);
        assert_eq!(harmonize(60, &c7, Some(Harmonization::Octaves)), vec![60, 72]);
        assert_eq!(harmonize(60, &c7, Some(Harmonization::DoubleOctave)), vec![48, 72]);
        assert_eq!(harmonize(60, &c7, Some(Harmonization::Tenths)), vec![60, 76]);
        assert_eq!(harmonize(60, &c7, Some(Harmonization::Thirteenths)), vec![52, 72]);
    }

    #[test]
    fn test_unclassified_tone_falls_back() {
        let c7 = chord("C7");
        assert_eq!(harmonize(61, &c7, Some(Harmonization::Tenths)), vec![61]);
    }
}
