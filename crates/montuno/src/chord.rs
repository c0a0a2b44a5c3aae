//! Chord symbol parsing.
//!
//! A symbol is a root spelling (`C`, `F#`, `Bb`, ...) followed by a quality
//! suffix from a fixed table. Both lookups are static; parsing is pure.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use winnow::combinator::opt;
use winnow::prelude::*;
use winnow::token::one_of;

use crate::{Error, Result};

type PResult<T> = winnow::ModalResult<T>;

/// Chord qualities understood by the voicing generator.
///
/// Interval sets are ordered root, third, fifth, seventh-equivalent and an
/// optional flat ninth. Suspended chords keep the suspension in the third slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major6,
    Dominant7,
    Major7,
    Minor6,
    Minor7,
    MinorMajor7,
    Augmented7,
    Major7Sus4,
    Major7Sus2,
    Dominant7Sus4,
    Dominant7Sus2,
    Diminished7,
    DiminishedMajor7,
    HalfDiminished,
    Dominant7Flat5,
    Major7Flat5,
    Dominant7Flat9,
    Augmented7Flat9,
    Dominant7Flat5Flat9,
    Dominant7Sus4Flat9,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 20] = [
        ChordQuality::Major6,
        ChordQuality::Dominant7,
        ChordQuality::Major7,
        ChordQuality::Minor6,
        ChordQuality::Minor7,
        ChordQuality::MinorMajor7,
        ChordQuality::Augmented7,
        ChordQuality::Major7Sus4,
        ChordQuality::Major7Sus2,
        ChordQuality::Dominant7Sus4,
        ChordQuality::Dominant7Sus2,
        ChordQuality::Diminished7,
        ChordQuality::DiminishedMajor7,
        ChordQuality::HalfDiminished,
        ChordQuality::Dominant7Flat5,
        ChordQuality::Major7Flat5,
        ChordQuality::Dominant7Flat9,
        ChordQuality::Augmented7Flat9,
        ChordQuality::Dominant7Flat5Flat9,
        ChordQuality::Dominant7Sus4Flat9,
    ];

    /// Semitone offsets from the root.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major6 => &[0, 4, 7, 9],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor6 => &[0, 3, 7, 9],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::MinorMajor7 => &[0, 3, 7, 11],
            ChordQuality::Augmented7 => &[0, 4, 8, 10],
            ChordQuality::Major7Sus4 => &[0, 5, 7, 11],
            ChordQuality::Major7Sus2 => &[0, 2, 7, 11],
            ChordQuality::Dominant7Sus4 => &[0, 5, 7, 10],
            ChordQuality::Dominant7Sus2 => &[0, 2, 7, 10],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::DiminishedMajor7 => &[0, 3, 6, 11],
            ChordQuality::HalfDiminished => &[0, 3, 6, 10],
            ChordQuality::Dominant7Flat5 => &[0, 4, 6, 10],
            ChordQuality::Major7Flat5 => &[0, 4, 6, 11],
            ChordQuality::Dominant7Flat9 => &[0, 4, 7, 10, 13],
            ChordQuality::Augmented7Flat9 => &[0, 4, 8, 10, 13],
            ChordQuality::Dominant7Flat5Flat9 => &[0, 4, 6, 10, 13],
            ChordQuality::Dominant7Sus4Flat9 => &[0, 5, 7, 10, 13],
        }
    }

    /// Canonical suffix, as written in montuno chord charts.
    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Major6 => "6",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "∆",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m∆",
            ChordQuality::Augmented7 => "+7",
            ChordQuality::Major7Sus4 => "∆sus4",
            ChordQuality::Major7Sus2 => "∆sus2",
            ChordQuality::Dominant7Sus4 => "7sus4",
            ChordQuality::Dominant7Sus2 => "7sus2",
            ChordQuality::Diminished7 => "º7",
            ChordQuality::DiminishedMajor7 => "º∆",
            ChordQuality::HalfDiminished => "ø",
            ChordQuality::Dominant7Flat5 => "7(b5)",
            ChordQuality::Major7Flat5 => "∆(b5)",
            ChordQuality::Dominant7Flat9 => "7(b9)",
            ChordQuality::Augmented7Flat9 => "+7(b9)",
            ChordQuality::Dominant7Flat5Flat9 => "7(b5)b9",
            ChordQuality::Dominant7Sus4Flat9 => "7sus4(b9)",
        }
    }

    /// Major and minor sixth chords. The diminished seventh also carries
    /// interval 9, but as a bb7 rather than an added sixth.
    pub fn is_sixth_chord(self) -> bool {
        matches!(self, ChordQuality::Major6 | ChordQuality::Minor6)
    }

    /// Look up a suffix, accepting the canonical form and common ASCII spellings.
    pub fn from_suffix(suffix: &str) -> Option<ChordQuality> {
        SUFFIX_ALIASES
            .iter()
            .find(|(alias, _)| *alias == suffix)
            .map(|(_, quality)| *quality)
            .or_else(|| Self::ALL.into_iter().find(|q| q.suffix() == suffix))
    }
}

/// Alternative spellings for suffixes. Canonical suffixes are matched separately.
static SUFFIX_ALIASES: &[(&str, ChordQuality)] = &[
    ("maj7", ChordQuality::Major7),
    ("M7", ChordQuality::Major7),
    ("Δ", ChordQuality::Major7),
    ("^7", ChordQuality::Major7),
    ("-6", ChordQuality::Minor6),
    ("-7", ChordQuality::Minor7),
    ("min7", ChordQuality::Minor7),
    ("mmaj7", ChordQuality::MinorMajor7),
    ("m(maj7)", ChordQuality::MinorMajor7),
    ("mΔ", ChordQuality::MinorMajor7),
    ("-∆", ChordQuality::MinorMajor7),
    ("aug7", ChordQuality::Augmented7),
    ("7(#5)", ChordQuality::Augmented7),
    ("7#5", ChordQuality::Augmented7),
    ("maj7sus4", ChordQuality::Major7Sus4),
    ("Δsus4", ChordQuality::Major7Sus4),
    ("maj7sus2", ChordQuality::Major7Sus2),
    ("Δsus2", ChordQuality::Major7Sus2),
    ("7sus", ChordQuality::Dominant7Sus4),
    ("dim7", ChordQuality::Diminished7),
    ("°7", ChordQuality::Diminished7),
    ("o7", ChordQuality::Diminished7),
    ("dimmaj7", ChordQuality::DiminishedMajor7),
    ("°∆", ChordQuality::DiminishedMajor7),
    ("o∆", ChordQuality::DiminishedMajor7),
    ("º(maj7)", ChordQuality::DiminishedMajor7),
    ("m7b5", ChordQuality::HalfDiminished),
    ("m7(b5)", ChordQuality::HalfDiminished),
    ("Ø", ChordQuality::HalfDiminished),
    ("ø7", ChordQuality::HalfDiminished),
    ("7b5", ChordQuality::Dominant7Flat5),
    ("maj7(b5)", ChordQuality::Major7Flat5),
    ("maj7b5", ChordQuality::Major7Flat5),
    ("Δ(b5)", ChordQuality::Major7Flat5),
    ("7b9", ChordQuality::Dominant7Flat9),
    ("aug7(b9)", ChordQuality::Augmented7Flat9),
    ("+7b9", ChordQuality::Augmented7Flat9),
    ("7(b5,b9)", ChordQuality::Dominant7Flat5Flat9),
    ("7b5b9", ChordQuality::Dominant7Flat5Flat9),
    ("7sus4b9", ChordQuality::Dominant7Sus4Flat9),
];

/// Root spellings and their pitch classes.
static ROOT_SPELLINGS: &[(&str, u8)] = &[
    ("C", 0),
    ("B#", 0),
    ("C#", 1),
    ("Db", 1),
    ("D", 2),
    ("D#", 3),
    ("Eb", 3),
    ("E", 4),
    ("Fb", 4),
    ("F", 5),
    ("E#", 5),
    ("F#", 6),
    ("Gb", 6),
    ("G", 7),
    ("G#", 8),
    ("Ab", 8),
    ("A", 9),
    ("A#", 10),
    ("Bb", 10),
    ("B", 11),
    ("Cb", 11),
];

/// A parsed chord: root pitch class plus quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChordSymbol {
    /// Pitch class of the root (0 = C).
    pub root: u8,
    /// Root as spelled in the chart, kept for display.
    pub root_name: &'static str,
    pub quality: ChordQuality,
}

impl ChordSymbol {
    pub fn intervals(&self) -> &'static [u8] {
        self.quality.intervals()
    }

    /// Pitch classes of every chord tone, in interval order.
    pub fn pitch_classes(&self) -> Vec<u8> {
        self.intervals()
            .iter()
            .map(|&i| (self.root + i) % 12)
            .collect()
    }

    pub fn fifth(&self) -> u8 {
        (self.root + self.intervals()[2]) % 12
    }

    /// The seventh, or the sixth on sixth chords.
    pub fn seventh(&self) -> u8 {
        (self.root + self.intervals()[3]) % 12
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root_name, self.quality.suffix())
    }
}

impl FromStr for ChordSymbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_symbol(s.trim())
    }
}

/// Parse a chord symbol into its root pitch class and interval set.
pub fn parse(symbol: &str) -> Result<(u8, &'static [u8])> {
    let chord: ChordSymbol = symbol.parse()?;
    Ok((chord.root, chord.intervals()))
}

fn parse_symbol(symbol: &str) -> Result<ChordSymbol> {
    let unrecognized = || Error::UnrecognizedChord {
        symbol: symbol.to_string(),
    };

    let mut input = symbol;
    parse_root(&mut input).map_err(|_| unrecognized())?;
    let spelled = &symbol[..symbol.len() - input.len()];

    let (root_name, root) = ROOT_SPELLINGS
        .iter()
        .find(|(name, _)| *name == spelled)
        .copied()
        .ok_or_else(unrecognized)?;
    let quality = ChordQuality::from_suffix(input).ok_or_else(unrecognized)?;

    Ok(ChordSymbol {
        root,
        root_name,
        quality,
    })
}

/// Root letter with an optional sharp or flat.
fn parse_root(input: &mut &str) -> PResult<(char, Option<char>)> {
    let letter = one_of('A'..='G').parse_next(input)?;
    let accidental = opt(one_of(['#', 'b'])).parse_next(input)?;
    Ok((letter, accidental))
}

/// Name of a MIDI pitch, e.g. 55 → "G3".
pub fn pitch_name(pitch: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    let octave = pitch as i16 / 12 - 1;
    format!("{}{}", NAMES[(pitch % 12) as usize], octave)
}
