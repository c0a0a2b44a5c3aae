use midly::Timing;
use serde::{Deserialize, Serialize};

/// Microseconds per beat when a file sets no tempo (120 BPM).
pub const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.microseconds_per_beat as f64
    }
}

/// How ticks relate to wall time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Timebase {
    /// Ticks per quarter note; seconds follow the tempo map.
    Metrical(u16),
    /// Fixed ticks per second (SMPTE timecode); tempo changes do not apply.
    Timecode(f64),
}

impl From<Timing> for Timebase {
    fn from(timing: Timing) -> Self {
        match timing {
            Timing::Metrical(ppq) => Timebase::Metrical(ppq.as_int()),
            Timing::Timecode(fps, subframes) => {
                Timebase::Timecode(fps.as_f32() as f64 * subframes as f64)
            }
        }
    }
}

/// Tick to seconds conversion across every tempo change in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    timebase: Timebase,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn new(timebase: Timebase, mut changes: Vec<TempoChange>) -> Self {
        // format 1 files may repeat the same change on several tracks
        changes.sort_by_key(|c| c.tick);
        changes.dedup_by(|a, b| a.tick == b.tick && a.microseconds_per_beat == b.microseconds_per_beat);
        Self { timebase, changes }
    }

    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Tempo of the first change, or 120 BPM.
    pub fn initial_bpm(&self) -> f64 {
        self.changes
            .first()
            .map_or(60_000_000.0 / DEFAULT_MICROSECONDS_PER_BEAT as f64, TempoChange::bpm)
    }

    pub fn seconds_at(&self, tick: u64) -> f64 {
        let ppq = match self.timebase {
            Timebase::Timecode(ticks_per_second) => return tick as f64 / ticks_per_second,
            Timebase::Metrical(ppq) => ppq as f64,
        };

        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_MICROSECONDS_PER_BEAT;
        for change in self.changes.iter().take_while(|c| c.tick <= tick) {
            seconds += (change.tick - last_tick) as f64 * usec as f64 / 1e6 / ppq;
            last_tick = change.tick;
            usec = change.microseconds_per_beat;
        }
        seconds + (tick - last_tick) as f64 * usec as f64 / 1e6 / ppq
    }
}
