use crate::model::note::NoteAtom;
use serde::{Deserialize, Serialize};

/// Default-octave selector for untagged notes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lane {
    #[default]
    Low,
    High,
}

impl Lane {
    pub fn octave(self) -> i32 {
        match self {
            Lane::Low => 4,
            Lane::High => 5,
        }
    }
}

/// Session defaults in effect at some point in the song text.
///
/// The parser threads a copy of this through the token stream; every event
/// snapshots the values in effect at its own position, so later header
/// assignments never retroactively change earlier events.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Defaults {
    pub bpm: f64,
    pub unit: u32,
    pub hold_s: f64,
    pub stagger_s: f64,
    pub repeat: u32,
    pub lane: Lane,
}

impl Defaults {
    /// Seconds per quarter note at the current tempo.
    pub fn quarter_secs(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            unit: 8,
            hold_s: 0.12,
            stagger_s: 0.008,
            repeat: 1,
            lane: Lane::Low,
        }
    }
}

/// One fully resolved chord or rest.
///
/// `notes` order is strum order. A rest is exactly `[NoteAtom::Rest]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    pub notes: Vec<NoteAtom>,
    pub duration_s: f64,
    pub hold_s: f64,
    pub stagger_s: f64,
    pub repeat: u32,
}

impl Event {
    pub fn is_rest(&self) -> bool {
        self.notes.as_slice() == [NoteAtom::Rest]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub tempo_bpm: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Song {
    pub metadata: Metadata,
    pub events: Vec<Event>,
}
