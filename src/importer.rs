use crate::model::note::Pitch;
use anyhow::{Result, anyhow};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use num_rational::Ratio;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

/// One element of a notation stream: a chord (or single note), or a rest
/// when `pitches` is empty. Duration is an exact rational quarter-length.
#[derive(Debug, Clone, PartialEq)]
pub struct NotationElement {
    pub pitches: Vec<Pitch>,
    pub quarters: Ratio<i64>,
}

impl NotationElement {
    pub fn is_rest(&self) -> bool {
        self.pitches.is_empty()
    }
}

/// Narrow interface over anything that can supply a pitch/duration/tempo
/// stream for conversion into song text.
pub trait NotationSource {
    fn tempo_bpm(&self) -> Option<u32>;
    fn elements(&self) -> &[NotationElement];
}

/// A notation stream extracted from a standard MIDI file.
#[derive(Debug, Clone, Default)]
pub struct MidiScore {
    pub title: Option<String>,
    pub bpm: Option<u32>,
    pub elements: Vec<NotationElement>,
}

impl NotationSource for MidiScore {
    fn tempo_bpm(&self) -> Option<u32> {
        self.bpm
    }

    fn elements(&self) -> &[NotationElement] {
        &self.elements
    }
}

struct NoteInterval {
    midi: u8,
    start_tick: u64,
    end_tick: u64,
}

pub fn import_midi_file<P: AsRef<Path>>(path: P, transpose_semitones: i32) -> Result<MidiScore> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read MIDI file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    let mut score = midi_bytes_to_score(&bytes, transpose_semitones)?;
    score.title = path
        .as_ref()
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());

    Ok(score)
}

fn midi_bytes_to_score(bytes: &[u8], transpose_semitones: i32) -> Result<MidiScore> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u64,
        Timing::Timecode(_fps, _subframe) => {
            return Err(anyhow!(
                "SMPTE timecode midi timing is not currently supported..!"
            ));
        }
    };

    debug!("Ticks per quarter note: {}", ticks_per_quarter);
    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let mut first_mpqn: Option<u32> = None;
    let mut intervals: Vec<NoteInterval> = Vec::new();
    let mut open_notes: HashMap<(u8, u8), Vec<u64>> = HashMap::new();

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micro)) => {
                    if first_mpqn.is_none() {
                        first_mpqn = Some(micro.as_int());
                        debug!(
                            "Tempo at tick {} -> {} us/qn (track {})",
                            abs_tick,
                            micro.as_int(),
                            track_idx
                        );
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();

                    match message {
                        MidiMessage::NoteOn { key, vel } => {
                            if vel.as_int() == 0 {
                                close_note(&mut open_notes, &mut intervals, ch, key.as_int(), abs_tick);
                            } else {
                                open_notes
                                    .entry((ch, key.as_int()))
                                    .or_default()
                                    .push(abs_tick);
                            }
                        }
                        MidiMessage::NoteOff { key, vel: _ } => {
                            close_note(&mut open_notes, &mut intervals, ch, key.as_int(), abs_tick);
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    let last_tick = intervals.iter().map(|i| i.end_tick).max().unwrap_or(0);

    for ((ch, key), stack) in open_notes.into_iter() {
        for start_tick in stack {
            let end_tick = last_tick.max(start_tick + ticks_per_quarter);
            warn!(
                "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                key, ch, start_tick, end_tick
            );
            intervals.push(NoteInterval {
                midi: key,
                start_tick,
                end_tick,
            });
        }
    }

    if transpose_semitones != 0 {
        intervals.retain_mut(|interval| {
            let shifted = interval.midi as i32 + transpose_semitones;
            if (0..=127).contains(&shifted) {
                interval.midi = shifted as u8;
                true
            } else {
                warn!("Dropping out-of-range MIDI {} after transpose..!", shifted);
                false
            }
        });
    }

    let bpm = first_mpqn
        .or(Some(DEFAULT_MPQN))
        .map(|mpqn| (MICROSECONDS_PER_MINUTE / mpqn as f64).round() as u32);

    Ok(MidiScore {
        title: None,
        bpm,
        elements: elements_from_intervals(intervals, ticks_per_quarter),
    })
}

fn close_note(
    open_notes: &mut HashMap<(u8, u8), Vec<u64>>,
    intervals: &mut Vec<NoteInterval>,
    ch: u8,
    midi_num: u8,
    abs_tick: u64,
) {
    if let Some(start_tick) = open_notes.get_mut(&(ch, midi_num)).and_then(Vec::pop) {
        intervals.push(NoteInterval {
            midi: midi_num,
            start_tick,
            end_tick: abs_tick,
        });
    } else {
        debug!(
            "Orphaned NoteOff for {} ch{} at tick {}..!",
            midi_num, ch, abs_tick
        );
    }
}

/// Flatten note intervals into a sequential chord/rest stream.
///
/// Intervals sharing an onset tick become one chord; silence between
/// onsets becomes a rest; a chord sounding into the next onset is clipped
/// there, since song text has no overlapping events.
fn elements_from_intervals(
    mut intervals: Vec<NoteInterval>,
    ticks_per_quarter: u64,
) -> Vec<NotationElement> {
    intervals.sort_by_key(|i| (i.start_tick, i.midi));

    let quarters_of = |ticks: u64| Ratio::new(ticks as i64, ticks_per_quarter as i64);

    let mut elements: Vec<NotationElement> = Vec::new();
    let mut cursor: u64 = 0;
    let mut idx = 0;

    while idx < intervals.len() {
        let start = intervals[idx].start_tick;

        let mut pitches: Vec<Pitch> = Vec::new();
        let mut end = start;
        while idx < intervals.len() && intervals[idx].start_tick == start {
            let interval = &intervals[idx];
            if !pitches.contains(&Pitch(interval.midi)) {
                pitches.push(Pitch(interval.midi));
            }
            end = end.max(interval.end_tick);
            idx += 1;
        }

        if start > cursor {
            elements.push(NotationElement {
                pitches: Vec::new(),
                quarters: quarters_of(start - cursor),
            });
        }

        // clip into the next onset; overlap cannot be expressed
        if let Some(next) = intervals.get(idx) {
            end = end.min(next.start_tick);
        }

        if end <= start {
            debug!("Skipping zero-length chord at tick {}", start);
            cursor = cursor.max(start);
            continue;
        }

        elements.push(NotationElement {
            pitches,
            quarters: quarters_of(end - start),
        });
        cursor = end;
    }

    elements
}
