use crate::codec::decode_duration;
use crate::error::SongError;
use crate::model::note::NoteAtom;
use crate::model::song::{Defaults, Event, Lane, Metadata, Song};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Parse a song file into an ordered event list.
///
/// The returned `Defaults` are the header values in effect after the final
/// token, kept for diagnostics only.
pub fn parse_song_file<P: AsRef<Path>>(path: P) -> Result<(Song, Defaults)> {
    let text = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read song file {}", path.as_ref().display()))?;

    let (mut song, state) = parse_song(&text)?;
    song.metadata.title = path
        .as_ref()
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());

    Ok((song, state))
}

/// Parse song text.
///
/// Two phases: leading lines that are pure header assignments update the
/// defaults, then every remaining line is a stream of tokens (chords,
/// rests, lane switches, and further inline assignments). Blank lines and
/// `#` comments are ignored throughout. Any malformed token aborts the
/// whole parse; nothing is ever scheduled from a song that didn't parse.
pub fn parse_song(text: &str) -> Result<(Song, Defaults), SongError> {
    let mut state = Defaults::default();
    let mut events: Vec<Event> = Vec::new();
    let mut in_header = true;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if in_header {
            let tokens = split_tokens(line);
            if tokens.len() == 1 && tokens[0].contains('=') {
                apply_header(tokens[0], &mut state, line_no)?;
                continue;
            }
            in_header = false;
        }

        for token in split_tokens(line) {
            if apply_header(token, &mut state, line_no)? {
                continue;
            }

            let upper = token.to_ascii_uppercase();
            if upper.starts_with("LOW") {
                state.lane = Lane::Low;
                continue;
            }
            if upper.starts_with("HIGH") {
                state.lane = Lane::High;
                continue;
            }

            events.push(parse_chord_token(token, &state, line_no)?);
        }
    }

    if events.is_empty() {
        return Err(SongError::EmptySong);
    }

    debug!(
        "Parsed {} events, final defaults: {:?}",
        events.len(),
        state
    );

    let song = Song {
        metadata: Metadata {
            title: None,
            tempo_bpm: Some(state.bpm),
        },
        events,
    };

    Ok((song, state))
}

/// Apply `KEY=VALUE` if the token is a header assignment.
///
/// Returns `Ok(false)` for tokens without `=`; a token that does contain
/// `=` must name a known header key with a valid numeric value.
fn apply_header(token: &str, state: &mut Defaults, line_no: usize) -> Result<bool, SongError> {
    let upper = token.trim().to_ascii_uppercase();
    let Some((key, value)) = upper.split_once('=') else {
        return Ok(false);
    };

    let fail = |message: String| SongError::Format {
        line: line_no,
        message,
    };

    match key {
        "BPM" | "TEMPO" => {
            let bpm: f64 = value
                .parse()
                .ok()
                .filter(|b| *b > 0.0)
                .ok_or_else(|| fail(format!("invalid tempo '{}'", value)))?;
            state.bpm = bpm;
        }
        "UNIT" => {
            let unit: u32 = value
                .parse()
                .ok()
                .filter(|u| *u > 0)
                .ok_or_else(|| fail(format!("invalid unit '{}'", value)))?;
            state.unit = unit;
        }
        "HOLD" => {
            let hold: f64 = value
                .parse()
                .ok()
                .filter(|h| *h >= 0.0)
                .ok_or_else(|| fail(format!("invalid hold '{}'", value)))?;
            state.hold_s = hold;
        }
        "STAGGER" => {
            let stagger: f64 = value
                .parse()
                .ok()
                .filter(|s| *s >= 0.0)
                .ok_or_else(|| fail(format!("invalid stagger '{}'", value)))?;
            state.stagger_s = stagger;
        }
        "REP" => {
            let rep: u32 = value
                .parse()
                .map_err(|_| fail(format!("invalid rep '{}'", value)))?;
            state.repeat = rep.max(1);
        }
        other => {
            return Err(fail(format!("unknown header key '{}'", other)));
        }
    }

    Ok(true)
}

/// Split a line on whitespace, `|`, and `,`, except inside a parenthesized
/// attribute list, so `C4:4(h0.2,st0.01)` stays one token.
fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        let is_sep = depth == 0 && (c.is_whitespace() || c == '|' || c == ',');

        if is_sep {
            if let Some(s) = start.take() {
                tokens.push(&line[s..i]);
            }
            continue;
        }

        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }

        if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        tokens.push(&line[s..]);
    }

    tokens
}

/// Parse `<chord><:duration><dots><(attrs)>` into a resolved event,
/// snapshotting the defaults in effect right now.
fn parse_chord_token(token: &str, state: &Defaults, line_no: usize) -> Result<Event, SongError> {
    let bad = || SongError::BadToken {
        line: line_no,
        token: token.to_string(),
    };

    // optional trailing (attrs)
    let (head, attr_body) = if token.ends_with(')') {
        let open = token.find('(').ok_or_else(bad)?;
        (&token[..open], Some(&token[open + 1..token.len() - 1]))
    } else if token.contains('(') || token.contains(')') {
        return Err(bad());
    } else {
        (token, None)
    };

    // optional trailing dots
    let trimmed = head.trim_end_matches('.');
    let dots = (head.len() - trimmed.len()) as u32;

    // optional :duration
    let (chord, dur_spec) = match trimmed.split_once(':') {
        Some((chord, spec)) if !spec.is_empty() => (chord, spec),
        Some(_) => return Err(bad()),
        None => (trimmed, ""),
    };

    if chord.is_empty() {
        return Err(bad());
    }

    let duration_s = decode_duration(dur_spec, state.unit, state.quarter_secs(), dots)
        .map_err(|_| bad())?;

    let mut hold_s = state.hold_s;
    let mut stagger_s = state.stagger_s;
    let mut repeat = state.repeat;

    if let Some(body) = attr_body {
        for chunk in body.split(',') {
            let attr = chunk.trim();
            if attr.is_empty() {
                continue;
            }

            if let Some(v) = attr.strip_prefix("st") {
                stagger_s = v.parse().map_err(|_| bad())?;
            } else if let Some(v) = attr.strip_prefix("rep") {
                let rep: u32 = v.parse().map_err(|_| bad())?;
                repeat = rep.max(1);
            } else if let Some(v) = attr.strip_prefix('h') {
                hold_s = v.parse().map_err(|_| bad())?;
            } else {
                return Err(bad());
            }
        }
    }

    let default_octave = state.lane.octave();
    let mut notes: Vec<NoteAtom> = Vec::new();

    for atom in chord.split('+') {
        notes.push(NoteAtom::parse(atom, default_octave).map_err(|_| bad())?);
    }

    // A rest atom inside a real chord carries no meaning; drop it rather
    // than reject the token.
    if notes.len() > 1 && notes.contains(&NoteAtom::Rest) {
        debug!("Dropping rest atom from chord '{}' at line {}", token, line_no);
        notes.retain(|n| *n != NoteAtom::Rest);
        if notes.is_empty() {
            notes.push(NoteAtom::Rest);
        }
    }

    Ok(Event {
        notes,
        duration_s,
        hold_s,
        stagger_s,
        repeat,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::note::Pitch;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9
    }

    fn note(name: &str) -> NoteAtom {
        NoteAtom::Note(Pitch::parse(name, 4).unwrap())
    }

    #[test]
    fn end_to_end_scenario() {
        let text = "BPM=120\nC4:4\nR:8\nE4+G4:8(h0.05,st0.01)\n";
        let (song, state) = parse_song(text).unwrap();

        assert_eq!(song.events.len(), 3);
        assert!(approx_eq(state.quarter_secs(), 0.5));

        let c4 = &song.events[0];
        assert_eq!(c4.notes, vec![note("C4")]);
        assert!(approx_eq(c4.duration_s, 0.5));

        let rest = &song.events[1];
        assert!(rest.is_rest());
        assert!(approx_eq(rest.duration_s, 0.25));

        let chord = &song.events[2];
        assert_eq!(chord.notes, vec![note("E4"), note("G4")]);
        assert!(approx_eq(chord.duration_s, 0.25));
        assert!(approx_eq(chord.hold_s, 0.05));
        assert!(approx_eq(chord.stagger_s, 0.01));
        assert_eq!(chord.repeat, 1);
    }

    #[test]
    fn header_defaults_snapshot_per_event() {
        let text = "BPM=120\nHOLD=0.2\nC4:4\nHOLD=0.3 D4:4\n";
        let (song, _) = parse_song(text).unwrap();

        assert_eq!(song.events.len(), 2);
        assert!(approx_eq(song.events[0].hold_s, 0.2));
        assert!(approx_eq(song.events[1].hold_s, 0.3));
    }

    #[test]
    fn attrs_override_single_event_only() {
        let text = "C4:4(rep3) D4:4\n";
        let (song, _) = parse_song(text).unwrap();

        assert_eq!(song.events[0].repeat, 3);
        assert_eq!(song.events[1].repeat, 1);
    }

    #[test]
    fn lane_switch_changes_default_octave() {
        let text = "LOW C HIGH C\n";
        let (song, _) = parse_song(text).unwrap();

        assert_eq!(song.events[0].notes, vec![note("C4")]);
        assert_eq!(song.events[1].notes, vec![note("C5")]);
    }

    #[test]
    fn tempo_alias_and_unit_default() {
        // UNIT=4 makes a bare token a quarter note
        let text = "TEMPO=60\nUNIT=4\nA4\n";
        let (song, _) = parse_song(text).unwrap();
        assert!(approx_eq(song.events[0].duration_s, 1.0));
    }

    #[test]
    fn dotted_and_tied_durations() {
        let text = "BPM=120\nA#5:16..\nC4:4+8\n";
        let (song, _) = parse_song(text).unwrap();

        assert!(approx_eq(song.events[0].duration_s, 0.125 * 1.5 * 1.5));
        assert!(approx_eq(song.events[1].duration_s, 0.75));
    }

    #[test]
    fn separators_and_comments() {
        let text = "# a comment\n\nBPM=120\nC4:8|D4:8, E4:8\n";
        let (song, _) = parse_song(text).unwrap();
        assert_eq!(song.events.len(), 3);
    }

    #[test]
    fn attr_commas_do_not_split_tokens() {
        let tokens = split_tokens("C4+E4:4(h0.2,st0.01,rep2) R:8");
        assert_eq!(tokens, vec!["C4+E4:4(h0.2,st0.01,rep2)", "R:8"]);
    }

    #[test]
    fn rest_atom_in_chord_is_dropped() {
        let text = "C4+R+E4:8\n";
        let (song, _) = parse_song(text).unwrap();
        assert_eq!(song.events[0].notes, vec![note("C4"), note("E4")]);
    }

    #[test]
    fn bad_tokens_abort_with_line_context() {
        let err = parse_song("BPM=120\nC4:4\nX9:4\n").unwrap_err();
        assert!(matches!(err, SongError::BadToken { line: 3, .. }));

        let err = parse_song("C4:3\n").unwrap_err();
        assert!(matches!(err, SongError::BadToken { line: 1, .. }));

        let err = parse_song("C4:4(x1)\n").unwrap_err();
        assert!(matches!(err, SongError::BadToken { line: 1, .. }));
    }

    #[test]
    fn unknown_header_key_is_terminal() {
        let err = parse_song("WAT=3\nC4:4\n").unwrap_err();
        assert!(matches!(err, SongError::Format { line: 1, .. }));
    }

    #[test]
    fn empty_song_is_an_error() {
        assert!(matches!(
            parse_song("# only comments\n\n"),
            Err(SongError::EmptySong)
        ));
        assert!(matches!(
            parse_song("BPM=90\n"),
            Err(SongError::EmptySong)
        ));
    }
}
