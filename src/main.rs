use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use songkey::{
    Args, Command, KeyMap, NoteAtom, Player, RdevActuator, apply_transpose, choose_transpose,
    export_song_file, import_midi_file, parse_song_file, piece_pitches,
};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Play {
            song,
            map,
            transpose,
            auto_transpose,
            delay_start,
            dry_run,
            dry_run_max,
            verbose,
        } => {
            let mapping = KeyMap::load(&map)?;
            info!(
                "Loaded {} key mappings from '{}'...",
                mapping.len(),
                map.display()
            );

            info!("Parsing song file: '{}'...", song.display());
            let (mut parsed, defaults) = parse_song_file(&song)?;
            debug!("Final header state: {:?}", defaults);

            if transpose.is_some() || auto_transpose {
                let shift =
                    choose_transpose(&piece_pitches(&parsed), &mapping.pitches(), transpose);

                if shift != 0 {
                    info!("Transposing by {} semitones..!", shift);
                }

                apply_transpose(&mut parsed, shift, mapping.pitch_range());
            }

            if dry_run {
                info!("Previewing at most {} events..!", dry_run_max);
                for (i, ev) in parsed.events.iter().enumerate() {
                    if i >= dry_run_max {
                        break;
                    }

                    let notes = ev
                        .notes
                        .iter()
                        .map(|atom| match atom {
                            NoteAtom::Rest => String::from("R"),
                            NoteAtom::Note(p) => p.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("+");

                    let keys = ev
                        .notes
                        .iter()
                        .filter_map(|atom| match atom {
                            NoteAtom::Rest => None,
                            NoteAtom::Note(p) => Some(
                                mapping
                                    .key_for(*p)
                                    .map(|k| k.to_string())
                                    .unwrap_or_else(|| String::from("<no-mapping>")),
                            ),
                        })
                        .collect::<Vec<_>>();

                    info!(
                        "Event {}: notes={} dur_s={:.3} hold={:.3} stagger={:.3} rep={} keys={:?}",
                        i, notes, ev.duration_s, ev.hold_s, ev.stagger_s, ev.repeat, keys
                    );
                }
                return Ok(());
            }

            let player = Player::new(RdevActuator::new(), mapping, verbose, delay_start);
            player.load_song(parsed)?;

            let player_arc = Arc::new(player);
            let player = Arc::clone(&player_arc);
            let player_for_handler = Arc::clone(&player_arc);

            ctrlc::set_handler(move || {
                warn!("Ctrl-C received, stopping playback..!");
                let _ = player_for_handler.stop();
            })
            .expect("Error setting Ctrl-C handler..!");

            player.play(true)?;
            info!("Playback finished, exiting..!");
        }

        Command::Import {
            midi,
            output,
            transpose,
        } => {
            info!("Importing MIDI file: '{}'...", midi.display());
            let score = import_midi_file(&midi, transpose)?;

            debug!(
                "Imported '{}' with {} elements..!",
                score.title.clone().unwrap_or_else(|| "<unknown>".into()),
                score.elements.len()
            );

            export_song_file(&score, &output)?;
        }
    }

    Ok(())
}
