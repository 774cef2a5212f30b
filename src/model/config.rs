use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "songkey",
    about = "Play chorded song text with simulated key presses!"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a song file and play it by injecting key presses.
    Play {
        /// Path to the song text file.
        song: PathBuf,

        /// Path to the note -> key mapping JSON file.
        #[arg(short, long, default_value = "mapping.json")]
        map: PathBuf,

        /// Transpose in semitones (positive or negative).
        #[arg(short, long)]
        transpose: Option<i32>,

        /// Search for the semitone shift that best fits the mapped range.
        #[arg(long, conflicts_with = "transpose")]
        auto_transpose: bool,

        /// Delays the start of the performance by N seconds, leaving time
        /// to focus the target window.
        #[arg(long = "delay-start", default_value_t = 4)]
        delay_start: u64,

        /// Dry run (print resolved events and exit without pressing keys).
        #[arg(short, long, default_value_t = false)]
        dry_run: bool,

        /// Maximum events to print in dry run.
        #[arg(long, default_value_t = 80)]
        dry_run_max: usize,

        /// Prints per-event timing to the terminal during playback.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Convert a MIDI file into song text.
    Import {
        /// Path to the source MIDI file.
        midi: PathBuf,

        /// Destination song text file.
        output: PathBuf,

        /// Transpose in semitones before writing.
        #[arg(short, long, default_value_t = 0)]
        transpose: i32,
    },
}
