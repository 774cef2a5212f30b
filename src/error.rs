use num_rational::Ratio;
use thiserror::Error;

/// Errors surfaced by parsing, duration conversion, and transposition.
///
/// Scheduling-time problems are handled differently: a missing key mapping
/// degrades to a logged rest, and actuator failures propagate as `anyhow`
/// errors from the playback worker.
#[derive(Error, Debug)]
pub enum SongError {
    #[error("Parse error at line {line}: bad token '{token}'")]
    BadToken { line: usize, token: String },

    #[error("Parse error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Unparseable note '{0}'")]
    BadNote(String),

    #[error("Invalid duration term '{term}': must be one of 1,2,4,8,16,32,64")]
    BadDurationTerm { term: String },

    #[error("Cannot represent {0} quarter lengths as power-of-two note values")]
    UnrepresentableDuration(Ratio<i64>),

    #[error("Inverted fold range: low {low} > high {high}")]
    InvertedRange { low: u8, high: u8 },

    #[error("Pitch {0} cannot be octave-folded into the mapped range")]
    FoldOutOfDomain(i32),

    #[error("Song contains no events")]
    EmptySong,
}
