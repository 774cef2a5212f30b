use crate::codec::encode_duration;
use crate::error::SongError;
use crate::importer::NotationSource;
use anyhow::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;

/// Render a notation stream as song text: an optional `BPM=` header, then
/// one `NOTE[+NOTE...]:<spec>` or `R:<spec>` line per element.
///
/// Any element whose duration has no tie representation aborts the whole
/// conversion; partial song files are worse than no song file.
pub fn write_song<S: NotationSource + ?Sized>(source: &S) -> Result<String, SongError> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(bpm) = source.tempo_bpm() {
        lines.push(format!("BPM={}", bpm));
    }

    for element in source.elements() {
        let spec = encode_duration(element.quarters)?;

        if element.is_rest() {
            lines.push(format!("R:{}", spec));
        } else {
            let chord = element
                .pitches
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("+");
            lines.push(format!("{}:{}", chord, spec));
        }
    }

    Ok(lines.join("\n") + "\n")
}

/// Convert a notation stream to song text on disk.
pub fn export_song_file<S: NotationSource + ?Sized, P: AsRef<Path>>(
    source: &S,
    path: P,
) -> Result<()> {
    let text = write_song(source)?;
    let events = text.lines().filter(|l| !l.starts_with("BPM=")).count();

    fs::write(path.as_ref(), &text)
        .with_context(|| format!("Failed to write song file {}", path.as_ref().display()))?;

    info!(
        "Wrote {} event(s) to {}",
        events,
        path.as_ref().display()
    );

    Ok(())
}
