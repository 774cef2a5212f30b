use crate::model::note::Pitch;
use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Lookup from canonical note name (e.g. `C#4`) to an actuator key
/// identifier (e.g. `"q"`).
///
/// Loaded from a flat JSON object. Notes absent from the table are not an
/// error here; the player degrades them to rests at schedule time.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    entries: HashMap<String, String>,
}

impl KeyMap {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read mapping file {}", path.as_ref().display())
        })?;

        let entries: HashMap<String, String> = serde_json::from_str(&text).with_context(|| {
            format!("Mapping file {} is not a JSON object of note -> key", path.as_ref().display())
        })?;

        debug!("Loaded {} key mappings from {}", entries.len(), path.as_ref().display());

        Ok(Self { entries })
    }

    pub fn from_entries<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Key identifier for a pitch, if mapped.
    pub fn key_for(&self, pitch: Pitch) -> Option<&str> {
        self.entries.get(&pitch.to_string()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observed min/max pitch over the mapped note names.
    ///
    /// Names that don't parse as notes are skipped rather than rejected,
    /// so a mapping may carry non-note keys without breaking transposition.
    pub fn pitch_range(&self) -> Option<(u8, u8)> {
        let mut range: Option<(u8, u8)> = None;

        for name in self.entries.keys() {
            let Ok(pitch) = Pitch::parse(name, 4) else {
                debug!("Ignoring non-note mapping key '{}' for range detection", name);
                continue;
            };

            range = Some(match range {
                None => (pitch.0, pitch.0),
                Some((lo, hi)) => (lo.min(pitch.0), hi.max(pitch.0)),
            });
        }

        range
    }

    /// All mapped pitches, for transpose search.
    pub fn pitches(&self) -> Vec<u8> {
        self.entries
            .keys()
            .filter_map(|name| Pitch::parse(name, 4).ok())
            .map(|p| p.0)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_map() -> KeyMap {
        KeyMap::from_entries([("C4", "q"), ("C#4", "2"), ("D4", "w"), ("E4", "e"), ("G4", "t")])
    }

    #[test]
    fn lookup_by_canonical_name() {
        let map = sample_map();

        // Db4 canonicalizes to C#4 before lookup
        let db4 = Pitch::parse("Db4", 4).unwrap();
        assert_eq!(map.key_for(db4), Some("2"));
        assert_eq!(map.key_for(Pitch::parse("A7", 4).unwrap()), None);
    }

    #[test]
    fn range_spans_mapped_pitches() {
        let map = sample_map();
        assert_eq!(map.pitch_range(), Some((60, 67)));
        assert_eq!(KeyMap::default().pitch_range(), None);
    }

    #[test]
    fn non_note_keys_are_ignored_for_range() {
        let map = KeyMap::from_entries([("C4", "q"), ("pedal", "space")]);
        assert_eq!(map.pitch_range(), Some((60, 60)));
    }
}
