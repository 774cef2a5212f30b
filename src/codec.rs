use crate::error::SongError;
use num_rational::Ratio;
use num_traits::Zero;

/// Power-of-two note-value denominators, largest unit first.
/// `1` is a whole note (4 quarter lengths), `64` a sixty-fourth.
/// The greedy encoder depends on this exact order.
pub const POW2_DENOMS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Decode a duration specifier like `"4+8"` into seconds.
///
/// An empty specifier falls back to the session's default `unit`. Each
/// `+`-separated term contributes `quarter_secs * 4/term`, and every dot
/// multiplies the total by 1.5.
pub fn decode_duration(
    spec: &str,
    unit: u32,
    quarter_secs: f64,
    dots: u32,
) -> Result<f64, SongError> {
    let mut total = if spec.is_empty() {
        quarter_secs * 4.0 / unit as f64
    } else {
        let mut sum = 0.0;
        for term in spec.split('+') {
            let denom: u32 = term
                .parse()
                .ok()
                .filter(|d| POW2_DENOMS.contains(d))
                .ok_or_else(|| SongError::BadDurationTerm {
                    term: term.to_string(),
                })?;
            sum += quarter_secs * 4.0 / denom as f64;
        }
        sum
    };

    for _ in 0..dots {
        total *= 1.5;
    }

    Ok(total)
}

/// Encode an exact quarter-length value as a tied duration specifier.
///
/// The value is first snapped to the nearest sixty-fourth, the finest
/// grid the specifier grammar can express; humanized MIDI timing rarely
/// lands on the grid exactly. Then greedy decomposition: repeatedly
/// subtract the largest note value that still fits, emitting one term per
/// subtraction. Any remainder after the sixty-fourths are exhausted means
/// the snapped value has no tie representation, which is a terminal error
/// for this conversion.
pub fn encode_duration(quarters: Ratio<i64>) -> Result<String, SongError> {
    let snapped = Ratio::new((quarters * 64).round().to_integer(), 64);

    if snapped <= Ratio::zero() {
        return Err(SongError::UnrepresentableDuration(quarters));
    }

    let mut remaining = snapped;
    let mut terms: Vec<String> = Vec::new();

    for denom in POW2_DENOMS {
        let part = Ratio::new(4, denom as i64);
        while remaining >= part {
            terms.push(denom.to_string());
            remaining -= part;
        }
    }

    if !remaining.is_zero() {
        return Err(SongError::UnrepresentableDuration(quarters));
    }

    Ok(terms.join("+"))
}

#[cfg(test)]
mod test {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9
    }

    #[test]
    fn decode_empty_uses_unit() {
        // unit=8 at 120bpm: an eighth note is 0.25s
        let secs = decode_duration("", 8, 0.5, 0).unwrap();
        assert!(approx_eq(secs, 0.25));
    }

    #[test]
    fn decode_tied_terms_sum() {
        // quarter + eighth at 120bpm
        let secs = decode_duration("4+8", 8, 0.5, 0).unwrap();
        assert!(approx_eq(secs, 0.75));
    }

    #[test]
    fn decode_dot_multiplier() {
        let secs = decode_duration("4", 8, 0.5, 1).unwrap();
        assert!(approx_eq(secs, 0.75));

        let secs = decode_duration("4", 8, 0.5, 2).unwrap();
        assert!(approx_eq(secs, 1.125));
    }

    #[test]
    fn decode_rejects_non_pow2_terms() {
        assert!(decode_duration("3", 8, 0.5, 0).is_err());
        assert!(decode_duration("4+5", 8, 0.5, 0).is_err());
        assert!(decode_duration("4+", 8, 0.5, 0).is_err());
        assert!(decode_duration("128", 8, 0.5, 0).is_err());
    }

    #[test]
    fn encode_greedy_is_minimal() {
        assert_eq!(encode_duration(Ratio::new(1, 1)).unwrap(), "4");
        assert_eq!(encode_duration(Ratio::new(4, 1)).unwrap(), "1");
        assert_eq!(encode_duration(Ratio::new(3, 2)).unwrap(), "4+8");
        assert_eq!(encode_duration(Ratio::new(7, 4)).unwrap(), "4+8+16");
        assert_eq!(encode_duration(Ratio::new(6, 1)).unwrap(), "1+2");
        assert_eq!(encode_duration(Ratio::new(1, 16)).unwrap(), "64");
    }

    #[test]
    fn encode_rejects_unrepresentable() {
        // 1/3 snaps to 21/64, which still leaves a 1/64 remainder after
        // the greedy pass (terms are multiples of 4/64)
        assert!(matches!(
            encode_duration(Ratio::new(1, 3)),
            Err(SongError::UnrepresentableDuration(_))
        ));
        assert!(encode_duration(Ratio::new(1, 1000)).is_err());
        assert!(encode_duration(Ratio::new(0, 1)).is_err());
        assert!(encode_duration(Ratio::new(-1, 2)).is_err());
    }

    #[test]
    fn encode_snaps_near_grid_values() {
        // humanized MIDI timing: 479/480 of a quarter is a quarter note
        assert_eq!(encode_duration(Ratio::new(479, 480)).unwrap(), "4");
        assert_eq!(encode_duration(Ratio::new(721, 480)).unwrap(), "4+8");
        // half a sixty-fourth rounds up onto the grid
        assert_eq!(encode_duration(Ratio::new(1, 128)).unwrap(), "64");
    }

    #[test]
    fn codec_round_trip() {
        // every multiple of the smallest term (4/64 quarter) round-trips
        // (decode with quarter_secs=1.0 yields quarter lengths directly)
        for sixteenths in 1..=256i64 {
            let v = Ratio::new(sixteenths, 16);
            let spec = encode_duration(v).unwrap();
            let decoded = decode_duration(&spec, 8, 1.0, 0).unwrap();
            let expected = *v.numer() as f64 / *v.denom() as f64;
            assert!(
                approx_eq(decoded, expected),
                "{} -> '{}' -> {}",
                v,
                spec,
                decoded
            );
            // and the encoding is canonical for its own value
            assert_eq!(encode_duration(v).unwrap(), spec);
        }
    }
}
