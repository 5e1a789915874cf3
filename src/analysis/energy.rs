// Spectral energy extraction
//
// Converts one frequency frame into per-sub-band instantaneous energy:
//   energy[i] = |magnitude[i]| ^ exponent
// The exponent (2.4 by default) slightly over-weights loud bands compared to
// plain power (2.0).

use crate::error::DetectorError;

/// Reject frames the energy model cannot accept
///
/// The frame must contain exactly `sub_bands` finite, non-negative values.
/// Nothing is truncated or padded.
pub fn validate_frame(frame: &[f32], sub_bands: usize) -> Result<(), DetectorError> {
    if frame.len() != sub_bands {
        return Err(DetectorError::FrameLengthMismatch {
            expected: sub_bands,
            actual: frame.len(),
        });
    }

    if let Some((band, &value)) = frame
        .iter()
        .enumerate()
        .find(|(_, value)| !value.is_finite() || **value < 0.0)
    {
        return Err(DetectorError::InvalidMagnitude { band, value });
    }

    Ok(())
}

/// Compute the energy vector of a validated frame into `out`
///
/// `out` must have the same length as `frame`; the caller owns the buffer so
/// the per-chunk path never allocates.
///
/// # Errors
/// `InvalidMagnitude` for the first band whose energy overflows `f32`
/// (magnitudes above roughly 1e16 with the default exponent). `out` may be
/// partially written in that case.
pub fn extract_energy_into(
    frame: &[f32],
    exponent: f32,
    out: &mut [f32],
) -> Result<(), DetectorError> {
    debug_assert_eq!(frame.len(), out.len());
    for (band, (energy, &magnitude)) in out.iter_mut().zip(frame).enumerate() {
        *energy = magnitude.abs().powf(exponent);
        if !energy.is_finite() {
            return Err(DetectorError::InvalidMagnitude {
                band,
                value: magnitude,
            });
        }
    }
    Ok(())
}

/// Allocating convenience wrapper around [`extract_energy_into`]
pub fn extract_energy(
    frame: &[f32],
    sub_bands: usize,
    exponent: f32,
) -> Result<Vec<f32>, DetectorError> {
    validate_frame(frame, sub_bands)?;
    let mut energy = vec![0.0; frame.len()];
    extract_energy_into(frame, exponent, &mut energy)?;
    Ok(energy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_exponent() {
        let energy = extract_energy(&[0.0, 1.0, 2.0], 3, 2.4).unwrap();
        assert_eq!(energy[0], 0.0);
        assert_eq!(energy[1], 1.0);
        assert!((energy[2] - 2.0_f32.powf(2.4)).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = extract_energy(&[1.0; 4], 5, 2.4).unwrap_err();
        assert_eq!(
            err,
            DetectorError::FrameLengthMismatch {
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn test_rejects_negative_and_nan() {
        let err = validate_frame(&[1.0, -0.5, 1.0], 3).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidMagnitude { band: 1, .. }));

        let err = validate_frame(&[1.0, 1.0, f32::NAN], 3).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidMagnitude { band: 2, .. }));

        let err = validate_frame(&[f32::INFINITY, 1.0, 1.0], 3).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidMagnitude { band: 0, .. }));
    }

    #[test]
    fn test_rejects_magnitude_whose_energy_overflows() {
        // Finite magnitude, but 1.2e16 ^ 2.4 is beyond f32::MAX.
        let frame = [1.0, 1.2e16, 1.0];
        assert!(validate_frame(&frame, 3).is_ok());

        let err = extract_energy(&frame, 3, 2.4).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidMagnitude { band: 1, .. }));

        // Plain power of the same magnitude still fits.
        assert!(extract_energy(&frame, 3, 2.0).is_ok());
    }

    #[test]
    fn test_energy_is_monotonic_in_magnitude() {
        let frame: Vec<f32> = (0..16).map(|i| i as f32 * 0.25).collect();
        let energy = extract_energy(&frame, 16, 2.4).unwrap();
        assert!(energy.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
