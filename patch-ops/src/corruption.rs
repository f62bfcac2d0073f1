//! # Input Corruption
//!
//! Salt-and-pepper corruption for binary-valued label patches. A Bernoulli
//! mask is drawn once over the whole tensor; every selected pixel is flipped
//! to the opposite extreme of its class.

use core::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PatchError, PatchResult},
    patches::PatchTensor,
};

/// Pixels strictly above this value belong to the "max" class.
const CLASS_THRESHOLD: f32 = 0.5;

/// The corruption applied to denoising autoencoder inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corruption {
    /// Flip a random subset of pixels to their opposite binary class.
    #[default]
    SaltAndPepper,
}

impl Corruption {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SaltAndPepper => "salt_and_pepper",
        }
    }
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Corruption {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "salt_and_pepper" => Ok(Self::SaltAndPepper),
            other => Err(PatchError::UnknownCorruption {
                name: other.to_string(),
            }),
        }
    }
}

/// Draws a selection mask of `len` independent Bernoulli(`nu`) samples.
pub fn corruption_mask<R: Rng>(len: usize, nu: f64, rng: &mut R) -> PatchResult<Vec<bool>> {
    if !(0.0..=1.0).contains(&nu) {
        return Err(PatchError::InvalidProbability { value: nu });
    }
    Ok((0..len).map(|_| rng.random_bool(nu)).collect())
}

/// Flips every masked pixel: values above 0.5 become `0.0`, values at or
/// below 0.5 become `1.0`. Unmasked pixels are copied unchanged.
pub fn salt_and_pepper(values: &[f32], mask: &[bool]) -> PatchResult<Vec<f32>> {
    if values.len() != mask.len() {
        return Err(PatchError::ShapeMismatch {
            expected: values.len(),
            actual: mask.len(),
        });
    }
    Ok(values
        .iter()
        .zip(mask)
        .map(|(&value, &selected)| match (selected, value > CLASS_THRESHOLD) {
            (false, _) => value,
            (true, true) => 0.0,
            (true, false) => 1.0,
        })
        .collect())
}

/// Returns a corrupted copy of `patches` with the same shape.
pub fn corrupt<R: Rng>(
    patches: &PatchTensor,
    nu: f64,
    kind: Corruption,
    rng: &mut R,
) -> PatchResult<PatchTensor> {
    match kind {
        Corruption::SaltAndPepper => {
            let mask = corruption_mask(patches.as_slice().len(), nu, rng)?;
            let data = salt_and_pepper(patches.as_slice(), &mask)?;
            PatchTensor::new(data, patches.len(), patches.side())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn binary_patches() -> PatchTensor {
        let data = (0..4 * 9)
            .map(|i| if i % 3 == 0 { 1.0 } else { 0.0 })
            .collect();
        PatchTensor::new(data, 4, 3).unwrap()
    }

    #[test]
    fn test_parse_corruption() {
        assert_eq!(
            "salt_and_pepper".parse::<Corruption>().unwrap(),
            Corruption::SaltAndPepper
        );
        assert_eq!(
            "gaussian".parse::<Corruption>().unwrap_err(),
            PatchError::UnknownCorruption {
                name: "gaussian".to_string()
            }
        );
    }

    #[test]
    fn test_salt_and_pepper_flips_masked_pixels() {
        let values = [0.9, 0.1, 0.5, 0.51, 0.7, 0.0];
        let mask = [true, true, true, true, false, false];
        let out = salt_and_pepper(&values, &mask).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 1.0, 0.0, 0.7, 0.0]);
    }

    #[test]
    fn test_corrupt_preserves_shape() {
        let patches = binary_patches();
        let mut rng = StdRng::seed_from_u64(123);
        let out = corrupt(&patches, 0.3, Corruption::SaltAndPepper, &mut rng).unwrap();
        assert_eq!(out.shape(), patches.shape());
    }

    #[test]
    fn test_corrupt_zero_probability_is_identity() {
        let patches = binary_patches();
        let mut rng = StdRng::seed_from_u64(1);
        let out = corrupt(&patches, 0.0, Corruption::SaltAndPepper, &mut rng).unwrap();
        assert_eq!(out, patches);
    }

    #[test]
    fn test_corrupt_full_probability_flips_everything() {
        let patches = binary_patches();
        let mut rng = StdRng::seed_from_u64(1);
        let out = corrupt(&patches, 1.0, Corruption::SaltAndPepper, &mut rng).unwrap();
        for (before, after) in patches.as_slice().iter().zip(out.as_slice()) {
            assert_eq!(*after, 1.0 - *before);
        }
    }

    #[test]
    fn test_corrupt_only_touches_masked_pixels() {
        let patches = binary_patches();
        let mut mask_rng = StdRng::seed_from_u64(7);
        let mask = corruption_mask(patches.as_slice().len(), 0.5, &mut mask_rng).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let out = corrupt(&patches, 0.5, Corruption::SaltAndPepper, &mut rng).unwrap();

        for ((&before, &after), &selected) in patches.as_slice().iter().zip(out.as_slice()).zip(&mask)
        {
            if selected {
                assert_eq!(after, if before > 0.5 { 0.0 } else { 1.0 });
            } else {
                assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn test_corrupt_is_deterministic_for_a_seed() {
        let patches = binary_patches();
        let a = corrupt(&patches, 0.4, Corruption::SaltAndPepper, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = corrupt(&patches, 0.4, Corruption::SaltAndPepper, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_probability() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(corruption_mask(4, 1.5, &mut rng).is_err());
        assert!(corruption_mask(4, f64::NAN, &mut rng).is_err());
    }
}
