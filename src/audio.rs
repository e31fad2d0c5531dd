//! Conversion of backend-native audio into mono 16-bit PCM.

use ndarray::{Array1, ArrayD, Axis};

use crate::error::{Result, TtsError};

/// Sample rate assumed when a backend does not report one.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Audio as a backend hands it back, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAudio {
    /// Plain sequence of float samples in [-1, 1].
    List(Vec<f32>),
    /// Float tensor, possibly with leading batch or channel axes.
    Float(ArrayD<f32>),
    /// Samples that are already 16-bit PCM.
    Int16(ArrayD<i16>),
}

impl From<Vec<f32>> for RawAudio {
    fn from(samples: Vec<f32>) -> Self {
        RawAudio::List(samples)
    }
}

impl From<Vec<i16>> for RawAudio {
    fn from(samples: Vec<i16>) -> Self {
        RawAudio::Int16(Array1::from(samples).into_dyn())
    }
}

/// Coerce raw backend output into mono i16 samples.
///
/// Multi-dimensional input keeps only index 0 of each leading axis (the first
/// channel); nothing is downmixed. Float samples are clipped to [-1, 1] before
/// scaling by 32767 and truncated toward zero. Int16 input passes through.
pub fn normalize(raw: RawAudio) -> Result<Vec<i16>> {
    let samples: Vec<i16> = match raw {
        RawAudio::List(values) => values.into_iter().map(float_to_pcm16).collect(),
        RawAudio::Float(tensor) => first_channel(tensor)
            .into_iter()
            .map(float_to_pcm16)
            .collect(),
        RawAudio::Int16(pcm) => first_channel(pcm).into_iter().collect(),
    };

    if samples.is_empty() {
        return Err(TtsError::SynthesisFailure(
            "backend produced no audio samples".to_string(),
        ));
    }
    Ok(samples)
}

fn first_channel<T: Clone>(mut array: ArrayD<T>) -> ArrayD<T> {
    while array.ndim() > 1 {
        if array.len_of(Axis(0)) == 0 {
            return Array1::<T>::from(Vec::new()).into_dyn();
        }
        array = array.index_axis_move(Axis(0), 0);
    }
    array
}

fn float_to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, arr3};

    #[test]
    fn test_int16_passes_through_unchanged() {
        let pcm = vec![0i16, 1, -1, 12345, i16::MIN, i16::MAX];
        let normalized = normalize(RawAudio::from(pcm.clone())).unwrap();
        assert_eq!(normalized, pcm);

        let again = normalize(RawAudio::from(normalized.clone())).unwrap();
        assert_eq!(again, pcm);
    }

    #[test]
    fn test_list_is_scaled() {
        let normalized = normalize(RawAudio::from(vec![0.0, 0.5, -0.5, 1.0, -1.0])).unwrap();
        assert_eq!(normalized, vec![0, 16383, -16383, 32767, -32767]);
    }

    #[test]
    fn test_out_of_range_is_clipped() {
        let normalized = normalize(RawAudio::List(vec![1.5, -2.0, f32::NAN])).unwrap();
        assert_eq!(normalized, vec![32767, -32767, 0]);
    }

    #[test]
    fn test_multichannel_keeps_first_channel() {
        let stereo = arr2(&[[0.5f32, 0.25], [-1.0, -1.0]]).into_dyn();
        let normalized = normalize(RawAudio::Float(stereo)).unwrap();
        assert_eq!(normalized, vec![16383, 8191]);
    }

    #[test]
    fn test_batched_tensor_is_flattened_to_first_row() {
        let batched = arr3(&[[[0.0f32, 1.0, -1.0]], [[0.5, 0.5, 0.5]]]).into_dyn();
        let normalized = normalize(RawAudio::Float(batched)).unwrap();
        assert_eq!(normalized, vec![0, 32767, -32767]);
    }

    #[test]
    fn test_multichannel_int16_not_rescaled() {
        let stereo = arr2(&[[100i16, 200], [300, 400]]).into_dyn();
        assert_eq!(normalize(RawAudio::Int16(stereo)).unwrap(), vec![100, 200]);
    }

    #[test]
    fn test_empty_output_is_a_synthesis_failure() {
        assert!(matches!(
            normalize(RawAudio::List(vec![])),
            Err(TtsError::SynthesisFailure(_))
        ));
        let empty = ArrayD::<f32>::zeros(ndarray::IxDyn(&[0, 4]));
        assert!(matches!(
            normalize(RawAudio::Float(empty)),
            Err(TtsError::SynthesisFailure(_))
        ));
    }
}
