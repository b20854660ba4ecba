//! FIFO Burst Decoder

use crate::error::SensorError;
use crate::sample::{ActiveChannels, Sample, ADC_MASK, BYTES_PER_READING};

/// Decode a FIFO burst into samples.
///
/// Each reading is three big-endian bytes; the top six bits of the first
/// byte are don't-care and are masked off, leaving 18 bits of ADC data.
/// Within a sample the Red reading precedes IR.
pub fn decode_burst(bytes: &[u8], channels: ActiveChannels) -> Result<Vec<Sample>, SensorError> {
    let sample_len = channels.bytes_per_sample();
    if bytes.len() % sample_len != 0 {
        return Err(SensorError::MalformedBurst {
            len: bytes.len(),
            sample_len,
        });
    }

    let samples = bytes
        .chunks_exact(sample_len)
        .map(|chunk| {
            let red = decode_reading(&chunk[..BYTES_PER_READING]);
            match channels {
                ActiveChannels::RedOnly => Sample::red_only(red),
                ActiveChannels::RedIr => Sample::red_ir(red, decode_reading(&chunk[BYTES_PER_READING..])),
            }
        })
        .collect();

    Ok(samples)
}

fn decode_reading(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]) & ADC_MASK
}

/// Wire form of one reading (low 18 bits, big-endian)
pub fn encode_reading(value: u32) -> [u8; BYTES_PER_READING] {
    let [_, hi, mid, lo] = (value & ADC_MASK).to_be_bytes();
    [hi, mid, lo]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_red_ir_pair() {
        let bytes = [0x01, 0x23, 0x45, 0x00, 0x00, 0x10];
        let samples = decode_burst(&bytes, ActiveChannels::RedIr).unwrap();

        assert_eq!(samples, vec![Sample::red_ir(0x1_2345, 0x10)]);
    }

    #[test]
    fn test_decode_masks_dont_care_bits() {
        // 0xFF in the MSB: only its low two bits are data
        let bytes = [0xFF, 0xFF, 0xFF];
        let samples = decode_burst(&bytes, ActiveChannels::RedOnly).unwrap();

        assert_eq!(samples[0].red, ADC_MASK);
        assert_eq!(samples[0].ir, None);
    }

    #[test]
    fn test_decode_preserves_order() {
        let mut bytes = Vec::new();
        for value in [7u32, 8, 9] {
            bytes.extend_from_slice(&encode_reading(value));
        }
        let samples = decode_burst(&bytes, ActiveChannels::RedOnly).unwrap();
        let reds: Vec<u32> = samples.iter().map(|s| s.red).collect();

        assert_eq!(reds, vec![7, 8, 9]);
    }

    #[test]
    fn test_empty_burst() {
        assert!(decode_burst(&[], ActiveChannels::RedIr).unwrap().is_empty());
    }

    #[test]
    fn test_misaligned_burst_rejected() {
        let err = decode_burst(&[0; 7], ActiveChannels::RedIr).unwrap_err();
        assert!(matches!(err, SensorError::MalformedBurst { len: 7, sample_len: 6 }));
        assert!(err.is_fatal());
    }

    proptest! {
        #[test]
        fn decode_then_encode_round_trips(
            bytes in proptest::collection::vec(any::<u8>(), 0..20).prop_map(|mut v| {
                let len = v.len() - v.len() % 6;
                v.truncate(len);
                v
            }),
            red_only in any::<bool>(),
        ) {
            let channels = if red_only { ActiveChannels::RedOnly } else { ActiveChannels::RedIr };
            let samples = decode_burst(&bytes, channels).unwrap();

            let mut encoded = Vec::with_capacity(bytes.len());
            for sample in &samples {
                prop_assert!(sample.red <= ADC_MASK);
                encoded.extend_from_slice(&encode_reading(sample.red));
                if let Some(ir) = sample.ir {
                    encoded.extend_from_slice(&encode_reading(ir));
                }
            }

            // Identical except for the masked don't-care bits
            let expected: Vec<u8> = bytes
                .iter()
                .enumerate()
                .map(|(i, b)| if i % 3 == 0 { b & 0x03 } else { *b })
                .collect();
            prop_assert_eq!(encoded, expected);
        }
    }
}
