use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, SolutionError};

const SAMPLE_WIDTH: usize = std::mem::size_of::<f64>();

/// Decodes a raw binary payload into samples
pub trait BinaryTimeSeriesDecoder {
    fn decode(&self, entry: &str, bytes: &[u8]) -> Result<Vec<f64>>;
}

/// PLEXOS writes payloads as packed little-endian IEEE-754 doubles
#[derive(Debug, Clone, Copy, Default)]
pub struct LittleEndianF64Decoder;

impl BinaryTimeSeriesDecoder for LittleEndianF64Decoder {
    fn decode(&self, entry: &str, bytes: &[u8]) -> Result<Vec<f64>> {
        if bytes.len() % SAMPLE_WIDTH != 0 {
            return Err(SolutionError::Payload {
                entry: entry.to_string(),
                len: bytes.len(),
            });
        }

        let mut samples = vec![0.0; bytes.len() / SAMPLE_WIDTH];
        LittleEndian::read_f64_into(bytes, &mut samples);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian() {
        let mut bytes = Vec::new();
        for v in [1.5f64, -2.0, 1e10] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let samples = LittleEndianF64Decoder.decode("t_data_0.BIN", &bytes).unwrap();
        assert_eq!(samples, vec![1.5, -2.0, 1e10]);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(LittleEndianF64Decoder.decode("x.bin", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_partial_sample() {
        let err = LittleEndianF64Decoder.decode("x.bin", &[0u8; 12]).unwrap_err();
        assert!(matches!(err, SolutionError::Payload { len: 12, .. }));
    }
}
