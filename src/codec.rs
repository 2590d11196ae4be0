use serde::{Serialize, de::DeserializeOwned};

use crate::error::BoxError;

/// Serialization scheme shared with the coordinator.
///
/// `decode` must be the exact inverse of `encode`.
pub trait Codec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, BoxError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, BoxError>;
}

/// JSON payloads through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, BoxError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_rejects_garbage() {
        let res: Result<Vec<f32>, _> = JsonCodec.decode(b"\x80not json");
        assert!(res.is_err());
    }

    #[test]
    fn json_decodes_what_it_encodes() {
        let weights = vec![vec![0.5_f32, -1.0], vec![2.0]];
        let bytes = JsonCodec.encode(&weights).unwrap();
        let back: Vec<Vec<f32>> = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, weights);
    }
}
