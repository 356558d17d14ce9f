//! Value Codec Module
//!
//! The cache is payload-agnostic: any value type stored in it supplies its
//! own versioned byte encoding.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

// == Cache Value ==
/// A value that can be persisted by the disk tier.
///
/// `FORMAT_VERSION` is written to each entry's metadata file. Entries stored
/// under a different version are treated as corrupt and dropped on read, so
/// bump it whenever `encode` changes shape.
pub trait CacheValue: Clone + Send + Sync + 'static {
    const FORMAT_VERSION: u32;

    fn encode(&self) -> Result<Vec<u8>>;

    fn decode(bytes: &[u8]) -> Result<Self>;
}

impl CacheValue for Vec<u8> {
    const FORMAT_VERSION: u32 = 1;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl CacheValue for String {
    const FORMAT_VERSION: u32 = 1;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

// == Json Wrapper ==
/// Stores any serde type as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> CacheValue for Json<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    const FORMAT_VERSION: u32 = 1;

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Json(serde_json::from_slice(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Scaffold {
        name: String,
        files: Vec<String>,
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let result = String::decode(&[0xff, 0xfe]);
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_json_wrapper() {
        let value = Json(Scaffold {
            name: "app".to_string(),
            files: vec!["main.rs".to_string()],
        });
        let bytes = value.encode().unwrap();
        assert_eq!(Json::<Scaffold>::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_json_decode_garbage() {
        let result = Json::<Scaffold>::decode(b"{not json");
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }
}
