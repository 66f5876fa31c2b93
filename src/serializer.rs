//! Serializer implementations for user values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("serialization to Bincode failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "json_serializer")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json_serializer")))]
    #[error("serialization to Json failed: {0}")]
    Json(#[from] serde_json::error::Error),
    #[error("serialization failed: {0}")]
    Custom(String),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("deserialization from Bincode failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "json_serializer")]
    #[cfg_attr(docsrs, doc(cfg(feature = "json_serializer")))]
    #[error("deserialization from Json failed: {0}")]
    Json(#[from] serde_json::error::Error),
    #[error("deserialization failed: {0}")]
    Custom(String),
}

/// The `Serializer` defines the format user values are packed into before
/// they are carried through a mailbox as an opaque blob.
///
/// Request arguments and response data never cross this boundary; they are
/// encoded by the dispatch layer sitting on top of this crate. The
/// serializer only covers plain values handed to
/// [`send`](crate::send), and can be swapped per call site.
///
/// The generic parameter `M` can be used to express trait dependencies on
/// values for each concrete serializer type. `Bincode` for example limits
/// values to types implementing `serde::Serialize` and
/// `serde::de::DeserializeOwned`.
pub trait Serializer<M> {
    fn encode(message: &M) -> Result<Vec<u8>, EncodeError>;
    fn decode(data: &[u8]) -> Result<M, DecodeError>;
}

/// A `Bincode` serializer.
///
/// It can serialize any value that satisfies the traits:
/// - `serde::Serialize`
/// - `serde::de::DeserializeOwned`
///
/// `serde::de::DeserializeOwned` is used here instead of
/// `serde::Deserialize<'de>` because decoded values are handed out by
/// value; they cannot borrow from the mailbox-owned blob.
#[derive(Hash, Debug, Serialize, Deserialize)]
pub struct Bincode {}

impl<M> Serializer<M> for Bincode
where
    M: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(message: &M) -> Result<Vec<u8>, EncodeError> {
        bincode::serialize(message).map_err(|err| err.into())
    }

    fn decode(data: &[u8]) -> Result<M, DecodeError> {
        bincode::deserialize(data).map_err(|err| err.into())
    }
}

/// A `Json` serializer.
#[cfg(feature = "json_serializer")]
#[cfg_attr(docsrs, doc(cfg(feature = "json_serializer")))]
#[derive(Hash, Debug, Serialize, Deserialize)]
pub struct Json {}

#[cfg(feature = "json_serializer")]
impl<M> Serializer<M> for Json
where
    M: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(message: &M) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(message).map_err(|err| err.into())
    }

    fn decode(data: &[u8]) -> Result<M, DecodeError> {
        serde_json::from_slice(data).map_err(|err| err.into())
    }
}
