pub mod advertiser;
pub mod received_data;

use serde::Serialize;
use tracing::warn;

pub use advertiser::{AdvertiserMessage, AdvertiserRecord};
pub use received_data::ReceivedData;

/// A received packet after classification by endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Advertiser(AdvertiserMessage),
    Generic(ReceivedData),
}

impl Message {
    /// Decodes advertiser packets; anything else, including advertiser
    /// packets that fail to decode, is kept as a generic packet.
    pub fn from_received_data(data: ReceivedData) -> Self {
        if AdvertiserMessage::is_advertiser(&data) {
            match AdvertiserMessage::decode(data.clone()) {
                Ok(message) => return Message::Advertiser(message),
                Err(e) => warn!(
                    source_address = data.source_address,
                    error = %e,
                    "Could not decode advertiser payload"
                ),
            }
        }
        Message::Generic(data)
    }

    pub fn data(&self) -> &ReceivedData {
        match self {
            Message::Advertiser(message) => &message.data,
            Message::Generic(data) => data,
        }
    }
}

/// Serde helpers for byte fields carried as hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

pub mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
