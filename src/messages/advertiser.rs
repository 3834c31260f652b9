//! Advertiser APDU decoding.
//!
//! The APDU starts with a two byte header (`type | reserved`) followed by
//! fixed size measurements. Each measurement is a little endian node address
//! of three bytes, or four when bit 7 of the type byte is set, and one value
//! byte whose meaning depends on the type.

use std::collections::BTreeMap;

use serde::Serialize;

use super::received_data::ReceivedData;
use crate::errors::DecodeError;

pub const ADVERTISER_SOURCE_ENDPOINT: u8 = 200;
pub const ADVERTISER_DESTINATION_ENDPOINT: u8 = 200;

pub const MESSAGE_TYPE_RSS: u8 = 2;
pub const MESSAGE_TYPE_OTAP: u8 = 3;

const HEADER_LEN: usize = 2;
const ADDRESS_4_BYTE_FLAG: u8 = 0x80;
const TYPE_MASK: u8 = 0x7F;

/// Measurements reported about one advertiser node.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AdvertiserRecord {
    /// Reception time of the message carrying the measurement (ms epoch).
    pub time: u64,
    pub rss: Vec<f64>,
    pub otap: Vec<u8>,
    pub value: Vec<u8>,
    /// Undecoded measurement bytes in arrival order.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdvertiserMessage {
    #[serde(flatten)]
    pub data: ReceivedData,
    pub adv_type: u8,
    pub reserved: u8,
    pub advertisers: BTreeMap<u32, AdvertiserRecord>,
    /// Sequence number as observed by the consumer.
    pub index: Option<u64>,
}

impl AdvertiserMessage {
    pub fn is_advertiser(data: &ReceivedData) -> bool {
        data.source_endpoint == ADVERTISER_SOURCE_ENDPOINT
            && data.destination_endpoint == ADVERTISER_DESTINATION_ENDPOINT
    }

    pub fn decode(data: ReceivedData) -> Result<Self, DecodeError> {
        let payload = &data.data_payload;
        if payload.len() < HEADER_LEN {
            return Err(DecodeError::PayloadTooShort {
                expected: HEADER_LEN,
                actual: payload.len(),
            });
        }

        let adv_type = payload[0] & TYPE_MASK;
        let reserved = payload[1];
        let address_len = if payload[0] & ADDRESS_4_BYTE_FLAG != 0 { 4 } else { 3 };
        let timestamp = data.rx_time_ms_epoch;

        let mut advertisers: BTreeMap<u32, AdvertiserRecord> = BTreeMap::new();
        for chunk in payload[HEADER_LEN..].chunks(address_len + 1) {
            if chunk.len() < address_len + 1 {
                continue;
            }

            let address = chunk[..address_len]
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, byte)| acc | (u32::from(*byte) << (8 * i)));
            let raw = chunk[address_len];

            let record = advertisers.entry(address).or_default();
            record.time = timestamp;
            record.raw.push(raw);
            match adv_type {
                MESSAGE_TYPE_RSS => record.rss.push(rss_from_raw(raw)),
                MESSAGE_TYPE_OTAP => record.otap.push(raw),
                _ => record.value.push(raw),
            }
        }

        Ok(Self {
            data,
            adv_type,
            reserved,
            advertisers,
            index: None,
        })
    }

    pub fn timestamp(&self) -> u64 {
        self.data.rx_time_ms_epoch
    }

    pub fn sample_count(&self) -> usize {
        self.advertisers.values().map(|record| record.raw.len()).sum()
    }
}

/// Converts the raw RSS byte to dBm.
pub fn rss_from_raw(raw: u8) -> f64 {
    f64::from(raw) / 2.0 - 127.0
}
