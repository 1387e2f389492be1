use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTPing {
    #[serde(rename = "id", with = "serde_bytes")]
    pub id: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFind {
    #[serde(rename = "id", with = "serde_bytes")]
    pub id: Vec<u8>,

    #[serde(rename = "target", with = "serde_bytes")]
    pub target: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTFindAck {
    #[serde(rename = "id", with = "serde_bytes")]
    pub id: Vec<u8>,

    #[serde(rename = "target", with = "serde_bytes")]
    pub target: Vec<u8>,

    #[serde(rename = "nodes")]
    pub nodes: Vec<DHTNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTNode {
    #[serde(rename = "id", with = "serde_bytes")]
    pub id: Vec<u8>,

    #[serde(rename = "ip", with = "serde_bytes")]
    pub ip: Vec<u8>,

    #[serde(rename = "port")]
    pub port: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DHTStore {
    #[serde(rename = "id", with = "serde_bytes")]
    pub id: Vec<u8>,

    #[serde(rename = "k")]
    pub key: String,

    #[serde(rename = "v", with = "serde_bytes")]
    pub value: Vec<u8>,
}

pub fn from_bytes<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T, serde_bencode::Error> {
    serde_bencode::from_bytes(bytes)
}

pub fn to_bytes<T: Serialize>(body: &T) -> Result<Vec<u8>, serde_bencode::Error> {
    serde_bencode::to_bytes(body)
}
