//! Bitcoin block header model, serialization and block template parsing.

use serde_json::{json, Map, Value};

use crate::byte_order::{
    bits_from_hex, bits_to_hex, display_hex_to_internal, internal_to_display_hex,
    internal_to_wire,
};
use crate::difficulty::bits_to_target;
use crate::error::{MinerError, Result};
use crate::hash::double_sha256;

/// Size of a serialized block header.
pub const HEADER_SIZE: usize = 80;

/// A Bitcoin block header (80 bytes when serialized).
///
/// Everything but the nonce is fixed at construction. Hashes are held in
/// internal little-endian order; see [`crate::byte_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    version: u32,
    prev_block_hash: [u8; 32],
    merkle_root: [u8; 32],
    timestamp: u32,
    bits: u32,
    nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with a zero nonce.
    ///
    /// `prev_block_hash` and `merkle_root` must already be in internal
    /// (little-endian) byte order.
    pub fn new(
        version: u32,
        prev_block_hash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: u32,
        bits: u32,
    ) -> Self {
        BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
        }
    }

    /// Build a header from a parsed block template. The nonce starts at 0.
    pub fn from_template(template: &BlockTemplate) -> Result<Self> {
        let prev_block_hash =
            display_hex_to_internal("previousblockhash", &template.previousblockhash)?;
        let merkle_root = display_hex_to_internal("merkleroot", &template.merkleroot)?;
        let bits = bits_from_hex(&template.bits)?;

        Ok(BlockHeader::new(
            template.version,
            prev_block_hash,
            merkle_root,
            template.curtime,
            bits,
        ))
    }

    /// Parse a header straight from block template JSON.
    pub fn from_template_json(json: &str) -> Result<Self> {
        BlockHeader::from_template(&BlockTemplate::from_json(json)?)
    }

    /// Produce the template-shaped document describing this header.
    ///
    /// The nonce is not part of a template and is dropped.
    pub fn to_template(&self) -> BlockTemplate {
        BlockTemplate {
            version: self.version,
            previousblockhash: internal_to_display_hex(&self.prev_block_hash),
            merkleroot: internal_to_display_hex(&self.merkle_root),
            curtime: self.timestamp,
            bits: bits_to_hex(self.bits),
            target: None,
            height: None,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Previous block hash in internal byte order.
    pub fn prev_block_hash(&self) -> &[u8; 32] {
        &self.prev_block_hash
    }

    /// Merkle root in internal byte order.
    pub fn merkle_root(&self) -> &[u8; 32] {
        &self.merkle_root
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Overwrite the nonce.
    pub fn set_nonce(&mut self, nonce: u32) {
        self.nonce = nonce;
    }

    /// Return a copy of this header carrying `nonce`.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Serialize the block header to 80 bytes.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];

        // Version (4 bytes, little-endian)
        header[0..4].copy_from_slice(&self.version.to_le_bytes());

        // Previous block hash (32 bytes, reversed out of internal order)
        header[4..36].copy_from_slice(&internal_to_wire(&self.prev_block_hash));

        // Merkle root (32 bytes, reversed out of internal order)
        header[36..68].copy_from_slice(&internal_to_wire(&self.merkle_root));

        // Timestamp (4 bytes, little-endian)
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());

        // Bits (4 bytes, little-endian)
        header[72..76].copy_from_slice(&self.bits.to_le_bytes());

        // Nonce (4 bytes, little-endian)
        header[76..80].copy_from_slice(&self.nonce.to_le_bytes());

        header
    }

    /// Compute the block hash (double SHA256).
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }

    /// Get the target encoded by `bits` as a 256-bit big-endian number.
    pub fn target(&self) -> Result<[u8; 32]> {
        bits_to_target(self.bits)
    }
}

/// The subset of a `getblocktemplate` response needed to build a header.
///
/// Hash fields hold display-order hex exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub version: u32,
    pub previousblockhash: String,
    pub merkleroot: String,
    pub curtime: u32,
    pub bits: String,
    /// Optional explicit target, cross-checked against `bits`.
    pub target: Option<String>,
    /// Optional height, informational only.
    pub height: Option<u64>,
}

impl BlockTemplate {
    /// Parse a block template from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| MinerError::malformed("template", format!("is not valid JSON: {}", e)))?;
        BlockTemplate::from_value(&value)
    }

    /// Extract the template fields from a JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| MinerError::malformed("template", "is not a JSON object"))?;

        Ok(BlockTemplate {
            version: required_u32(object, "version")?,
            previousblockhash: required_str(object, "previousblockhash")?,
            merkleroot: required_str(object, "merkleroot")?,
            curtime: required_u32(object, "curtime")?,
            bits: required_str(object, "bits")?,
            target: optional_str(object, "target")?,
            height: optional_u64(object, "height")?,
        })
    }

    /// Convert the template back into a JSON value.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "version": self.version,
            "previousblockhash": self.previousblockhash,
            "merkleroot": self.merkleroot,
            "curtime": self.curtime,
            "bits": self.bits,
        });
        if let Some(target) = &self.target {
            value["target"] = json!(target);
        }
        if let Some(height) = self.height {
            value["height"] = json!(height);
        }
        value
    }

    /// Serialize the template as compact JSON.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Build the block header described by this template.
    pub fn header(&self) -> Result<BlockHeader> {
        BlockHeader::from_template(self)
    }

    /// Decode the mining target.
    ///
    /// The target comes from `bits`; an explicit `target` field must agree
    /// with it.
    pub fn target(&self) -> Result<[u8; 32]> {
        let bits = bits_from_hex(&self.bits)?;
        let target = bits_to_target(bits)?;

        if let Some(explicit) = &self.target {
            // Display order is already big-endian
            let decoded = hex::decode(explicit)
                .map_err(|e| MinerError::malformed("target", format!("is not valid hex: {}", e)))?;
            if decoded.len() != 32 {
                return Err(MinerError::malformed(
                    "target",
                    format!("must decode to 32 bytes, got {}", decoded.len()),
                ));
            }
            if decoded.as_slice() != target.as_slice() {
                return Err(MinerError::malformed(
                    "target",
                    format!("does not match bits {}", self.bits),
                ));
            }
        }

        Ok(target)
    }
}

fn required<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value> {
    object
        .get(field)
        .ok_or_else(|| MinerError::malformed(field, "is missing"))
}

fn required_str(object: &Map<String, Value>, field: &'static str) -> Result<String> {
    required(object, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| MinerError::malformed(field, "must be a string"))
}

fn required_u32(object: &Map<String, Value>, field: &'static str) -> Result<u32> {
    let number = required(object, field)?
        .as_u64()
        .ok_or_else(|| MinerError::malformed(field, "must be a non-negative integer"))?;
    u32::try_from(number)
        .map_err(|_| MinerError::malformed(field, format!("{} does not fit in 32 bits", number)))
}

fn optional_str(object: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or_else(|| MinerError::malformed(field, "must be a string")),
    }
}

fn optional_u64(object: &Map<String, Value>, field: &'static str) -> Result<Option<u64>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| MinerError::malformed(field, "must be a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREV_HEX: &str = "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054";
    const MERKLE_HEX: &str = "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a";

    fn template_json() -> String {
        format!(
            r#"{{"version": 536870912, "previousblockhash": "{}", "merkleroot": "{}", "curtime": 1700000000, "bits": "2000ffff", "height": 820000}}"#,
            PREV_HEX, MERKLE_HEX
        )
    }

    fn assert_malformed(result: Result<BlockHeader>, expected_field: &str) {
        match result {
            Err(MinerError::MalformedTemplate { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected malformed `{}`, got {:?}", expected_field, other),
        }
    }

    #[test]
    fn test_block_header_serialization() {
        let header = BlockHeader::from_template_json(&template_json()).unwrap();

        let expected = hex::decode(concat!(
            "00000020",
            "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054",
            "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a",
            "00f15365",
            "ffff0020",
            "00000000"
        ))
        .unwrap();

        assert_eq!(header.serialize().as_slice(), expected.as_slice());
    }

    #[test]
    fn test_nonce_is_little_endian() {
        let header = BlockHeader::new(1, [0x12; 32], [0x34; 32], 0, 0x1d00ffff)
            .with_nonce(0xDEADBEEF);
        let serialized = header.serialize();

        assert_eq!(&serialized[0..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&serialized[72..76], &[0xFF, 0xFF, 0x00, 0x1D]);
        assert_eq!(&serialized[76..80], &[0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_from_template_fields() {
        let template = BlockTemplate::from_json(&template_json()).unwrap();
        assert_eq!(template.height, Some(820000));
        assert_eq!(template.target, None);

        let header = template.header().unwrap();
        assert_eq!(header.version(), 0x20000000);
        assert_eq!(header.timestamp(), 1_700_000_000);
        assert_eq!(header.bits(), 0x2000ffff);
        assert_eq!(header.nonce(), 0);

        // Internal order is the reverse of the template's display order
        assert_eq!(header.prev_block_hash()[31], 0x00);
        assert_eq!(header.prev_block_hash()[0], 0x54);
        assert_eq!(header.merkle_root()[0], 0x4a);
        assert_eq!(header.merkle_root()[31], 0x3b);
    }

    #[test]
    fn test_block_header_hash() {
        let header = BlockHeader::from_template_json(&template_json()).unwrap();
        assert_eq!(
            hex::encode(header.hash()),
            "1e5749c80f9340c3aa668d61a83730e6375788d6a8fae59422f7a1c5a4087876"
        );
    }

    #[test]
    fn test_template_roundtrip_preserves_wire_bytes() {
        let header = BlockHeader::from_template_json(&template_json())
            .unwrap()
            .with_nonce(0x0badf00d);

        let json = header.to_template().to_json();
        let reparsed = BlockHeader::from_template_json(&json).unwrap();

        assert_eq!(reparsed.serialize(), header.with_nonce(0).serialize());
    }

    #[test]
    fn test_roundtrip_from_arbitrary_header() {
        let mut prev = [0u8; 32];
        let mut merkle = [0u8; 32];
        for i in 0..32 {
            prev[i] = (i as u8).wrapping_mul(37);
            merkle[i] = 0xff - i as u8;
        }
        let header = BlockHeader::new(0x3fff_0000, prev, merkle, 1_231_006_505, 0x1d00ffff);

        let reparsed = BlockHeader::from_template(&header.to_template()).unwrap();
        assert_eq!(reparsed, header);
    }

    #[test]
    fn test_missing_fields_are_named() {
        for field in ["version", "previousblockhash", "merkleroot", "curtime", "bits"] {
            let mut value: Value = serde_json::from_str(&template_json()).unwrap();
            value.as_object_mut().unwrap().remove(field);

            assert_malformed(
                BlockTemplate::from_value(&value).and_then(|t| t.header()),
                field,
            );
        }
    }

    #[test]
    fn test_short_hash_rejected() {
        let json = template_json().replace(PREV_HEX, "00ff");
        assert_malformed(BlockHeader::from_template_json(&json), "previousblockhash");

        let json = template_json().replace(MERKLE_HEX, &MERKLE_HEX[..62]);
        assert_malformed(BlockHeader::from_template_json(&json), "merkleroot");
    }

    #[test]
    fn test_bad_bits_length_rejected() {
        let json = template_json().replace("2000ffff", "2000ffff00");
        assert_malformed(BlockHeader::from_template_json(&json), "bits");
    }

    #[test]
    fn test_wrong_field_types_rejected() {
        let json = template_json().replace("536870912", "\"536870912\"");
        assert_malformed(BlockHeader::from_template_json(&json), "version");

        let json = template_json().replace("1700000000", "-1");
        assert_malformed(BlockHeader::from_template_json(&json), "curtime");
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert_malformed(BlockHeader::from_template_json("{not json"), "template");
        assert_malformed(BlockHeader::from_template_json("[]"), "template");
    }

    #[test]
    fn test_template_target_cross_check() {
        let mut template = BlockTemplate::from_json(&template_json()).unwrap();
        let decoded = template.target().unwrap();
        assert_eq!(decoded[0], 0x00);
        assert_eq!(decoded[1], 0xff);
        assert_eq!(decoded[2], 0xff);

        template.target = Some(hex::encode(decoded));
        assert_eq!(template.target().unwrap(), decoded);

        template.target = Some("00".repeat(32));
        match template.target() {
            Err(MinerError::MalformedTemplate { field, .. }) => assert_eq!(field, "target"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_to_value_keeps_optional_fields() {
        let template = BlockTemplate::from_json(&template_json()).unwrap();
        let value = template.to_value();
        assert_eq!(value["height"], json!(820000));
        assert!(value.get("target").is_none());
        assert_eq!(BlockTemplate::from_value(&value).unwrap(), template);
    }
}
