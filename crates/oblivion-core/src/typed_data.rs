//! Domain-separated typed-data signing.
//!
//! A signature over typed data binds the protocol (name and version), the
//! verifying service and the payload. The signed digest is
//!
//! ```text
//! Blake3( 0x19 || 0x01 || domain_separator || struct_hash )
//! ```
//!
//! Structs are hashed as the CBOR array `[type_name, field_0, .., field_n]`
//! with fields in declaration order. The encoding is deterministic:
//! - Integers: smallest valid encoding
//! - Lengths: definite only
//! - Map keys: sorted by their encoded bytes
//! - Floats: rejected

use ciborium::value::{Integer, Value};
use serde::{Deserialize, Serialize};

use crate::crypto::Blake3Hash;
use crate::error::CoreError;
use crate::types::ContractId;

/// Leads every typed-data digest so it cannot collide with another message
/// kind signed by the same identity.
pub const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

const DOMAIN_TYPE: &str = "TypedDataDomain";
const DOMAIN_CONTEXT: &str = "oblivion 2024 typed-data domain v1";
const STRUCT_CONTEXT: &str = "oblivion 2024 typed-data struct v1";

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Canonical encoding of a typed struct.
pub fn encode_struct(type_name: &str, fields: Vec<Value>) -> Result<Vec<u8>, CoreError> {
    let mut items = Vec::with_capacity(fields.len() + 1);
    items.push(Value::Text(type_name.to_string()));
    items.extend(fields);
    encode_canonical(&Value::Array(items))
}

/// Hash of a typed struct.
pub fn struct_hash(type_name: &str, fields: Vec<Value>) -> Result<Blake3Hash, CoreError> {
    Ok(Blake3Hash::derive(
        STRUCT_CONTEXT,
        &encode_struct(type_name, fields)?,
    ))
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => return Err(CoreError::NonCanonical("float")),
        _ => return Err(CoreError::NonCanonical("unsupported value type")),
    }
    Ok(())
}

fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // -1 is encoded as 0, -2 as 1, ...
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Item head for `major` with the shortest argument encoding.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | n as u8);
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        pairs.push((encode_canonical(key)?, value));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key, value) in pairs {
        buf.extend_from_slice(&key);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

/// The signing domain of a verifying service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataDomain {
    pub name: String,
    pub version: String,
    /// Identifier of the service that checks signatures made in this domain.
    pub verifying_contract: ContractId,
}

impl TypedDataDomain {
    pub const DECRYPTION_NAME: &'static str = "Decryption";
    pub const DECRYPTION_VERSION: &'static str = "1";

    /// The user-decryption domain of a verifying service.
    pub fn decryption(verifying_contract: ContractId) -> Self {
        Self {
            name: Self::DECRYPTION_NAME.to_string(),
            version: Self::DECRYPTION_VERSION.to_string(),
            verifying_contract,
        }
    }

    pub fn separator(&self) -> Result<Blake3Hash, CoreError> {
        let encoded = encode_struct(
            DOMAIN_TYPE,
            vec![
                Value::Text(self.name.clone()),
                Value::Text(self.version.clone()),
                Value::Bytes(self.verifying_contract.as_bytes().to_vec()),
            ],
        )?;
        Ok(Blake3Hash::derive(DOMAIN_CONTEXT, &encoded))
    }

    /// What a signer in this domain actually signs for `struct_hash`.
    pub fn signing_digest(&self, struct_hash: &Blake3Hash) -> Result<Blake3Hash, CoreError> {
        let mut preimage = [0u8; 66];
        preimage[..2].copy_from_slice(&TYPED_DATA_PREFIX);
        preimage[2..34].copy_from_slice(self.separator()?.as_bytes());
        preimage[34..].copy_from_slice(struct_hash.as_bytes());
        Ok(Blake3Hash::hash(&preimage))
    }
}
