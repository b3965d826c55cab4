//! Message authentication codes (HMAC and AES-CMAC).
//!
//! Config:
//!
//! | field          | values                                   | default           |
//! |----------------|------------------------------------------|-------------------|
//! | `macType`      | `hmac`, `cmac`                           | required          |
//! | `algorithm`    | `sha224`, `sha256`, `sha384`, `sha512`   | `sha256` (hmac)   |
//! | `key`          | key material                             | required          |
//! | `keyEncoding`  | `utf8`, `hex`, `base64`                  | utf8 / hex (cmac) |
//! | `data`         | message (or `source`: context facet)     | required          |
//! | `dataEncoding` | `utf8`, `hex`, `base64`                  | `utf8`            |
//! | `encoding`     | `hex`, `base64`, `base64url`             | `hex`             |

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use super::{Action, ActionContext, Encoding, config_str, input_data, require_str};
use crate::{Error, Result};

/// Built-in `mac` action
pub struct MacAction;

/// Recognised MAC families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacType {
    Hmac,
    Cmac,
}

impl MacType {
    fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "hmac" => Ok(Self::Hmac),
            "cmac" => Ok(Self::Cmac),
            _ => Err(Error::UnsupportedMacType(raw.to_string())),
        }
    }
}

/// Decode key or message material.
fn decode(raw: &str, encoding: Option<&str>, default: &str, field: &str) -> Result<Vec<u8>> {
    use base64::Engine;

    match encoding.unwrap_or(default).to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" | "text" => Ok(raw.as_bytes().to_vec()),
        "hex" => hex::decode(raw.trim())
            .map_err(|e| Error::InvalidInput(format!("{field} is not valid hex: {e}"))),
        "base64" => base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| Error::InvalidInput(format!("{field} is not valid base64: {e}"))),
        other => Err(Error::unsupported("encoding", other)),
    }
}

fn hmac_digest(algorithm: &str, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{KeyInit, Mac};

    macro_rules! compute {
        ($digest:ty) => {{
            let mut mac = hmac::Hmac::<$digest>::new_from_slice(key)
                .map_err(|e| Error::InvalidInput(format!("invalid HMAC key: {e}")))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    let bytes = match algorithm.to_ascii_lowercase().replace('-', "").as_str() {
        "sha224" => compute!(Sha224),
        "sha256" => compute!(Sha256),
        "sha384" => compute!(Sha384),
        "sha512" => compute!(Sha512),
        _ => return Err(Error::unsupported("HMAC algorithm", algorithm)),
    };
    Ok(bytes)
}

fn cmac_tag(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use aes::{Aes128, Aes192, Aes256};
    use cmac::{Cmac, Mac};

    macro_rules! compute {
        ($cipher:ty) => {{
            let mut mac = Cmac::<$cipher>::new_from_slice(key)
                .map_err(|e| Error::InvalidInput(format!("invalid CMAC key: {e}")))?;
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }

    let bytes = match key.len() {
        16 => compute!(Aes128),
        24 => compute!(Aes192),
        32 => compute!(Aes256),
        n => {
            return Err(Error::InvalidInput(format!(
                "CMAC key must be 16, 24 or 32 bytes, got {n}"
            )));
        }
    };
    Ok(bytes)
}

#[async_trait]
impl Action for MacAction {
    async fn invoke(&self, config: &Value, context: &ActionContext) -> Result<Value> {
        let mac_type = MacType::parse(require_str(config, "macType")?)?;
        let encoding = Encoding::from_config(config)?;
        let key_raw = require_str(config, "key")?;
        let data_raw = input_data(config, context)?;
        let data = decode(&data_raw, config_str(config, "dataEncoding"), "utf8", "data")?;

        let tag = match mac_type {
            MacType::Hmac => {
                let key = decode(key_raw, config_str(config, "keyEncoding"), "utf8", "key")?;
                let algorithm = config_str(config, "algorithm").unwrap_or("sha256");
                hmac_digest(algorithm, &key, &data)?
            }
            MacType::Cmac => {
                let key = decode(key_raw, config_str(config, "keyEncoding"), "hex", "key")?;
                cmac_tag(&key, &data)?
            }
        };

        Ok(Value::String(encoding.encode(&tag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(config: Value) -> Result<Value> {
        MacAction.invoke(&config, &ActionContext::default()).await
    }

    #[tokio::test]
    async fn hmac_sha256_hex() {
        let value = run(json!({
            "macType": "hmac", "algorithm": "sha256", "key": "k", "data": "d", "encoding": "hex"
        }))
        .await
        .expect("hmac");
        assert_eq!(
            value,
            json!("e7ea21c3bcb63a4da3ad78503168d36bdca0be622382ea60a108fad4e4966679")
        );
    }

    #[tokio::test]
    async fn hmac_is_deterministic() {
        let config = json!({"macType": "HMAC", "key": "k", "data": "d"});
        assert_eq!(run(config.clone()).await.expect("first"), run(config).await.expect("second"));
    }

    #[tokio::test]
    async fn hmac_other_algorithms_and_encodings() {
        let b64 = run(json!({"macType": "hmac", "key": "k", "data": "d", "encoding": "base64"}))
            .await
            .expect("base64");
        assert_eq!(b64, json!("5+ohw7y2Ok2jrXhQMWjTa9ygvmIjgupgoQj61OSWZnk="));

        let sha384 = run(json!({
            "macType": "hmac", "algorithm": "SHA-384", "key": "k", "data": "d", "encoding": "base64url"
        }))
        .await
        .expect("sha384");
        assert_eq!(
            sha384,
            json!("SNogNYi6yIyiHYQ_DdIB4V4z_gik2xH_TwfSti4uEN7k5V1JYSplip5awsCmuOlF")
        );

        let sha512 = run(json!({
            "macType": "hmac", "algorithm": "sha512", "key": "key",
            "data": "The quick brown fox jumps over the lazy dog"
        }))
        .await
        .expect("sha512");
        assert_eq!(
            sha512,
            json!(
                "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a"
            )
        );
    }

    #[tokio::test]
    async fn cmac_aes128_rfc4493() {
        let empty = run(json!({
            "macType": "cmac", "key": "2b7e151628aed2a6abf7158809cf4f3c", "data": ""
        }))
        .await
        .expect("cmac");
        assert_eq!(empty, json!("bb1d6929e95937287fa37d129b756746"));

        let block = run(json!({
            "macType": "cmac",
            "key": "2b7e151628aed2a6abf7158809cf4f3c",
            "data": "6bc1bee22e409f96e93d7e117393172a",
            "dataEncoding": "hex"
        }))
        .await
        .expect("cmac");
        assert_eq!(block, json!("070a16b46b4d4144f79bdd9dd04a287c"));
    }

    #[tokio::test]
    async fn cmac_rejects_bad_key_length() {
        let err = run(json!({"macType": "cmac", "key": "00ff", "data": "x"})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("16, 24 or 32")));
    }

    #[tokio::test]
    async fn unsupported_mac_type() {
        let err = run(json!({"macType": "gmac", "key": "k", "data": "d"})).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMacType(ref t) if t == "gmac"));
    }

    #[tokio::test]
    async fn unsupported_algorithm() {
        let err = run(json!({"macType": "hmac", "algorithm": "md4", "key": "k", "data": "d"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { what: "HMAC algorithm", .. }));
    }

    #[tokio::test]
    async fn data_from_context_source() {
        let mut context = ActionContext::default();
        context.variables.insert("payload".to_string(), json!("d"));
        let value = MacAction
            .invoke(
                &json!({"macType": "hmac", "key": "k", "source": "variables.payload"}),
                &context,
            )
            .await
            .expect("hmac");
        assert_eq!(
            value,
            json!("e7ea21c3bcb63a4da3ad78503168d36bdca0be622382ea60a108fad4e4966679")
        );
    }
}
