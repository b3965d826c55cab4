//! Small built-in actions: digests, encodings, timestamps and ids.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::{Action, ActionContext, Encoding, config_str, input_data};
use crate::{Error, Result};

/// `hash`: digest of `data` / `source` (`algorithm` defaults to sha256).
pub struct HashAction;

#[async_trait]
impl Action for HashAction {
    async fn invoke(&self, config: &Value, context: &ActionContext) -> Result<Value> {
        let data = input_data(config, context)?;
        let algorithm = config_str(config, "algorithm").unwrap_or("sha256");
        let encoding = Encoding::from_config(config)?;

        let digest = match algorithm.to_ascii_lowercase().replace('-', "").as_str() {
            "sha224" => Sha224::digest(data.as_bytes()).to_vec(),
            "sha256" => Sha256::digest(data.as_bytes()).to_vec(),
            "sha384" => Sha384::digest(data.as_bytes()).to_vec(),
            "sha512" => Sha512::digest(data.as_bytes()).to_vec(),
            _ => return Err(Error::unsupported("hash algorithm", algorithm)),
        };
        Ok(Value::String(encoding.encode(&digest)))
    }
}

/// `encode`: re-encode the UTF-8 bytes of `data` / `source`.
pub struct EncodeAction;

#[async_trait]
impl Action for EncodeAction {
    async fn invoke(&self, config: &Value, context: &ActionContext) -> Result<Value> {
        let data = input_data(config, context)?;
        let encoding = Encoding::from_config(config)?;
        Ok(Value::String(encoding.encode(data.as_bytes())))
    }
}

/// `timestamp`: current UTC time (`format`: `rfc3339`, `unix`, `unixMillis`).
pub struct TimestampAction;

#[async_trait]
impl Action for TimestampAction {
    async fn invoke(&self, config: &Value, _context: &ActionContext) -> Result<Value> {
        let now = Utc::now();
        match config_str(config, "format").unwrap_or("rfc3339") {
            "rfc3339" => Ok(Value::String(now.to_rfc3339())),
            "unix" => Ok(Value::from(now.timestamp())),
            "unixMillis" => Ok(Value::from(now.timestamp_millis())),
            other => Err(Error::unsupported("timestamp format", other)),
        }
    }
}

/// `uuid`: random v4 UUID.
pub struct UuidAction;

#[async_trait]
impl Action for UuidAction {
    async fn invoke(&self, _config: &Value, _context: &ActionContext) -> Result<Value> {
        Ok(Value::String(uuid::Uuid::new_v4().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ActionContext {
        ActionContext::default()
    }

    #[tokio::test]
    async fn hash_sha256_and_sha224() {
        let v = HashAction.invoke(&json!({"data": "abc"}), &ctx()).await.expect("hash");
        assert_eq!(v, json!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"));
        let v = HashAction
            .invoke(&json!({"data": "abc", "algorithm": "sha224"}), &ctx())
            .await
            .expect("hash");
        assert_eq!(v, json!("23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"));
    }

    #[tokio::test]
    async fn hash_rejects_unknown_algorithm() {
        let err = HashAction
            .invoke(&json!({"data": "abc", "algorithm": "md5"}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[tokio::test]
    async fn encode_base64() {
        let v = EncodeAction
            .invoke(&json!({"data": "user:pass", "encoding": "base64"}), &ctx())
            .await
            .expect("encode");
        assert_eq!(v, json!("dXNlcjpwYXNz"));
    }

    #[tokio::test]
    async fn timestamp_formats() {
        let unix = TimestampAction
            .invoke(&json!({"format": "unix"}), &ctx())
            .await
            .expect("unix");
        assert!(unix.as_i64().is_some_and(|t| t > 1_600_000_000));
        let rfc = TimestampAction.invoke(&json!({}), &ctx()).await.expect("rfc3339");
        assert!(rfc.as_str().is_some_and(|s| s.contains('T')));
        assert!(TimestampAction.invoke(&json!({"format": "weird"}), &ctx()).await.is_err());
    }

    #[tokio::test]
    async fn uuid_is_random_v4() {
        let a = UuidAction.invoke(&Value::Null, &ctx()).await.expect("uuid");
        let b = UuidAction.invoke(&Value::Null, &ctx()).await.expect("uuid");
        assert_ne!(a, b);
        assert!(a.as_str().is_some_and(|s| s.len() == 36));
    }
}
