//! Bearer token resolution. Tokens are issued elsewhere; this service only
//! reads them back from the key-value store.

use serde::{Deserialize, Serialize};

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// Default lifetime used when a token is stored from this process (tests and
/// local tooling).
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Data stored alongside a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
}

fn token_key(token: &str) -> String {
    format!("auth:token:{token}")
}

pub async fn store_token(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &TokenData,
    ttl_secs: u64,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(data).map_err(|_| ApiError::internal("serialization"))?;
    kv.set_ex(&token_key(token), &value, ttl_secs).await
}

/// Resolves a token to its principal. `None` when unknown or expired.
pub async fn lookup_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<TokenData>, ApiError> {
    if token.is_empty() {
        return Ok(None);
    }
    match kv.get(&token_key(token)).await? {
        Some(v) => {
            let data: TokenData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kv::MemoryStore;

    #[tokio::test]
    async fn stored_tokens_resolve_to_their_user() {
        let kv = MemoryStore::new();
        let data = TokenData {
            user_id: "usr_1".into(),
        };
        store_token(&kv, "tok_abc", &data, TOKEN_TTL_SECS).await.unwrap();

        assert_eq!(lookup_token(&kv, "tok_abc").await.unwrap(), Some(data));
        assert_eq!(lookup_token(&kv, "tok_other").await.unwrap(), None);
        assert_eq!(lookup_token(&kv, "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_entries_are_errors() {
        let kv = MemoryStore::new();
        kv.set_ex("auth:token:bad", "not json", 60).await.unwrap();
        assert!(lookup_token(&kv, "bad").await.is_err());
    }
}
