//! String operator: plain enveloped values under the `C` tag.

use crate::codec::{self, envelope_state, MetaState};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    /// SET. `ttl_secs == 0` stores the value without expiration.
    pub fn set(&self, key: &[u8], value: &[u8], ttl_secs: u32) -> StoreResult<()> {
        let now = codec::unix_now();
        self.with_txn(key, |tx| {
            tx.put(
                &codec::string_key(key),
                &codec::encode_envelope(value, ttl_secs, now),
            )?;
            Ok(())
        })
    }

    /// GET. An expired value is purged lazily and reported as missing.
    pub fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let now = codec::unix_now();
        let raw = self.shard(key).get(&codec::string_key(key))?;
        match envelope_state(raw.as_deref(), now) {
            MetaState::Missing => Err(StoreError::NotFound),
            MetaState::Expired => {
                tracing::debug!(key = %String::from_utf8_lossy(key), "purging expired string");
                let _ = self.del_string(key);
                Err(StoreError::NotFound)
            }
            MetaState::Live { payload, .. } => Ok(payload.to_vec()),
        }
    }

    /// Removes the string entry for the key, if one exists.
    pub(crate) fn del_string(&self, key: &[u8]) -> StoreResult<()> {
        let string_key = codec::string_key(key);
        self.with_txn(key, |tx| {
            if tx.get(&string_key)?.is_none() {
                return Err(StoreError::NotFound);
            }
            tx.del(&string_key)?;
            Ok(())
        })
    }
}
