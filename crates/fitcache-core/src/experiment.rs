//! Saved experiment configurations, keyed by fingerprint.

use fitcache_state::{Fingerprint, RecordStore};
use serde::Serialize;
use tracing::info;

use crate::domain::digest::{self, Fingerprinter};
use crate::domain::error::Result;

/// Fingerprint `config` and store it once.
///
/// Saving an identical config again (keys in any order) returns the same
/// hash and leaves the stored row untouched.
pub async fn save_experiment_and_get_hash<T: Serialize + ?Sized>(
    config: &T,
    records: &dyn RecordStore,
) -> Result<Fingerprint> {
    save_experiment_with(Fingerprinter::default(), config, records).await
}

/// [`save_experiment_and_get_hash`] with an explicit fingerprinter.
pub async fn save_experiment_with<T: Serialize + ?Sized>(
    fingerprinter: Fingerprinter,
    config: &T,
    records: &dyn RecordStore,
) -> Result<Fingerprint> {
    let value = digest::to_config_value(config)?;
    let experiment_hash = fingerprinter.fingerprint(&value)?;
    let record = records.save_experiment(&experiment_hash, value).await?;
    info!(
        experiment_hash = %experiment_hash.short(),
        created_at = %record.created_at,
        "experiment saved"
    );
    Ok(experiment_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest::DigestAlgorithm;
    use fitcache_state::fakes::MemoryRecordStore;
    use serde_json::json;

    #[tokio::test]
    async fn saving_twice_returns_same_hash() {
        let records = MemoryRecordStore::new();
        let config = json!({ "one": "two" });

        let first = save_experiment_and_get_hash(&config, &records).await.unwrap();
        let second = save_experiment_and_get_hash(&config, &records).await.unwrap();
        assert_eq!(first, second);

        let stored = records.get_experiment(&first).await.unwrap().unwrap();
        assert_eq!(stored.config, config);
    }

    #[tokio::test]
    async fn key_order_does_not_matter() {
        let records = MemoryRecordStore::new();
        let a = json!({ "one": "two", "three": { "four": "five", "six": "seven" } });
        let b = json!({ "three": { "six": "seven", "four": "five" }, "one": "two" });
        assert_eq!(
            save_experiment_and_get_hash(&a, &records).await.unwrap(),
            save_experiment_and_get_hash(&b, &records).await.unwrap()
        );
    }

    #[tokio::test]
    async fn sha512_experiments_use_long_hashes() {
        let records = MemoryRecordStore::new();
        let hash = save_experiment_with(
            Fingerprinter::new(DigestAlgorithm::Sha512),
            &json!({ "one": "two" }),
            &records,
        )
        .await
        .unwrap();
        assert_eq!(hash.as_str().len(), 128);
        assert!(records.get_experiment(&hash).await.unwrap().is_some());
    }
}
