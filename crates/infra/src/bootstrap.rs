//! Wiring of the file and HTTP adapters into the core services

use std::path::PathBuf;
use std::sync::Arc;

use auditvault_core::{ChainedKeyProvider, CryptoMetrics, FieldCipher, HsmTier, RotationManager};
use auditvault_domain::constants::{DEFAULT_MASTER_SECRET_PATH, DEFAULT_WRAPPED_KEY_PATH};
use auditvault_domain::{AppConfig, Result};

use crate::hsm::RestHsmConnector;
use crate::rotation_lock::RotationLock;
use crate::storage::{
    EncryptedBackupWriter, EnvFileSecretStore, FileMasterSecretStore, FileWrappedKeyStore,
    JsonKeyHistoryStore,
};

/// Fully wired services for one process.
pub struct AppContext {
    pub config: AppConfig,
    pub metrics: Arc<CryptoMetrics>,
    pub key_provider: Arc<ChainedKeyProvider>,
    pub cipher: FieldCipher,
    pub rotation: RotationManager,
}

impl AppContext {
    /// Build every service from a validated configuration.
    ///
    /// Nothing touches the network or the key material until first use.
    pub fn build(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let rotation_config = &config.rotation;
        let provider_config = &config.key_provider;

        let metrics = Arc::new(CryptoMetrics::new(&config.metrics));

        let master_path = rotation_config.resolve(
            &provider_config
                .master_secret_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MASTER_SECRET_PATH)),
        );
        let master_secrets =
            Arc::new(FileMasterSecretStore::new(&provider_config.master_secret_env, master_path));

        let mut key_provider = ChainedKeyProvider::new(provider_config, master_secrets)
            .with_metrics(Arc::clone(&metrics));

        if let Some(hsm) = &provider_config.hsm {
            let wrapped_path = rotation_config.resolve(
                &provider_config
                    .wrapped_key_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_WRAPPED_KEY_PATH)),
            );
            key_provider = key_provider.with_hsm(HsmTier::new(
                Arc::new(RestHsmConnector::new(hsm)),
                Arc::new(FileWrappedKeyStore::new(wrapped_path)),
                hsm,
            ));
            tracing::info!(base_url = %hsm.base_url, key_name = %hsm.key_name, "bootstrap.hsm_tier_enabled");
        }
        let key_provider = Arc::new(key_provider);

        let cipher = FieldCipher::new(key_provider.clone(), Arc::clone(&metrics));

        let rotation = RotationManager::new(
            rotation_config,
            Arc::new(EnvFileSecretStore::new(rotation_config.secret_store_file())),
            Arc::new(JsonKeyHistoryStore::new(rotation_config.history_file())),
            Arc::new(EncryptedBackupWriter::new(
                rotation_config.backup_directory(),
                &rotation_config.backup_password_env,
            )),
        )
        .with_key_provider(key_provider.clone());

        Ok(Self { config, metrics, key_provider, cipher, rotation })
    }

    /// Take the cross-process rotation lock for this project.
    pub fn lock_rotation(&self) -> Result<RotationLock> {
        RotationLock::acquire(self.config.rotation.lock_file())
    }
}
