//! Credential & client provider (C1, §4.1). Resolves an object-store client
//! for a `DataSourceConfig`, caching clients per credential bundle so reuse
//! is safe across concurrent callers (§5).

use aws_config::sts::AssumeRoleProviderBuilder;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use curlake_core::{CredentialMethod, DataSourceConfig, Error, Result};
use moka::future::Cache;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// Caches authenticated object-store clients keyed by credential bundle
/// (§4.1: "clients are cached per credential bundle; reuse is safe across
/// concurrent callers").
#[derive(Clone)]
pub struct ClientProvider {
    cache: Cache<String, Arc<dyn ObjectStore>>,
}

impl Default for ClientProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientProvider {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(64)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
        }
    }

    /// Yields an authenticated client for `config`, building and caching one
    /// on first use for this credential bundle.
    pub async fn get_client(&self, config: &DataSourceConfig) -> Result<Arc<dyn ObjectStore>> {
        let key = config.credentials.cache_key();
        if let Some(client) = self.cache.get(&key).await {
            return Ok(client);
        }
        let client = build_client(config).await?;
        self.cache.insert(key, client.clone()).await;
        Ok(client)
    }
}

async fn build_client(config: &DataSourceConfig) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);
    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }

    match config.credentials.resolve() {
        CredentialMethod::Static(keys) => {
            tracing::debug!(method = "static", "resolving object-store credentials");
            builder = builder
                .with_access_key_id(&keys.access_key_id)
                .with_secret_access_key(&keys.secret_access_key);
        }
        CredentialMethod::Session(session) => {
            tracing::debug!(method = "session", "resolving object-store credentials");
            builder = builder
                .with_access_key_id(&session.access_key_id)
                .with_secret_access_key(&session.secret_access_key)
                .with_token(&session.session_token);
        }
        CredentialMethod::Profile(name) => {
            tracing::debug!(method = "profile", profile = name, "resolving object-store credentials");
            let creds = profile_credentials(name).await?;
            builder = apply_sdk_credentials(builder, creds);
        }
        CredentialMethod::Role(role) => {
            tracing::debug!(
                method = "role",
                role_arn = %role.role_arn,
                "resolving object-store credentials"
            );
            let creds = assume_role_credentials(role).await?;
            builder = apply_sdk_credentials(builder, creds);
        }
        CredentialMethod::Ambient => {
            tracing::debug!(method = "ambient", "resolving object-store credentials");
            let creds = ambient_credentials().await?;
            builder = apply_sdk_credentials(builder, creds);
        }
    }

    let store = builder
        .build()
        .map_err(|e| Error::AccessDenied(format!("failed to build object-store client: {e}")))?;
    Ok(Arc::new(store))
}

fn apply_sdk_credentials(
    builder: AmazonS3Builder,
    creds: aws_credential_types::Credentials,
) -> AmazonS3Builder {
    let mut builder = builder
        .with_access_key_id(creds.access_key_id())
        .with_secret_access_key(creds.secret_access_key());
    if let Some(token) = creds.session_token() {
        builder = builder.with_token(token);
    }
    builder
}

async fn profile_credentials(profile: &str) -> Result<aws_credential_types::Credentials> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .profile_name(profile)
        .load()
        .await;
    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| Error::AccessDenied(format!("no credentials available for profile {profile}")))?;
    provider
        .provide_credentials()
        .await
        .map_err(|_| Error::AccessDenied(format!("could not resolve credentials for profile {profile}")))
}

async fn assume_role_credentials(
    role: &curlake_core::config::RoleAssumption,
) -> Result<aws_credential_types::Credentials> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let mut role_builder = AssumeRoleProviderBuilder::new(role.role_arn.clone())
        .session_name(role.session_name.clone())
        .configure(&sdk_config);
    if let Some(external_id) = &role.external_id {
        role_builder = role_builder.external_id(external_id.clone());
    }
    let provider = role_builder.build().await;
    provider
        .provide_credentials()
        .await
        .map_err(|_| Error::AccessDenied(format!("could not assume role {}", role.role_arn)))
}

async fn ambient_credentials() -> Result<aws_credential_types::Credentials> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let provider = sdk_config
        .credentials_provider()
        .ok_or_else(|| Error::AccessDenied("no ambient credentials available".into()))?;
    provider
        .provide_credentials()
        .await
        .map_err(|_| Error::AccessDenied("could not resolve ambient credentials".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_caches_by_credential_bundle() {
        let provider = ClientProvider::new();
        let config = DataSourceConfig::builder(
            "bucket",
            "prefix",
            curlake_core::ExportType::CurParquet,
        )
        .credentials(curlake_core::CredentialBundle {
            static_keys: Some(curlake_core::config::StaticKeys {
                access_key_id: "AKIDEXAMPLE".into(),
                secret_access_key: "secret".into(),
            }),
            ..Default::default()
        })
        .build()
        .unwrap();
        let first = provider.get_client(&config).await.unwrap();
        let second = provider.get_client(&config).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
