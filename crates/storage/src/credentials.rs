//! Chained credential resolution for the S3 backend.
//!
//! Providers are consulted in order and the first one that yields credentials
//! wins. A provider with nothing to offer declines with
//! `CredentialsError::CredentialsNotLoaded`, which moves the chain on to the
//! next provider; any other error stops resolution.
//!
//! 1. key pair given on the command line
//! 2. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` environment variables
//! 3. shared credentials / config profile files
//! 4. EC2 instance metadata (IMDS) role credentials

use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::future::ProvideCredentials as ProvideCredentialsFuture;
use tokio::sync::OnceCell;

/// Provider names in resolution order, as they appear in SDK logs.
pub const PROVIDER_ORDER: [&str; 4] = ["CommandLine", "Environment", "Profile", "Ec2InstanceMetadata"];

/// Provider for an explicitly supplied key pair.
///
/// Declines when either half of the pair is empty so later providers get a chance.
#[derive(Clone, Debug)]
pub struct ExplicitKeysProvider {
    credentials: Option<Credentials>,
}

impl ExplicitKeysProvider {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        let credentials = (!access_key_id.is_empty() && !secret_access_key.is_empty()).then(|| {
            Credentials::new(
                access_key_id,
                secret_access_key,
                None, // session token
                None, // expiration
                "registry-reaper-cli",
            )
        });

        Self { credentials }
    }

    fn credentials(&self) -> aws_credential_types::provider::Result {
        self.credentials.clone().ok_or_else(|| {
            CredentialsError::not_loaded("no access key pair supplied on the command line")
        })
    }
}

impl ProvideCredentials for ExplicitKeysProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::ready(self.credentials())
    }
}

/// Ordered credential chain, built on the first signed request.
///
/// Constructing the profile and IMDS providers is deferred so that building
/// the backend has no side effects when explicit keys end up winning.
pub struct ChainedCredentialsProvider {
    explicit: ExplicitKeysProvider,
    chain: OnceCell<CredentialsProviderChain>,
}

impl std::fmt::Debug for ChainedCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedCredentialsProvider")
            .field("order", &PROVIDER_ORDER)
            .field("initialized", &self.chain.initialized())
            .finish_non_exhaustive()
    }
}

impl ChainedCredentialsProvider {
    pub fn new(explicit: ExplicitKeysProvider) -> Self {
        Self {
            explicit,
            chain: OnceCell::new(),
        }
    }

    fn build_chain(&self) -> CredentialsProviderChain {
        let [explicit, environment, profile, imds] = PROVIDER_ORDER;
        CredentialsProviderChain::first_try(explicit, self.explicit.clone())
            .or_else(environment, EnvironmentVariableCredentialsProvider::new())
            .or_else(profile, ProfileFileCredentialsProvider::builder().build())
            .or_else(imds, ImdsCredentialsProvider::builder().build())
    }

    async fn credentials(&self) -> aws_credential_types::provider::Result {
        // Short-circuit so explicit keys never touch the rest of the chain.
        if let Ok(credentials) = self.explicit.credentials() {
            return Ok(credentials);
        }

        let chain = self
            .chain
            .get_or_init(|| async { self.build_chain() })
            .await;
        chain.provide_credentials().await
    }
}

impl ProvideCredentials for ChainedCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::new(self.credentials())
    }
}
