//! Identity-provider wallet access.

use async_trait::async_trait;
use thiserror::Error;

/// Chain families a provider wallet can carry addresses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Solana,
    Movement,
}

impl ChainFamily {
    /// All supported chain families, in provisioning order.
    pub fn all() -> [ChainFamily; 3] {
        [ChainFamily::Evm, ChainFamily::Solana, ChainFamily::Movement]
    }

    /// Wire tag for this chain family.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Solana => "solana",
            ChainFamily::Movement => "movement",
        }
    }
}

/// A wallet as reported by the identity provider.
#[derive(Debug, Clone)]
pub struct WalletSummary {
    /// Provider wallet identifier.
    pub wallet_id: String,
    /// Display name, if any.
    pub name: Option<String>,
}

/// Request to create a provider wallet.
#[derive(Debug, Clone)]
pub struct CreateWalletRequest {
    /// Display name for the new wallet.
    pub name: String,
    /// Chain families to provision an address for.
    pub chains: Vec<ChainFamily>,
}

impl CreateWalletRequest {
    /// The default primary wallet: one address per supported chain family.
    pub fn primary() -> Self {
        Self {
            name: "Primary".to_string(),
            chains: ChainFamily::all().to_vec(),
        }
    }
}

/// Wallet provider errors.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Creation-specific provider error. Non-fatal for verification: the
    /// session is kept and the run still completes.
    #[error("Wallet creation failed: {0}")]
    Creation(String),

    /// Any other provider error.
    #[error("Wallet provider error: {0}")]
    Provider(String),
}

/// Access to the identity provider's wallet API.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// List the wallets the provider currently reports for this user.
    async fn list_wallets(&self) -> Result<Vec<WalletSummary>, WalletError>;

    /// Ask the provider to create a wallet. The new wallet appears in
    /// `list_wallets` once provisioning completes, which may lag this call.
    async fn create_wallet(&self, request: CreateWalletRequest) -> Result<(), WalletError>;
}
