//! Stake account identity and cache key derivation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Length in bytes of an account address.
pub const ADDRESS_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("the base58 representation of the account address was malformed - {source}")]
    MalformedAddress {
        #[source]
        source: bs58::decode::Error,
    },

    #[error("account address must be {ADDRESS_LENGTH} bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte account address, displayed as base-58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountAddress([u8; ADDRESS_LENGTH]);

impl AccountAddress {
    pub fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn to_base58_string(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58_string<I: AsRef<[u8]>>(val: I) -> Result<Self, AccountError> {
        let bytes = bs58::decode(val)
            .into_vec()
            .map_err(|source| AccountError::MalformedAddress { source })?;
        let bytes: [u8; ADDRESS_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AccountError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for AccountAddress {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58_string(s)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58_string())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self)
    }
}

/// The stake account a dashboard is loaded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeAccount {
    pub address: AccountAddress,
}

/// Everything the loader needs to produce a dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiContext {
    pub stake_account: StakeAccount,
}

impl ApiContext {
    pub fn for_address(address: AccountAddress) -> Self {
        Self {
            stake_account: StakeAccount { address },
        }
    }
}

/// Cache key scoping dashboard data to one stake account.
pub fn cache_key(ctx: &ApiContext) -> String {
    ctx.stake_account.address.to_base58_string()
}
