//! Signing identities derived from the configured private keys.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::config::{Settings, ADMIN_KEY_VAR, USER_KEY_VAR};
use crate::error::{Error, Result};
use crate::policy::Role;

/// Public half of a signer: who signs, and in which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub role:    Role,
    pub address: Address,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.role, self.address)
    }
}

/// The admin and user identities, fixed for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identities {
    pub admin: Identity,
    pub user:  Identity,
}

impl Identities {
    /// Identities for two known addresses. Used with externally managed signers.
    pub fn new(admin: Address, user: Address) -> Self {
        Self {
            admin: Identity { role: Role::Admin, address: admin },
            user:  Identity { role: Role::User,  address: user },
        }
    }

    /// The identity that signs for `role`.
    pub fn for_role(&self, role: Role) -> &Identity {
        match role {
            Role::Admin => &self.admin,
            Role::User  => &self.user,
        }
    }
}

/// Parsed private keys. Kept inside the crate: only the connection's wallet
/// ever touches them.
pub(crate) struct SigningKeys {
    pub(crate) admin: PrivateKeySigner,
    pub(crate) user:  PrivateKeySigner,
}

impl SigningKeys {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            admin: parse_key(ADMIN_KEY_VAR, settings.admin_key())?,
            user:  parse_key(USER_KEY_VAR, settings.user_key())?,
        })
    }

    pub(crate) fn identities(&self) -> Identities {
        Identities::new(self.admin.address(), self.user.address())
    }
}

fn parse_key(key: &'static str, secret: &str) -> Result<PrivateKeySigner> {
    PrivateKeySigner::from_str(secret.trim()).map_err(|e| Error::InvalidConfig {
        key,
        reason: format!("not a secp256k1 private key ({e})"),
    })
}
