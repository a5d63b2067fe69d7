//! Identity, identifier, and call-context types shared by every component.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CertchainError, Result};
use crate::util;

/// Host-supplied Unix seconds.
pub type Timestamp = u64;

/// Opaque account identity used as caller, owner, and issuer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        util::is_null_principal(&self.0)
    }

    /// Reject the null principal with a validation error naming `label`.
    pub fn ensure_not_null(&self, label: &str) -> Result<()> {
        if self.is_null() {
            return Err(CertchainError::Validation(format!(
                "{label} must be a non-null principal"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

macro_rules! asset_id {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Identifiers are assigned from 1 upward; 0 is never issued.
            pub const FIRST: Self = Self(1);

            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " #{}"), self.0)
            }
        }
    };
}

asset_id!(CertificateId, "certificate");
asset_id!(BatchId, "batch");

/// Who is calling, and when the host ordered the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Principal,
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: impl Into<Principal>, now: Timestamp) -> Self {
        Self {
            caller: caller.into(),
            now,
        }
    }
}

impl From<String> for Principal {
    fn from(s: String) -> Self {
        Self(s)
    }
}
