//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of a tenant (multi-tenant boundary).
///
/// A tenant is an account: the account id is the tenant key for every job and
/// formula record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

/// Identifier of a job, unique within its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Identifier of a formula, unique within its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormulaId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// An empty identifier never addresses a record; callers treat it
            /// as a missing required field.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_string_newtype!(TenantId, "TenantId");
impl_string_newtype!(JobId, "JobId");
impl_string_newtype!(FormulaId, "FormulaId");

/// Generates fixed-length random alphanumeric identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdGenerator {
    length: usize,
}

impl IdGenerator {
    pub fn new(length: usize) -> DomainResult<Self> {
        if length == 0 {
            return Err(DomainError::validation("id length must be greater than zero"));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn generate(&self) -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }

    pub fn job_id(&self) -> JobId {
        JobId(self.generate())
    }
}
