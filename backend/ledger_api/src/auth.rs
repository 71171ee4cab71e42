//! Capability layer in front of the ledger.
//!
//! Authentication happens upstream: the gateway that terminates user sessions
//! forwards the caller's role in the `x-ledger-role` header. Requests without
//! the header are treated as `public`.
//!
//! | Capability         | government | contractor | public |
//! |--------------------|:----------:|:----------:|:------:|
//! | `ViewLedger`       | yes        | yes        | yes    |
//! | `CreateProject`    | yes        |            |        |
//! | `ReleaseMilestone` | yes        |            |        |
//! | `MakePayment`      |            | yes        |        |

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

pub const ROLE_HEADER: &str = "x-ledger-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Government,
    Contractor,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewLedger,
    CreateProject,
    ReleaseMilestone,
    MakePayment,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "government" => Some(Self::Government),
            "contractor" => Some(Self::Contractor),
            "public" => Some(Self::Public),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Government => "government",
            Self::Contractor => "contractor",
            Self::Public => "public",
        }
    }

    pub fn permits(&self, capability: Capability) -> bool {
        matches!(
            (self, capability),
            (_, Capability::ViewLedger)
                | (Self::Government, Capability::CreateProject)
                | (Self::Government, Capability::ReleaseMilestone)
                | (Self::Contractor, Capability::MakePayment)
        )
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Role);

impl Caller {
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.0.permits(capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden {
                role: self.0,
                capability,
            })
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ROLE_HEADER) else {
            return Ok(Caller(Role::Public));
        };
        value
            .to_str()
            .ok()
            .and_then(Role::parse)
            .map(Caller)
            .ok_or_else(|| ApiError::UnknownRole(String::from_utf8_lossy(value.as_bytes()).into_owned()))
    }
}
