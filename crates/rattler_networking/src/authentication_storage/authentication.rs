//! Authentication methods supported in the conda ecosystem.

use serde::{Deserialize, Serialize};

/// A single credential that can be attached to requests made to a particular host.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum Authentication {
    /// Sent as a header of the form `Authorization: Bearer {TOKEN}`.
    BearerToken(String),
    /// Sent as HTTP basic auth, embedded in the URL's userinfo.
    BasicHttp {
        /// The username to use for basic auth.
        username: String,
        /// The password to use for basic auth.
        password: String,
    },
    /// Sent as a `/t/{TOKEN}/` path segment inserted right after the host.
    CondaToken(String),
    /// Credentials for an S3-compatible channel.
    S3Credentials {
        /// The access key ID.
        access_key_id: String,
        /// The secret access key.
        secret_access_key: String,
        /// An optional session token for temporary credentials.
        session_token: Option<String>,
    },
}

impl Authentication {
    /// Returns the kind of authentication, used for diagnostics and logging.
    pub fn method(&self) -> &'static str {
        match self {
            Authentication::BearerToken(_) => "BearerToken",
            Authentication::BasicHttp { .. } => "BasicHttp",
            Authentication::CondaToken(_) => "CondaToken",
            Authentication::S3Credentials { .. } => "S3Credentials",
        }
    }
}
