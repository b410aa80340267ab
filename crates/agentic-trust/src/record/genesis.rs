//! Genesis records — the root of trust for one agent.
//!
//! A genesis record is created once by an authority action and never
//! mutated. It is superseded only by a terminal revocation record; its
//! expiry is read from `expires_at`, never written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signing::RecordSigner;

use super::{derive_record_id, hash_hex, AgentId};

/// Unique identifier for a genesis record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenesisId(pub String);

impl std::fmt::Display for GenesisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of authority originated the trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityType {
    Human,
    Organization,
    Service,
    Custom(String),
}

impl AuthorityType {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Human => "human",
            Self::Organization => "organization",
            Self::Service => "service",
            Self::Custom(s) => s.as_str(),
        }
    }
}

/// Root of trust for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisRecord {
    /// Unique genesis ID.
    pub id: GenesisId,
    /// The agent whose authority this record roots.
    pub agent_id: AgentId,
    /// The authority establishing trust.
    pub authority_id: AgentId,
    /// What kind of authority.
    pub authority_type: AuthorityType,
    /// When trust was established.
    pub created_at: DateTime<Utc>,
    /// Optional expiry (None = until revoked).
    pub expires_at: Option<DateTime<Utc>>,
    /// Authority's public key used for signing.
    pub authority_key: String,
    /// Authority's signature over the record hash.
    pub signature: String,
    /// Algorithm the signature was produced with.
    pub signature_algorithm: String,
    /// Arbitrary authority-supplied metadata.
    pub metadata: Option<serde_json::Value>,
    /// Hash of all genesis fields.
    pub record_hash: String,
}

/// Builder for genesis records.
pub struct GenesisBuilder {
    agent_id: AgentId,
    authority_id: AgentId,
    authority_type: AuthorityType,
    expires_at: Option<DateTime<Utc>>,
    metadata: Option<serde_json::Value>,
}

impl GenesisBuilder {
    /// Start building a genesis record for an agent.
    pub fn new(agent_id: AgentId, authority_id: AgentId, authority_type: AuthorityType) -> Self {
        Self {
            agent_id,
            authority_id,
            authority_type,
            expires_at: None,
            metadata: None,
        }
    }

    /// Set an expiry.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Attach metadata.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sign and finalize the genesis record.
    pub fn sign(self, signer: &dyn RecordSigner) -> Result<GenesisRecord> {
        let created_at = crate::time::now();
        let authority_key = signer.public_key_base64();

        let hash_input = format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.agent_id.0,
            self.authority_id.0,
            self.authority_type.as_str(),
            created_at.to_rfc3339(),
            self.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            authority_key,
            serde_json::to_string(&self.metadata).unwrap_or_default(),
        );
        let record_hash = hash_hex(&hash_input);
        let id = GenesisId(derive_record_id("agen", &record_hash));
        let signature = signer.sign(record_hash.as_bytes());

        Ok(GenesisRecord {
            id,
            agent_id: self.agent_id,
            authority_id: self.authority_id,
            authority_type: self.authority_type,
            created_at,
            expires_at: self.expires_at,
            authority_key,
            signature,
            signature_algorithm: signer.algorithm().to_string(),
            metadata: self.metadata,
            record_hash,
        })
    }
}

impl GenesisRecord {
    /// Is the record past its expiry at the given time?
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if at > expiry)
    }
}
