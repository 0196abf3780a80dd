//! Pending employer records and their ingestion payloads
//!
//! A pending employer is a staged record awaiting a human merge/create
//! decision. Its payload is tagged by ingestion source and validated at
//! the boundary before entering the resolution core.

use chrono::{DateTime, Utc};
use orgmap_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role classification for a pending employer (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployerRole {
    Builder,
    HeadContractor,
    Subcontractor,
    Supplier,
}

impl EmployerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployerRole::Builder => "builder",
            EmployerRole::HeadContractor => "head_contractor",
            EmployerRole::Subcontractor => "subcontractor",
            EmployerRole::Supplier => "supplier",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "builder" => Ok(EmployerRole::Builder),
            "head_contractor" => Ok(EmployerRole::HeadContractor),
            "subcontractor" => Ok(EmployerRole::Subcontractor),
            "supplier" => Ok(EmployerRole::Supplier),
            other => Err(Error::InvalidInput(format!("Unknown employer role: {}", other))),
        }
    }
}

/// Resolution status of a pending employer
///
/// `Imported` is terminal: the record is never mutated afterwards except
/// by explicit deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Matched,
    CreateNew,
    Imported,
    Error,
    Skipped,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Matched => "matched",
            ImportStatus::CreateNew => "create_new",
            ImportStatus::Imported => "imported",
            ImportStatus::Error => "error",
            ImportStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ImportStatus::Pending),
            "matched" => Ok(ImportStatus::Matched),
            "create_new" => Ok(ImportStatus::CreateNew),
            "imported" => Ok(ImportStatus::Imported),
            "error" => Ok(ImportStatus::Error),
            "skipped" => Ok(ImportStatus::Skipped),
            other => Err(Error::InvalidInput(format!("Unknown import status: {}", other))),
        }
    }
}

/// Ingestion payload, tagged by source system
///
/// Unknown source tags fail deserialization and never reach the
/// resolution core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SourcePayload {
    /// Record staged from a BCI project feed
    BciProject {
        company_name: String,
        /// BCI company identifier (authoritative external id)
        #[serde(default)]
        bci_company_id: Option<String>,
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        suburb: Option<String>,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        postcode: Option<String>,
        #[serde(default)]
        trade_type: Option<String>,
        /// Alternate names carried by the feed
        #[serde(default)]
        aliases: Vec<String>,
    },
    /// Record staged from a scanned mapping-sheet form
    ScannedForm {
        company_name: String,
        #[serde(default)]
        trade_type: Option<String>,
        #[serde(default)]
        contact_phone: Option<String>,
        #[serde(default)]
        contact_email: Option<String>,
        /// Identifier of the uploaded scan this record came from
        #[serde(default)]
        scan_id: Option<String>,
    },
    /// Record entered by hand
    ManualEntry {
        company_name: String,
        #[serde(default)]
        trade_type: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
}

impl SourcePayload {
    /// Validate the payload before it enters the resolution core
    pub fn validate(&self) -> Result<()> {
        if self.company_name().trim().is_empty() {
            return Err(Error::InvalidInput(
                "Payload company name must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Company name as supplied by the source
    pub fn company_name(&self) -> &str {
        match self {
            SourcePayload::BciProject { company_name, .. } => company_name,
            SourcePayload::ScannedForm { company_name, .. } => company_name,
            SourcePayload::ManualEntry { company_name, .. } => company_name,
        }
    }

    /// Authoritative external-system identifier, if the source carries one
    pub fn external_id(&self) -> Option<&str> {
        match self {
            SourcePayload::BciProject { bci_company_id, .. } => bci_company_id.as_deref(),
            _ => None,
        }
    }

    /// Alternate names the source knows this company by
    pub fn alias_hints(&self) -> &[String] {
        match self {
            SourcePayload::BciProject { aliases, .. } => aliases,
            _ => &[],
        }
    }

    /// Trade type, if the source classifies one
    pub fn trade_type(&self) -> Option<&str> {
        match self {
            SourcePayload::BciProject { trade_type, .. } => trade_type.as_deref(),
            SourcePayload::ScannedForm { trade_type, .. } => trade_type.as_deref(),
            SourcePayload::ManualEntry { trade_type, .. } => trade_type.as_deref(),
        }
    }
}

/// A staged employer record awaiting resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEmployer {
    pub guid: Uuid,
    /// Display name used for candidate search
    pub name: String,
    /// Source provenance string (e.g. "bci_project", "scanned_form")
    pub source: String,
    /// Validated, source-tagged raw payload
    pub payload: SourcePayload,
    pub role: EmployerRole,
    /// Category inferred by the ingestion pipeline
    pub inferred_category: Option<String>,
    /// Category confirmed by a human
    pub confirmed_category: Option<String>,
    pub import_status: ImportStatus,
    /// Canonical employer this record resolved to (set on import)
    pub imported_employer_id: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingEmployer {
    /// Create a new pending employer from a validated payload
    pub fn new(payload: SourcePayload, role: EmployerRole) -> Result<Self> {
        payload.validate()?;

        let source = match &payload {
            SourcePayload::BciProject { .. } => "bci_project",
            SourcePayload::ScannedForm { .. } => "scanned_form",
            SourcePayload::ManualEntry { .. } => "manual_entry",
        };

        let now = Utc::now();
        Ok(Self {
            guid: Uuid::new_v4(),
            name: payload.company_name().to_string(),
            source: source.to_string(),
            payload,
            role,
            inferred_category: None,
            confirmed_category: None,
            import_status: ImportStatus::Pending,
            imported_employer_id: None,
            resolution_notes: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tag_round_trip() {
        let payload = SourcePayload::BciProject {
            company_name: "ABC Constructions".to_string(),
            bci_company_id: Some("BCI-1234".to_string()),
            address: None,
            suburb: None,
            state: None,
            postcode: None,
            trade_type: Some("concrete".to_string()),
            aliases: vec!["ABC Const".to_string()],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["source"], "bci_project");

        let back: SourcePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.company_name(), "ABC Constructions");
        assert_eq!(back.external_id(), Some("BCI-1234"));
    }

    #[test]
    fn test_unknown_source_tag_rejected() {
        let json = serde_json::json!({
            "source": "mystery_feed",
            "company_name": "ABC",
        });
        let result: std::result::Result<SourcePayload, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_company_name_rejected() {
        let payload = SourcePayload::ManualEntry {
            company_name: "   ".to_string(),
            trade_type: None,
            notes: None,
        };
        assert!(payload.validate().is_err());
        assert!(PendingEmployer::new(payload, EmployerRole::Subcontractor).is_err());
    }

    #[test]
    fn test_new_pending_defaults() {
        let payload = SourcePayload::ScannedForm {
            company_name: "Delta Cranes".to_string(),
            trade_type: Some("crane".to_string()),
            contact_phone: None,
            contact_email: None,
            scan_id: Some("scan-9".to_string()),
        };

        let pending = PendingEmployer::new(payload, EmployerRole::Subcontractor).unwrap();
        assert_eq!(pending.name, "Delta Cranes");
        assert_eq!(pending.source, "scanned_form");
        assert_eq!(pending.import_status, ImportStatus::Pending);
        assert!(pending.imported_employer_id.is_none());
    }
}
