//! Company profile models for sector/industry enrichment.

use serde::{Deserialize, Serialize};

/// Provider-sourced company profile data.
///
/// Profile lookup is best-effort enrichment: every field except the
/// source provider may be absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Provider that produced the profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Company display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sector (e.g., "Technology")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    /// Industry (e.g., "Consumer Electronics")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl CompanyProfile {
    /// True when the profile carries no enrichment data at all.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.sector.is_none() && self.industry.is_none()
    }
}
