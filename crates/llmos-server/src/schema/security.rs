//! Security endpoint schema types.

use serde::{Deserialize, Serialize};

use llmos_security::{ThreatCategory, ThreatType};

/// `GET /security/threat-categories` response.
#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<ThreatCategory>,
    pub total: usize,
}

/// `POST /security/threat-categories` request body: a custom category.
#[derive(Debug, Deserialize)]
pub struct RegisterCategoryRequest {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default = "default_threat_type")]
    pub threat_type: ThreatType,
}

fn default_threat_type() -> ThreatType {
    ThreatType::Custom
}
