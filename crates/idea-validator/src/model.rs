use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured evaluation of a startup idea, as produced by the model and
/// accepted by [`crate::schema::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IdeaEvaluation {
    /// The problem the idea solves.
    pub problem: String,
    /// Who pays for it.
    pub customer: String,
    /// Market the idea competes in.
    pub market: String,
    /// Exactly three existing competitors.
    #[schemars(length(min = 3, max = 3))]
    pub competitors: Vec<Competitor>,
    /// Four to six practical MVP technologies.
    #[schemars(length(min = 4, max = 6))]
    pub tech_stack: Vec<String>,
    pub risk_level: RiskLevel,
    /// Integer from 0 to 100.
    #[schemars(range(min = 0, max = 100))]
    pub profitability_score: u8,
    /// Why the score and risk level were chosen.
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Competitor {
    pub name: String,
    /// How the idea differs from this competitor.
    pub differentiation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

/// A persisted submission: the user's idea text paired with its evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaRecord {
    pub id: String,
    pub prompt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<IdeaEvaluation>,
    pub created_at: DateTime<Utc>,
}

/// List view of an [`IdeaRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaSummary {
    pub id: String,
    pub prompt_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<&IdeaRecord> for IdeaSummary {
    fn from(record: &IdeaRecord) -> Self {
        Self {
            id: record.id.clone(),
            prompt_text: record.prompt_text.clone(),
            created_at: record.created_at,
        }
    }
}
