use serde::Serialize;

/// Speaker identity as resolved against the family roster. A two-variant sum
/// rather than an optional `memberId` field, so "unknown speaker" cannot be
/// confused with a known speaker missing some fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Speaker {
    Known {
        member_id: String,
        role: sa_domain::config::Role,
        profile_id: Option<String>,
    },
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Dm,
    ParentsGroup,
    FamilyGroup,
    /// A group chat that did not match any configured parents/family group.
    Unapproved,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub scope_id: String,
    pub scope_type: ScopeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentOut {
    pub is_mentioned: bool,
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
    RequiresParentApproval,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelPlan {
    pub tier: String,
    pub model: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyPlan {
    pub risk_level: sa_domain::config::RiskLevel,
    pub escalation_policy_id: String,
}

/// The pure output of the decision envelope engine: the action plus every
/// downstream constraint a caller needs. Identical inputs always produce an
/// identical envelope.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEnvelope {
    pub policy_version: String,
    pub speaker: Speaker,
    pub scope: Scope,
    pub intent: IntentOut,
    pub action: Action,
    pub allowed_capabilities: Vec<String>,
    pub allowed_memory_read_lanes: Vec<String>,
    pub allowed_memory_write_lanes: Vec<String>,
    pub model_plan: ModelPlan,
    pub safety_plan: SafetyPlan,
    pub rationale: Vec<String>,
}
