use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::runtime::{ConfigIssue, ConfigSeverity};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Normalized family/household config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The family config, normalized to one shape regardless of whether it was
/// parsed from a v1 legacy document or a v2 control-plane document. This is
/// the immutable snapshot the decision envelope engine reads; it is loaded
/// once at startup and never hot-reloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub schema_version: u8,
    pub family_id: String,
    pub members: Vec<Member>,
    pub parents_group: Option<ParentsGroup>,
    pub control_plane: Option<ControlPlane>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Child,
    Teen,
    YoungAdult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub role: Role,
    pub age_group: Option<AgeGroup>,
    pub profile_id: Option<String>,
    pub parental_visibility: Option<bool>,
    pub telegram_user_ids: HashSet<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentsGroup {
    pub telegram_chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Dm,
    ParentsGroup,
    FamilyGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDef {
    pub scope_type: ScopeType,
    pub telegram_chat_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    pub role: Role,
    pub capability_tier_id: String,
    pub memory_lane_policy_id: String,
    pub model_policy_id: String,
    pub safety_policy_id: String,
    #[serde(default)]
    pub high_risk_parent_notification_default: Option<bool>,
    #[serde(default)]
    pub medium_risk_parent_notification_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityTier {
    pub tier_id: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLanePolicy {
    pub policy_id: String,
    /// May contain the literal template token `{memberId}`, expanded to the
    /// speaker's member id at resolution time.
    pub read_lanes: Vec<String>,
    pub write_lanes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPolicy {
    pub policy_id: String,
    pub tier: String,
    pub model: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub policy_id: String,
    pub risk_level: RiskLevel,
    pub escalation_policy_id: String,
    #[serde(default)]
    pub high_risk_escalation_policy_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperationsConfig {
    #[serde(default)]
    pub manager_member_ids: Vec<String>,
    #[serde(default)]
    pub lane_retention: LaneRetention,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LaneRetention {
    pub default_days: Option<u32>,
    #[serde(default)]
    pub by_lane_id: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlane {
    pub policy_version: String,
    pub active_profile_id: String,
    pub profiles: Vec<Profile>,
    pub scopes: Vec<ScopeDef>,
    pub capability_tiers: Vec<CapabilityTier>,
    pub memory_lane_policies: Vec<MemoryLanePolicy>,
    pub model_policies: Vec<ModelPolicy>,
    pub safety_policies: Vec<SafetyPolicy>,
    #[serde(default)]
    pub operations: Option<OperationsConfig>,
}

impl ControlPlane {
    pub fn profile(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.profile_id == profile_id)
    }
    pub fn capability_tier(&self, tier_id: &str) -> Option<&CapabilityTier> {
        self.capability_tiers.iter().find(|t| t.tier_id == tier_id)
    }
    pub fn memory_lane_policy(&self, policy_id: &str) -> Option<&MemoryLanePolicy> {
        self.memory_lane_policies
            .iter()
            .find(|p| p.policy_id == policy_id)
    }
    pub fn model_policy(&self, policy_id: &str) -> Option<&ModelPolicy> {
        self.model_policies.iter().find(|p| p.policy_id == policy_id)
    }
    pub fn safety_policy(&self, policy_id: &str) -> Option<&SafetyPolicy> {
        self.safety_policies
            .iter()
            .find(|p| p.policy_id == policy_id)
    }
    pub fn family_group_chat_id(&self) -> Option<i64> {
        self.scopes
            .iter()
            .find(|s| s.scope_type == ScopeType::FamilyGroup)
            .and_then(|s| s.telegram_chat_id)
    }
    pub fn is_manager(&self, member_id: &str) -> bool {
        self.operations
            .as_ref()
            .map(|o| o.manager_member_ids.iter().any(|m| m == member_id))
            .unwrap_or(false)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw on-disk schemas (v1 legacy, v2 control-plane)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "schemaVersion")]
    schema_version: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFamilyConfigV1 {
    family_id: String,
    members: Vec<Member>,
    parents_group: Option<ParentsGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFamilyConfigV2 {
    family_id: String,
    members: Vec<Member>,
    parents_group: Option<ParentsGroup>,
    control_plane: ControlPlane,
}

/// Parses and normalizes a family config document, routing on `schemaVersion`.
/// Both accepted schema versions converge on the same [`FamilyConfig`] shape.
pub fn parse_family_config(raw: &str) -> crate::Result<FamilyConfig> {
    let envelope: RawEnvelope = serde_json::from_str(raw)?;
    let config = match envelope.schema_version {
        1 => {
            let v1: RawFamilyConfigV1 = serde_json::from_str(raw)?;
            FamilyConfig {
                schema_version: 1,
                family_id: v1.family_id,
                members: v1.members,
                parents_group: v1.parents_group,
                control_plane: None,
            }
        }
        2 => {
            let v2: RawFamilyConfigV2 = serde_json::from_str(raw)?;
            FamilyConfig {
                schema_version: 2,
                family_id: v2.family_id,
                members: v2.members,
                parents_group: v2.parents_group,
                control_plane: Some(v2.control_plane),
            }
        }
        other => {
            return Err(crate::Error::Config(format!(
                "unsupported schemaVersion {other}"
            )))
        }
    };
    Ok(config)
}

impl FamilyConfig {
    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }

    pub fn member_by_telegram_id(&self, telegram_id: i64) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.telegram_user_ids.contains(&telegram_id))
    }

    /// Pure, no-I/O cross-reference validation. Every member's `profileId`
    /// must exist in `profiles`, and the referenced profile's role must match
    /// the member's role; every profile's capability/lane/model/safety policy
    /// references must resolve.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.family_id.trim().is_empty() {
            issues.push(ConfigIssue {
                path: "familyId".into(),
                message: "must not be empty".into(),
                severity: ConfigSeverity::Error,
            });
        }

        let Some(cp) = &self.control_plane else {
            return issues;
        };

        for member in &self.members {
            let Some(profile_id) = &member.profile_id else {
                continue;
            };
            match cp.profile(profile_id) {
                None => issues.push(ConfigIssue {
                    path: format!("members[{}].profileId", member.member_id),
                    message: format!("references unknown profile {profile_id}"),
                    severity: ConfigSeverity::Error,
                }),
                Some(profile) if profile.role != member.role => issues.push(ConfigIssue {
                    path: format!("members[{}].profileId", member.member_id),
                    message: "profile role does not match member role".into(),
                    severity: ConfigSeverity::Error,
                }),
                Some(_) => {}
            }
        }

        for profile in &cp.profiles {
            if cp.capability_tier(&profile.capability_tier_id).is_none() {
                issues.push(ConfigIssue {
                    path: format!("profiles[{}].capabilityTierId", profile.profile_id),
                    message: format!("unknown capability tier {}", profile.capability_tier_id),
                    severity: ConfigSeverity::Error,
                });
            }
            if cp
                .memory_lane_policy(&profile.memory_lane_policy_id)
                .is_none()
            {
                issues.push(ConfigIssue {
                    path: format!("profiles[{}].memoryLanePolicyId", profile.profile_id),
                    message: format!("unknown memory lane policy {}", profile.memory_lane_policy_id),
                    severity: ConfigSeverity::Error,
                });
            }
            if cp.model_policy(&profile.model_policy_id).is_none() {
                issues.push(ConfigIssue {
                    path: format!("profiles[{}].modelPolicyId", profile.profile_id),
                    message: format!("unknown model policy {}", profile.model_policy_id),
                    severity: ConfigSeverity::Error,
                });
            }
            if cp.safety_policy(&profile.safety_policy_id).is_none() {
                issues.push(ConfigIssue {
                    path: format!("profiles[{}].safetyPolicyId", profile.profile_id),
                    message: format!("unknown safety policy {}", profile.safety_policy_id),
                    severity: ConfigSeverity::Error,
                });
            }
        }

        if cp.profile(&cp.active_profile_id).is_none() {
            issues.push(ConfigIssue {
                path: "controlPlane.activeProfileId".into(),
                message: format!("unknown profile {}", cp.active_profile_id),
                severity: ConfigSeverity::Warning,
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_v1() -> &'static str {
        r#"{
            "schemaVersion": 1,
            "familyId": "fam1",
            "members": [
                {"memberId":"wags","role":"parent","telegramUserIds":[456]},
                {"memberId":"kid","role":"child","telegramUserIds":[999]}
            ]
        }"#
    }

    #[test]
    fn parses_v1() {
        let cfg = parse_family_config(sample_v1()).unwrap();
        assert_eq!(cfg.schema_version, 1);
        assert_eq!(cfg.members.len(), 2);
        assert!(cfg.control_plane.is_none());
    }

    #[test]
    fn unsupported_schema_version_errors() {
        let raw = r#"{"schemaVersion": 99}"#;
        assert!(parse_family_config(raw).is_err());
    }

    #[test]
    fn member_lookup_by_telegram_id() {
        let cfg = parse_family_config(sample_v1()).unwrap();
        let member = cfg.member_by_telegram_id(456).unwrap();
        assert_eq!(member.member_id, "wags");
    }

    #[test]
    fn validate_v1_has_no_control_plane_issues() {
        let cfg = parse_family_config(sample_v1()).unwrap();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_rejects_empty_family_id() {
        let cfg = FamilyConfig {
            schema_version: 1,
            family_id: String::new(),
            members: Vec::new(),
            parents_group: None,
            control_plane: None,
        };
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.path == "familyId"));
    }

    #[test]
    fn validate_detects_dangling_profile_reference() {
        let cp = ControlPlane {
            policy_version: "v1".into(),
            active_profile_id: "p1".into(),
            profiles: vec![],
            scopes: vec![],
            capability_tiers: vec![],
            memory_lane_policies: vec![],
            model_policies: vec![],
            safety_policies: vec![],
            operations: None,
        };
        let cfg = FamilyConfig {
            schema_version: 2,
            family_id: "fam1".into(),
            members: vec![Member {
                member_id: "wags".into(),
                role: Role::Parent,
                age_group: None,
                profile_id: Some("missing".into()),
                parental_visibility: None,
                telegram_user_ids: HashSet::from([456]),
            }],
            parents_group: None,
            control_plane: Some(cp),
        };
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.path.contains("profileId") && i.severity == ConfigSeverity::Error));
    }
}
