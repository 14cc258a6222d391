use std::collections::{HashMap, HashSet};

use sa_domain::config::{FamilyConfig, Member, RiskLevel, Role};

use crate::envelope::{Action, DecisionEnvelope, IntentOut, ModelPlan, SafetyPlan, Scope, ScopeKind, Speaker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Private,
    Group,
}

#[derive(Debug, Clone, Copy)]
pub struct Chat {
    pub chat_type: ChatType,
    pub id: i64,
}

#[derive(Debug, Clone)]
pub struct Intent {
    pub is_mentioned: bool,
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetySignal {
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub capability_additions: Vec<String>,
    pub capability_removals: Vec<String>,
    pub model: Option<String>,
    pub medium_risk_parent_notification: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct Compatibility {
    pub supported_capabilities_by_model: HashMap<String, HashSet<String>>,
    pub fallback_model_by_tier: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolveInput<'a> {
    pub policy_version: String,
    pub family: &'a FamilyConfig,
    pub chat: Chat,
    pub from_id: i64,
    pub intent: Intent,
    pub family_group_chat_id: Option<i64>,
    pub safety_signal: Option<SafetySignal>,
    pub overrides: Option<Overrides>,
    pub compatibility: Option<Compatibility>,
}

fn sorted_dedup(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

fn deny(
    policy_version: String,
    speaker: Speaker,
    scope: Scope,
    intent: IntentOut,
    rationale: Vec<String>,
) -> DecisionEnvelope {
    DecisionEnvelope {
        policy_version,
        speaker,
        scope,
        intent,
        action: Action::Deny,
        allowed_capabilities: Vec::new(),
        allowed_memory_read_lanes: Vec::new(),
        allowed_memory_write_lanes: Vec::new(),
        model_plan: ModelPlan {
            tier: "none".into(),
            model: "none".into(),
            reason: "denied".into(),
        },
        safety_plan: SafetyPlan {
            risk_level: RiskLevel::Low,
            escalation_policy_id: "none".into(),
        },
        rationale,
    }
}

struct BaselinePlan {
    capabilities: Vec<String>,
    read_lanes: Vec<String>,
    write_lanes: Vec<String>,
    model_plan: ModelPlan,
    safety_plan: SafetyPlan,
}

fn expand_template(lane: &str, member_id: &str) -> String {
    lane.replace("{memberId}", member_id)
}

fn default_escalation_for_role(role: Role) -> String {
    match role {
        Role::Parent => "none".into(),
        Role::Child => "minor_default".into(),
    }
}

fn baseline_for_dm(family: &FamilyConfig, member: &Member, risk: RiskLevel) -> BaselinePlan {
    let mut read_lanes = Vec::new();
    let mut write_lanes = Vec::new();
    let mut model_plan = ModelPlan {
        tier: "default".into(),
        model: "default".into(),
        reason: "no_profile_configured".into(),
    };
    let mut escalation_id = default_escalation_for_role(member.role);

    if let (Some(profile_id), Some(cp)) = (&member.profile_id, &family.control_plane) {
        if let Some(profile) = cp.profile(profile_id) {
            if let Some(lanes) = cp.memory_lane_policy(&profile.memory_lane_policy_id) {
                read_lanes = lanes
                    .read_lanes
                    .iter()
                    .map(|l| expand_template(l, &member.member_id))
                    .collect();
                write_lanes = lanes
                    .write_lanes
                    .iter()
                    .map(|l| expand_template(l, &member.member_id))
                    .collect();
            }
            if let Some(mp) = cp.model_policy(&profile.model_policy_id) {
                model_plan = ModelPlan {
                    tier: mp.tier.clone(),
                    model: mp.model.clone(),
                    reason: mp.reason.clone(),
                };
            }
            if let Some(sp) = cp.safety_policy(&profile.safety_policy_id) {
                escalation_id = sp.escalation_policy_id.clone();
            }
        }
    }

    BaselinePlan {
        capabilities: vec!["chat.respond".into()],
        read_lanes,
        write_lanes,
        model_plan,
        safety_plan: SafetyPlan {
            risk_level: risk,
            escalation_policy_id: escalation_id,
        },
    }
}

fn baseline_for_parents_group(risk: RiskLevel) -> BaselinePlan {
    BaselinePlan {
        capabilities: vec!["chat.respond.group_safe".into()],
        read_lanes: vec!["parents_shared".into()],
        write_lanes: vec!["parents_shared".into()],
        model_plan: ModelPlan {
            tier: "parent_group_safe".into(),
            model: "parent_group_safe".into(),
            reason: "parents_group_default".into(),
        },
        safety_plan: SafetyPlan {
            risk_level: risk,
            escalation_policy_id: "none".into(),
        },
    }
}

fn baseline_for_family_group(risk: RiskLevel) -> BaselinePlan {
    BaselinePlan {
        capabilities: vec!["chat.respond.group_safe".into()],
        read_lanes: vec!["family_shared".into()],
        write_lanes: vec!["family_shared".into()],
        model_plan: ModelPlan {
            tier: "group_safe".into(),
            model: "group_safe".into(),
            reason: "family_group_default".into(),
        },
        safety_plan: SafetyPlan {
            risk_level: risk,
            escalation_policy_id: "minor_default".into(),
        },
    }
}

/// Maps `(policyVersion, family, chat, fromId, intent, ...)` to a
/// [`DecisionEnvelope`]. Pure function; never panics, never performs I/O.
/// Determinism is a contract: identical inputs always yield an identical
/// envelope.
pub fn resolve(input: ResolveInput<'_>) -> DecisionEnvelope {
    let intent_out = IntentOut {
        is_mentioned: input.intent.is_mentioned,
        command: input.intent.command.clone(),
    };

    // Step 1: scope resolution.
    let (scope, scope_kind) = match input.chat.chat_type {
        ChatType::Private => {
            let scope_id = format!("telegram:dm:{}", input.from_id);
            (
                Scope {
                    scope_id,
                    scope_type: ScopeKind::Dm,
                },
                ScopeKind::Dm,
            )
        }
        ChatType::Group => {
            let parents_chat_id = input.family.parents_group.as_ref().map(|p| p.telegram_chat_id);
            let family_chat_id = input
                .family_group_chat_id
                .or_else(|| input.family.control_plane.as_ref().and_then(|cp| cp.family_group_chat_id()));

            if parents_chat_id == Some(input.chat.id) {
                (
                    Scope {
                        scope_id: format!("telegram:parents_group:{}", input.chat.id),
                        scope_type: ScopeKind::ParentsGroup,
                    },
                    ScopeKind::ParentsGroup,
                )
            } else if family_chat_id == Some(input.chat.id) {
                (
                    Scope {
                        scope_id: format!("telegram:family_group:{}", input.chat.id),
                        scope_type: ScopeKind::FamilyGroup,
                    },
                    ScopeKind::FamilyGroup,
                )
            } else {
                (
                    Scope {
                        scope_id: format!("telegram:group:{}", input.chat.id),
                        scope_type: ScopeKind::Unapproved,
                    },
                    ScopeKind::Unapproved,
                )
            }
        }
    };

    // Step 2: member lookup.
    let member = input.family.member_by_telegram_id(input.from_id);
    let Some(member) = member else {
        return deny(
            input.policy_version,
            Speaker::Unknown,
            scope,
            intent_out,
            vec!["unknown_user".into()],
        );
    };

    let speaker = Speaker::Known {
        member_id: member.member_id.clone(),
        role: member.role,
        profile_id: member.profile_id.clone(),
    };

    // Step 3: unapproved group.
    if scope_kind == ScopeKind::Unapproved {
        return deny(
            input.policy_version,
            speaker,
            scope,
            intent_out,
            vec!["group_not_approved".into()],
        );
    }

    // Step 4: safety hard deny (adult only; child falls through to override step).
    let risk = input
        .safety_signal
        .map(|s| s.risk_level)
        .unwrap_or(RiskLevel::Low);
    if risk == RiskLevel::High && member.role == Role::Parent {
        return deny(
            input.policy_version,
            speaker,
            scope,
            intent_out,
            vec!["safety_high_risk_hard_deny".into()],
        );
    }

    // Step 5: scope admission.
    if scope_kind == ScopeKind::ParentsGroup && member.role == Role::Child {
        return deny(
            input.policy_version,
            speaker,
            scope,
            intent_out,
            vec!["child_in_parents_group".into()],
        );
    }
    if scope_kind == ScopeKind::FamilyGroup && !input.intent.is_mentioned {
        return deny(
            input.policy_version,
            speaker,
            scope,
            intent_out,
            vec![
                "mention_required_in_family_group".into(),
                "family_group_mention_exceptions_none".into(),
            ],
        );
    }

    // Step 6: role/profile baseline plan.
    let baseline = match scope_kind {
        ScopeKind::Dm => baseline_for_dm(input.family, member, risk),
        ScopeKind::ParentsGroup => baseline_for_parents_group(risk),
        ScopeKind::FamilyGroup => baseline_for_family_group(risk),
        ScopeKind::Unapproved => unreachable!("handled in step 3"),
    };

    let mut rationale = Vec::new();
    let mut action = Action::Allow;
    let mut capabilities = baseline.capabilities;
    let mut model_plan = baseline.model_plan;
    let mut safety_plan = baseline.safety_plan;

    let overrides = input.overrides.unwrap_or_default();
    let profile_policy = member
        .profile_id
        .as_ref()
        .and_then(|pid| input.family.control_plane.as_ref().and_then(|cp| cp.profile(pid)));

    // Step 7: override step.
    if member.role == Role::Child {
        if risk == RiskLevel::High {
            let notify = profile_policy
                .and_then(|p| p.high_risk_parent_notification_default)
                .unwrap_or(true);
            if notify {
                action = Action::RequiresParentApproval;
                rationale.push("high_risk_parent_notification".into());
            } else {
                action = Action::Deny;
                rationale.push("high_risk_parent_notification".into());
            }
            if let Some(escalation) = profile_policy.and_then(|p| {
                input
                    .family
                    .control_plane
                    .as_ref()
                    .and_then(|cp| cp.safety_policy(&p.safety_policy_id))
                    .and_then(|sp| sp.high_risk_escalation_policy_id.clone())
            }) {
                safety_plan.escalation_policy_id = escalation;
                rationale.push("high_risk_escalation_override".into());
            }
        } else if risk == RiskLevel::Medium {
            let explicit = overrides.medium_risk_parent_notification;
            let profile_default = profile_policy.and_then(|p| p.medium_risk_parent_notification_default);
            let (notify, token) = if let Some(explicit) = explicit {
                (explicit, "medium_risk_parent_notification_override")
            } else if let Some(profile_default) = profile_default {
                (profile_default, "medium_risk_parent_notification_profile_default")
            } else {
                (false, "medium_risk_parent_notification_default")
            };
            rationale.push(token.into());
            if notify {
                action = Action::RequiresParentApproval;
            }
        }
    }

    if action != Action::Deny {
        let additions: HashSet<String> = overrides.capability_additions.iter().cloned().collect();
        let removals: HashSet<String> = overrides.capability_removals.iter().cloned().collect();
        let mut next: HashSet<String> = capabilities.iter().cloned().collect();
        let before = next.clone();
        next.extend(additions);
        for r in &removals {
            next.remove(r);
        }
        let mut changed = next != before;
        if let Some(model) = &overrides.model {
            if *model != model_plan.model {
                model_plan.model = model.clone();
                changed = true;
            }
        }
        capabilities = sorted_dedup(next.into_iter().collect());
        if changed {
            rationale.push("parent_overrides_applied".into());
        }
    }

    // Step 8: compatibility fallback.
    if action != Action::Deny {
        if let Some(compat) = &input.compatibility {
            if let Some(supported) = compat.supported_capabilities_by_model.get(&model_plan.model) {
                let is_subset = capabilities.iter().all(|c| supported.contains(c));
                if !is_subset {
                    if let Some(fallback_model) = compat.fallback_model_by_tier.get(&model_plan.tier) {
                        let fallback_supported = compat
                            .supported_capabilities_by_model
                            .get(fallback_model)
                            .cloned()
                            .unwrap_or_default();
                        if capabilities.iter().all(|c| fallback_supported.contains(c)) {
                            model_plan.model = fallback_model.clone();
                            rationale.push("compatibility_fallback_model".into());
                        }
                    }
                }
            }
        }
    }

    if action == Action::Deny {
        return DecisionEnvelope {
            policy_version: input.policy_version,
            speaker,
            scope,
            intent: intent_out,
            action,
            allowed_capabilities: Vec::new(),
            allowed_memory_read_lanes: Vec::new(),
            allowed_memory_write_lanes: Vec::new(),
            model_plan: ModelPlan {
                tier: "none".into(),
                model: "none".into(),
                reason: "denied".into(),
            },
            safety_plan,
            rationale,
        };
    }

    DecisionEnvelope {
        policy_version: input.policy_version,
        speaker,
        scope,
        intent: intent_out,
        action,
        allowed_capabilities: capabilities,
        allowed_memory_read_lanes: sorted_dedup(baseline.read_lanes),
        allowed_memory_write_lanes: sorted_dedup(baseline.write_lanes),
        model_plan,
        safety_plan,
        rationale,
    }
}
