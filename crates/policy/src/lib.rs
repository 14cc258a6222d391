pub mod envelope;
pub mod resolve;

pub use envelope::{Action, DecisionEnvelope, ModelPlan, SafetyPlan, Scope, ScopeKind, Speaker};
pub use resolve::{resolve, Chat, ChatType, Compatibility, Intent, Overrides, ResolveInput, SafetySignal};

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{parse_family_config, RiskLevel};

    fn family_v1() -> sa_domain::config::FamilyConfig {
        parse_family_config(
            r#"{
                "schemaVersion": 1,
                "familyId": "fam1",
                "members": [
                    {"memberId":"wags","role":"parent","telegramUserIds":[456]},
                    {"memberId":"kid","role":"child","telegramUserIds":[999]}
                ],
                "parentsGroup": {"telegramChatId": 777}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn deterministic_deny_for_unknown_user() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Private,
                id: 111,
            },
            from_id: 111,
            intent: Intent {
                is_mentioned: false,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: None,
            overrides: None,
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::Deny);
        assert!(envelope.rationale.contains(&"unknown_user".to_string()));
        assert!(matches!(envelope.speaker, Speaker::Unknown));
    }

    #[test]
    fn family_group_mention_gating() {
        let family = family_v1();
        let base = |is_mentioned: bool| ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Group,
                id: 888,
            },
            from_id: 456,
            intent: Intent {
                is_mentioned,
                command: None,
            },
            family_group_chat_id: Some(888),
            safety_signal: None,
            overrides: None,
            compatibility: None,
        };

        let denied = resolve(base(false));
        assert_eq!(denied.action, Action::Deny);
        assert!(denied.rationale.contains(&"mention_required_in_family_group".to_string()));
        assert!(denied
            .rationale
            .contains(&"family_group_mention_exceptions_none".to_string()));

        let allowed = resolve(base(true));
        assert_eq!(allowed.action, Action::Allow);
        assert_eq!(allowed.scope.scope_type, ScopeKind::FamilyGroup);
        assert!(allowed
            .allowed_capabilities
            .contains(&"chat.respond.group_safe".to_string()));
    }

    #[test]
    fn high_risk_adult_hard_deny_beats_dm_allow() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Private,
                id: 456,
            },
            from_id: 456,
            intent: Intent {
                is_mentioned: false,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: Some(SafetySignal {
                risk_level: RiskLevel::High,
            }),
            overrides: None,
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::Deny);
        assert!(envelope
            .rationale
            .contains(&"safety_high_risk_hard_deny".to_string()));
    }

    #[test]
    fn high_risk_child_requires_parent_approval_by_default() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Private,
                id: 999,
            },
            from_id: 999,
            intent: Intent {
                is_mentioned: false,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: Some(SafetySignal {
                risk_level: RiskLevel::High,
            }),
            overrides: None,
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::RequiresParentApproval);
    }

    #[test]
    fn child_in_parents_group_is_denied() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Group,
                id: 777,
            },
            from_id: 999,
            intent: Intent {
                is_mentioned: true,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: None,
            overrides: None,
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::Deny);
        assert!(envelope
            .rationale
            .contains(&"child_in_parents_group".to_string()));
    }

    #[test]
    fn group_not_approved_when_no_scope_matches() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Group,
                id: 12345,
            },
            from_id: 456,
            intent: Intent {
                is_mentioned: true,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: None,
            overrides: None,
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::Deny);
        assert!(envelope.rationale.contains(&"group_not_approved".to_string()));
    }

    #[test]
    fn parent_capability_overrides_apply_and_sort() {
        let family = family_v1();
        let input = ResolveInput {
            policy_version: "v1".into(),
            family: &family,
            chat: Chat {
                chat_type: ChatType::Private,
                id: 456,
            },
            from_id: 456,
            intent: Intent {
                is_mentioned: false,
                command: None,
            },
            family_group_chat_id: None,
            safety_signal: None,
            overrides: Some(Overrides {
                capability_additions: vec!["zzz.tool".into(), "aaa.tool".into()],
                capability_removals: vec![],
                model: None,
                medium_risk_parent_notification: None,
            }),
            compatibility: None,
        };
        let envelope = resolve(input);
        assert_eq!(envelope.action, Action::Allow);
        assert_eq!(
            envelope.allowed_capabilities,
            vec!["aaa.tool".to_string(), "chat.respond".to_string(), "zzz.tool".to_string()]
        );
        assert!(envelope
            .rationale
            .contains(&"parent_overrides_applied".to_string()));
    }
}
