use serde::{Deserialize, Serialize};

/// The onboarding/household contract: fixed literal scope terminology,
/// a household record, member links, invites and relinks. Validation rules
/// are specified in full; wiring this up to any CLI or HTTP transport is out
/// of scope — these are pure data operations over the contract value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingContract {
    pub household: Household,
    pub member_links: Vec<MemberLink>,
    pub invites: Vec<Invite>,
    pub relinks: Vec<Relink>,
    pub scope_terminology: ScopeTerminology,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub household_id: String,
    pub display_name: String,
    pub owner_member_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberLink {
    pub member_id: String,
    pub telegram_user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Issued,
    Accepted,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub invite_id: String,
    pub state: InviteState,
    pub issued_at: String,
    pub expires_at: String,
    pub accepted_at: Option<String>,
    pub accepted_by_member_id: Option<String>,
    pub accepted_telegram_user_id: Option<i64>,
    pub revoked_at: Option<String>,
    pub revoked_by_member_id: Option<String>,
    pub expired_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relink {
    pub member_id: String,
    pub previous_telegram_user_id: i64,
    pub next_telegram_user_id: i64,
}

/// Scope terminology is a fixed literal vocabulary, never configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeTerminology {
    pub member_dm: String,
    pub parents_group: String,
    pub family_group: String,
}

impl Default for ScopeTerminology {
    fn default() -> Self {
        Self {
            member_dm: "member DM".into(),
            parents_group: "parents group".into(),
            family_group: "family group".into(),
        }
    }
}

/// A single `path: message` onboarding validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for OnboardingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn issue(path: impl Into<String>, message: impl Into<String>) -> OnboardingIssue {
    OnboardingIssue {
        path: path.into(),
        message: message.into(),
    }
}

impl OnboardingContract {
    pub fn validate(&self) -> Vec<OnboardingIssue> {
        let mut issues = Vec::new();

        if self.household.household_id.trim().is_empty() {
            issues.push(issue("household.householdId", "must not be empty"));
        }
        if self.member_links.is_empty() {
            issues.push(issue("memberLinks", "must contain at least one link"));
        }

        let terminology = &self.scope_terminology;
        if terminology.member_dm != "member DM" {
            issues.push(issue("scopeTerminology.memberDm", "must be 'member DM'"));
        }
        if terminology.parents_group != "parents group" {
            issues.push(issue(
                "scopeTerminology.parentsGroup",
                "must be 'parents group'",
            ));
        }
        if terminology.family_group != "family group" {
            issues.push(issue(
                "scopeTerminology.familyGroup",
                "must be 'family group'",
            ));
        }

        for (idx, invite) in self.invites.iter().enumerate() {
            let path = format!("invites[{idx}]");
            match invite.state {
                InviteState::Accepted => {
                    if invite.accepted_by_member_id.is_none() {
                        issues.push(issue(
                            format!("{path}.acceptedByMemberId"),
                            "required when state=accepted",
                        ));
                    }
                    if invite.accepted_telegram_user_id.is_none() {
                        issues.push(issue(
                            format!("{path}.acceptedTelegramUserId"),
                            "required when state=accepted",
                        ));
                    }
                    match &invite.accepted_at {
                        None => issues.push(issue(
                            format!("{path}.acceptedAt"),
                            "required when state=accepted",
                        )),
                        Some(accepted_at) if accepted_at.as_str() > invite.expires_at.as_str() => {
                            issues.push(issue(
                                format!("{path}.acceptedAt"),
                                "must be <= expiresAt",
                            ));
                        }
                        Some(_) => {}
                    }
                }
                InviteState::Revoked => {
                    if invite.revoked_at.is_none() {
                        issues.push(issue(
                            format!("{path}.revokedAt"),
                            "required when state=revoked",
                        ));
                    }
                    if invite.revoked_by_member_id.is_none() {
                        issues.push(issue(
                            format!("{path}.revokedByMemberId"),
                            "required when state=revoked",
                        ));
                    }
                }
                InviteState::Expired => {
                    if invite.expired_at.is_none() {
                        issues.push(issue(
                            format!("{path}.expiredAt"),
                            "required when state=expired",
                        ));
                    }
                }
                InviteState::Issued => {}
            }
        }

        for (idx, relink) in self.relinks.iter().enumerate() {
            if relink.previous_telegram_user_id == relink.next_telegram_user_id {
                issues.push(issue(
                    format!("relinks[{idx}]"),
                    "previousTelegramUserId must differ from nextTelegramUserId",
                ));
            }
        }

        issues
    }
}

/// Idempotent: creates a fresh contract for a household that has none yet.
/// Calling this against an already-bootstrapped household is a caller error
/// the CLI/HTTP layer (out of scope here) is responsible for preventing;
/// this function itself has no notion of "already exists".
pub fn bootstrap(household_id: &str, display_name: &str, owner_member_id: &str, created_at: &str) -> OnboardingContract {
    OnboardingContract {
        household: Household {
            household_id: household_id.to_string(),
            display_name: display_name.to_string(),
            owner_member_id: owner_member_id.to_string(),
            created_at: created_at.to_string(),
        },
        member_links: Vec::new(),
        invites: Vec::new(),
        relinks: Vec::new(),
        scope_terminology: ScopeTerminology::default(),
    }
}

pub fn issue_invite(
    contract: &mut OnboardingContract,
    invite_id: &str,
    issued_at: &str,
    expires_at: &str,
) -> Result<(), OnboardingIssue> {
    if contract.invites.iter().any(|i| i.invite_id == invite_id) {
        return Err(issue("invites", format!("invite {invite_id} already exists")));
    }
    contract.invites.push(Invite {
        invite_id: invite_id.to_string(),
        state: InviteState::Issued,
        issued_at: issued_at.to_string(),
        expires_at: expires_at.to_string(),
        accepted_at: None,
        accepted_by_member_id: None,
        accepted_telegram_user_id: None,
        revoked_at: None,
        revoked_by_member_id: None,
        expired_at: None,
    });
    Ok(())
}

pub fn accept_invite(
    contract: &mut OnboardingContract,
    invite_id: &str,
    accepted_at: &str,
    accepted_by_member_id: &str,
    accepted_telegram_user_id: i64,
) -> Result<(), OnboardingIssue> {
    let invite = contract
        .invites
        .iter_mut()
        .find(|i| i.invite_id == invite_id)
        .ok_or_else(|| issue("invites", format!("invite {invite_id} not found")))?;
    if invite.state != InviteState::Issued {
        return Err(issue(
            format!("invites[{invite_id}].state"),
            "can only accept an issued invite",
        ));
    }
    if accepted_at > invite.expires_at.as_str() {
        return Err(issue(
            format!("invites[{invite_id}].acceptedAt"),
            "must be <= expiresAt",
        ));
    }
    invite.state = InviteState::Accepted;
    invite.accepted_at = Some(accepted_at.to_string());
    invite.accepted_by_member_id = Some(accepted_by_member_id.to_string());
    invite.accepted_telegram_user_id = Some(accepted_telegram_user_id);
    contract.member_links.push(MemberLink {
        member_id: accepted_by_member_id.to_string(),
        telegram_user_id: accepted_telegram_user_id,
    });
    Ok(())
}

pub fn revoke_invite(
    contract: &mut OnboardingContract,
    invite_id: &str,
    revoked_at: &str,
    revoked_by_member_id: &str,
) -> Result<(), OnboardingIssue> {
    let invite = contract
        .invites
        .iter_mut()
        .find(|i| i.invite_id == invite_id)
        .ok_or_else(|| issue("invites", format!("invite {invite_id} not found")))?;
    if invite.state != InviteState::Issued {
        return Err(issue(
            format!("invites[{invite_id}].state"),
            "can only revoke an issued invite",
        ));
    }
    invite.state = InviteState::Revoked;
    invite.revoked_at = Some(revoked_at.to_string());
    invite.revoked_by_member_id = Some(revoked_by_member_id.to_string());
    Ok(())
}

pub fn relink(
    contract: &mut OnboardingContract,
    member_id: &str,
    previous_telegram_user_id: i64,
    next_telegram_user_id: i64,
) -> Result<(), OnboardingIssue> {
    if previous_telegram_user_id == next_telegram_user_id {
        return Err(issue(
            "relinks",
            "previousTelegramUserId must differ from nextTelegramUserId",
        ));
    }
    for link in contract.member_links.iter_mut() {
        if link.member_id == member_id && link.telegram_user_id == previous_telegram_user_id {
            link.telegram_user_id = next_telegram_user_id;
        }
    }
    contract.relinks.push(Relink {
        member_id: member_id.to_string(),
        previous_telegram_user_id,
        next_telegram_user_id,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> OnboardingContract {
        bootstrap("house1", "The Wagners", "wags", "2026-01-01T00:00:00Z")
    }

    #[test]
    fn bootstrap_is_clean() {
        let contract = fresh();
        assert!(contract.invites.is_empty());
        assert!(contract.validate().iter().any(|i| i.path == "memberLinks"));
    }

    #[test]
    fn issue_then_accept_invite() {
        let mut contract = fresh();
        issue_invite(&mut contract, "inv1", "2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z").unwrap();
        accept_invite(&mut contract, "inv1", "2026-01-15T00:00:00Z", "kid", 999).unwrap();
        assert_eq!(contract.invites[0].state, InviteState::Accepted);
        assert_eq!(contract.member_links.len(), 1);
        assert!(contract.validate().is_empty());
    }

    #[test]
    fn accept_after_expiry_rejected() {
        let mut contract = fresh();
        issue_invite(&mut contract, "inv1", "2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z").unwrap();
        let result = accept_invite(&mut contract, "inv1", "2026-03-01T00:00:00Z", "kid", 999);
        assert!(result.is_err());
    }

    #[test]
    fn revoke_invite_sets_terminal_fields() {
        let mut contract = fresh();
        issue_invite(&mut contract, "inv1", "2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z").unwrap();
        revoke_invite(&mut contract, "inv1", "2026-01-10T00:00:00Z", "wags").unwrap();
        assert_eq!(contract.invites[0].state, InviteState::Revoked);
        assert!(contract.validate().is_empty() || !contract.validate().iter().any(|i| i.path.contains("revoked")));
    }

    #[test]
    fn relink_rejects_identical_ids() {
        let mut contract = fresh();
        let result = relink(&mut contract, "kid", 999, 999);
        assert!(result.is_err());
    }

    #[test]
    fn relink_updates_existing_member_link() {
        let mut contract = fresh();
        issue_invite(&mut contract, "inv1", "2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z").unwrap();
        accept_invite(&mut contract, "inv1", "2026-01-05T00:00:00Z", "kid", 999).unwrap();
        relink(&mut contract, "kid", 999, 1000).unwrap();
        assert_eq!(contract.member_links[0].telegram_user_id, 1000);
        assert_eq!(contract.relinks.len(), 1);
    }

    #[test]
    fn validate_detects_bad_scope_terminology() {
        let mut contract = fresh();
        contract.scope_terminology.member_dm = "dm".into();
        let issues = contract.validate();
        assert!(issues.iter().any(|i| i.path == "scopeTerminology.memberDm"));
    }
}
