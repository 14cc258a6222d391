mod family;
mod onboarding;
mod runtime;

pub use family::{
    parse_family_config, CapabilityTier, ControlPlane, FamilyConfig, LaneRetention,
    Member, MemoryLanePolicy, ModelPolicy, OperationsConfig, ParentsGroup, Profile, Role,
    SafetyPolicy, ScopeDef, ScopeType, AgeGroup, RiskLevel,
};
pub use onboarding::{
    accept_invite, bootstrap, issue_invite, relink, revoke_invite, Household, Invite,
    InviteState, MemberLink, OnboardingContract, OnboardingIssue, Relink, ScopeTerminology,
};
pub use runtime::{
    Config, ConfigIssue, ConfigSeverity, CorsConfig, DmScope, IdentityLink, IndexConfig,
    InboundMetadata, LifecycleConfig, PolicyPreset, ResetOverride, RetentionConfig,
    SearchConfig, ServerConfig, SessionsConfig, WorkspaceConfig,
};
