//! Custom Resource Definitions for the SecurityProfile operator

mod security_profile;
mod types;

pub use security_profile::{SecurityProfile, SecurityProfileSpec, SecurityProfileStatus};
pub use types::{validate_dns_label, Condition, ConditionStatus, ProfilePhase};
