//! The digital notary: the high-level facade that drives a security module
//! through its key lifecycle and assembles certificates, notarized documents,
//! and citations along the way.
//!
//! The notary has its own three-state lifecycle layered over the security
//! module's. A fresh notary is `limited` (it can only generate a key), a
//! notary with an unactivated certificate is `pending` (it can self-sign that
//! certificate), and a notary with an activated certificate is `enabled` (it
//! can notarize, cite, and refresh).

pub mod document;
pub mod notary;

pub use notary::DigitalNotary;

/// The error-context name for this component.
pub(crate) const MODULE: &str = "notary";

/// The states of the notary lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotaryState {
    /// No key material; only `generateKey` is possible.
    Limited,
    /// A certificate component exists but has not been activated; the notary
    /// can notarize (to self-sign that certificate) and activate.
    Pending,
    /// A signed certificate and its citation are in place; full service.
    Enabled,
}

impl NotaryState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Limited => "limited",
            Self::Pending => "pending",
            Self::Enabled => "enabled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "limited" => Some(Self::Limited),
            "pending" => Some(Self::Pending),
            "enabled" => Some(Self::Enabled),
            _ => None,
        }
    }
}

/// The events that can drive the notary lifecycle machine. `forgetKey` and
/// the read-only verification operations are always legal and do not appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotaryEvent {
    GenerateKey,
    ActivateKey,
    GetCitation,
    NotarizeComponent,
    RefreshKey,
}

impl NotaryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateKey => "generateKey",
            Self::ActivateKey => "activateKey",
            Self::GetCitation => "getCitation",
            Self::NotarizeComponent => "notarizeComponent",
            Self::RefreshKey => "refreshKey",
        }
    }
}

/// The complete transition table. Anything not listed here is an illegal
/// event for that state. Note that `notarizeComponent` is legal in `pending`:
/// that is how a brand-new certificate gets its own signature before any
/// citation exists.
pub fn transition(state: NotaryState, event: NotaryEvent) -> Option<NotaryState> {
    match (state, event) {
        (NotaryState::Limited, NotaryEvent::GenerateKey) => Some(NotaryState::Pending),
        (NotaryState::Pending, NotaryEvent::ActivateKey) => Some(NotaryState::Enabled),
        (NotaryState::Pending, NotaryEvent::NotarizeComponent) => Some(NotaryState::Pending),
        (NotaryState::Enabled, NotaryEvent::GetCitation) => Some(NotaryState::Enabled),
        (NotaryState::Enabled, NotaryEvent::NotarizeComponent) => Some(NotaryState::Enabled),
        (NotaryState::Enabled, NotaryEvent::RefreshKey) => Some(NotaryState::Enabled),
        _ => None,
    }
}
