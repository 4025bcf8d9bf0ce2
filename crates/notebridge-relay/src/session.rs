//! Handshake state and per-session identity
//!
//! ```text
//! Uninitialized
//!   ↓ initialize()
//! AwaitingRegistration
//!   ↓ component-registered
//! Registered
//! ```

use notebridge_protocol::{Environment, RegistrationData};
use serde_json::{Map, Value};

use crate::themes::ThemeActivator;
use crate::transport::OriginGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    AwaitingRegistration,
    Registered,
}

impl SessionPhase {
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        matches!(
            (self, target),
            (SessionPhase::Uninitialized, SessionPhase::AwaitingRegistration)
                | (SessionPhase::AwaitingRegistration, SessionPhase::Registered)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::AwaitingRegistration => "awaiting-registration",
            SessionPhase::Registered => "registered",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the relay knows about its host session.
#[derive(Debug)]
pub struct Session {
    pub phase: SessionPhase,
    pub guard: OriginGuard,
    pub session_key: Option<String>,
    pub environment: Option<Environment>,
    pub platform: Option<String>,
    pub uuid: Option<String>,
    pub themes: ThemeActivator,
    pub component_data: Option<Map<String, Value>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            guard: OriginGuard::new(),
            session_key: None,
            environment: None,
            platform: None,
            uuid: None,
            themes: ThemeActivator::new(true),
            component_data: None,
        }
    }

    /// Move to `target`; refuses anything the state machine does not allow.
    pub fn transition_to(&mut self, target: SessionPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            return false;
        }
        tracing::debug!(from = %self.phase, to = %target, "Session phase transition");
        self.phase = target;
        true
    }

    pub fn origin(&self) -> Option<&str> {
        self.guard.pinned()
    }

    /// Take the session key and component data from a registration.
    /// The key may be reissued by later registrations.
    pub fn accept_registration(
        &mut self,
        session_key: String,
        component_data: Option<Map<String, Value>>,
    ) {
        self.session_key = Some(session_key);
        if let Some(data) = component_data {
            self.component_data = Some(data);
        }
    }

    pub fn capture_identity(&mut self, data: &RegistrationData) {
        self.environment = data.environment;
        self.platform = data.platform.clone();
        self.uuid = data.uuid.clone();
    }

    pub fn is_mobile(&self) -> bool {
        self.environment
            .map_or(false, |env| env.requires_string_payloads())
    }

    pub fn is_desktop(&self) -> bool {
        self.environment == Some(Environment::Desktop)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_transitions() {
        let mut session = Session::new();
        assert!(session.transition_to(SessionPhase::AwaitingRegistration));
        assert!(session.transition_to(SessionPhase::Registered));
        assert_eq!(session.phase, SessionPhase::Registered);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = Session::new();
        // Can't register before initialize
        assert!(!session.transition_to(SessionPhase::Registered));
        session.transition_to(SessionPhase::AwaitingRegistration);
        // Can't initialize twice
        assert!(!session.transition_to(SessionPhase::AwaitingRegistration));
        session.transition_to(SessionPhase::Registered);
        // Registered is terminal
        assert!(!session.transition_to(SessionPhase::Uninitialized));
        assert!(!session.transition_to(SessionPhase::AwaitingRegistration));
    }

    #[test]
    fn test_registration_keeps_component_data_when_absent() {
        let mut session = Session::new();
        let mut data = Map::new();
        data.insert("spacing".into(), json!("Cozy"));

        session.accept_registration("key-1".into(), Some(data));
        session.accept_registration("key-2".into(), None);

        assert_eq!(session.session_key.as_deref(), Some("key-2"));
        assert_eq!(session.component_data.unwrap()["spacing"], "Cozy");
    }

    #[test]
    fn test_identity_capture() {
        let mut session = Session::new();
        session.capture_identity(&RegistrationData {
            environment: Some(Environment::Mobile),
            platform: Some("android".into()),
            uuid: Some("component-1".into()),
            active_theme_urls: vec![],
        });

        assert!(session.is_mobile());
        assert!(!session.is_desktop());
        assert_eq!(session.platform.as_deref(), Some("android"));
    }
}
