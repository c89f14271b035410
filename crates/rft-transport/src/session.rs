//! Session lifecycle state machine: INIT → ESTABLISHED → CLOSING → CLOSED.

/// The four states a session can be in, on either peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Established,
    Closing,
    Closed,
}

/// Explicit state machine shared by sender and receiver engines. Modeling
/// this as a tagged variant (rather than booleans scattered across the
/// engine) makes "DATA before START" and "DATA after END" simple matches
/// instead of ad hoc flag checks.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            state: SessionState::Init,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A START has been sent (sender) or received and ACKed (receiver).
    pub fn on_start(&mut self) {
        if self.state == SessionState::Init {
            self.state = SessionState::Established;
        }
    }

    /// An END has been sent (sender, after last DATA ACKed) or received
    /// (receiver).
    pub fn on_end(&mut self) {
        if self.state == SessionState::Established {
            self.state = SessionState::Closing;
        }
    }

    /// The terminal ACK for END has been observed.
    pub fn on_end_acked(&mut self) {
        if self.state == SessionState::Closing {
            self.state = SessionState::Closed;
        }
    }

    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Whether a DATA packet is meaningful in the current state.
    pub fn accepts_data(&self) -> bool {
        self.state == SessionState::Established
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_init() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Init);
        assert!(!session.accepts_data());
    }

    #[test]
    fn start_moves_to_established() {
        let mut session = Session::new();
        session.on_start();
        assert_eq!(session.state(), SessionState::Established);
        assert!(session.accepts_data());
    }

    #[test]
    fn duplicate_start_is_a_no_op() {
        let mut session = Session::new();
        session.on_start();
        session.on_start();
        assert_eq!(session.state(), SessionState::Established);
    }

    #[test]
    fn end_moves_to_closing_then_closed() {
        let mut session = Session::new();
        session.on_start();
        session.on_end();
        assert_eq!(session.state(), SessionState::Closing);
        assert!(!session.accepts_data());
        session.on_end_acked();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.is_closed());
    }

    #[test]
    fn end_before_start_is_ignored() {
        let mut session = Session::new();
        session.on_end();
        assert_eq!(session.state(), SessionState::Init);
    }

    #[test]
    fn end_acked_before_closing_is_ignored() {
        let mut session = Session::new();
        session.on_start();
        session.on_end_acked();
        assert_eq!(session.state(), SessionState::Established);
    }
}
