use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Streaming,
    Finalizing,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Finalizing => "finalizing",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Created, SessionStatus::Streaming)
                | (SessionStatus::Created, SessionStatus::Finalizing)
                | (SessionStatus::Streaming, SessionStatus::Finalizing)
                | (SessionStatus::Finalizing, SessionStatus::Closed)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
