use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EconomyError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Ambiguous(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Insufficient balance: have {balance}, need {price}")]
    InsufficientBalance { balance: i64, price: i64 },

    #[error("On cooldown: {days_left} day(s) left")]
    OnCooldown { days_left: i64 },

    #[error("Daily hard cap exceeded: {total_today} + {duration} > {cap} minutes")]
    HardCapExceeded {
        total_today: u32,
        duration: u32,
        cap: u32,
    },

    #[error("Session too short: {0}")]
    SessionTooShort(String),

    #[error("A session is already active (started {started_at})")]
    SessionAlreadyActive { started_at: String },

    #[error("Invalid ledger entry: {0}")]
    InvalidEntry(String),

    #[error("{0}")]
    PersistenceFailure(String),
}

impl EconomyError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::PersistenceFailure(message.into())
    }

    /// Process exit code reported by the CLI for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::SessionTooShort(_) => 2,
            Self::NotFound(_) | Self::DomainNotFound(_) => 3,
            Self::Ambiguous(_) => 4,
            Self::PersistenceFailure(_) => 5,
            Self::InsufficientBalance { .. }
            | Self::OnCooldown { .. }
            | Self::HardCapExceeded { .. }
            | Self::SessionAlreadyActive { .. }
            | Self::InvalidEntry(_) => 6,
            Self::InvalidFormat(_) => 7,
        }
    }

    /// Stable machine-readable name, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::NotFound(_) => "not_found",
            Self::Ambiguous(_) => "ambiguous",
            Self::DomainNotFound(_) => "domain_not_found",
            Self::InvalidFormat(_) => "invalid_format",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::OnCooldown { .. } => "on_cooldown",
            Self::HardCapExceeded { .. } => "hard_cap_exceeded",
            Self::SessionTooShort(_) => "session_too_short",
            Self::SessionAlreadyActive { .. } => "session_already_active",
            Self::InvalidEntry(_) => "invalid_entry",
            Self::PersistenceFailure(_) => "persistence_failure",
        }
    }
}
