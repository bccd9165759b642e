use thiserror::Error;

/// Broad failure categories. Each maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable/unparseable input, bad arguments, artifact I/O.
    Input,
    /// No usable rows remain after cleaning/combination.
    EmptyDataset,
    /// A scaler or classifier was used before it was fitted.
    NotFitted,
    /// Feature names/order at transform time differ from fit time.
    FeatureMismatch,
    /// Non-finite values or an impossible fold layout.
    Numeric,
    /// Broken internal invariant (e.g. illegal CV phase transition).
    Internal,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Input => 2,
            ErrorKind::EmptyDataset => 3,
            ErrorKind::NotFitted | ErrorKind::FeatureMismatch | ErrorKind::Numeric | ErrorKind::Internal => 4,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyDataset, message)
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Numeric, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}
