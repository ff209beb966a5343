use thiserror::Error;

/// Failures that stop the daemon
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Could not own {0}: another instance is running")]
    NameTaken(String),
}

impl BrokerError {
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NameTaken(_) => 2,
        }
    }
}

/// A method call the daemon refuses to handle, replied to the caller as a D-Bus error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("No player is being controlled by playerctld")]
    NoActivePlayer,
    #[error("This method is not valid")]
    InvalidMethod,
    #[error("Unknown property {0}")]
    UnknownProperty(String),
    #[error("Property {0} is read-only")]
    PropertyReadOnly(String),
    #[error("Unknown interface {0}")]
    UnknownInterface(String),
    #[error("Unknown method {0}")]
    UnknownMethod(String),
    #[error("Unknown object {0}")]
    UnknownObject(String),
    #[error("The active player does not implement {0}")]
    NotSupported(String),
    #[error("{0}")]
    InvalidArgs(String),
}

impl CallError {
    #[must_use]
    pub const fn error_name(&self) -> &'static str {
        match self {
            Self::NoActivePlayer => "com.github.altdesktop.playerctld.NoActivePlayer",
            Self::InvalidMethod => "com.github.altdesktop.playerctld.InvalidMethod",
            Self::UnknownProperty(_) => "org.freedesktop.DBus.Error.UnknownProperty",
            Self::PropertyReadOnly(_) => "org.freedesktop.DBus.Error.PropertyReadOnly",
            Self::UnknownInterface(_) => "org.freedesktop.DBus.Error.UnknownInterface",
            Self::UnknownMethod(_) => "org.freedesktop.DBus.Error.UnknownMethod",
            Self::UnknownObject(_) => "org.freedesktop.DBus.Error.UnknownObject",
            Self::NotSupported(_) => "org.freedesktop.DBus.Error.NotSupported",
            Self::InvalidArgs(_) => "org.freedesktop.DBus.Error.InvalidArgs",
        }
    }
}
