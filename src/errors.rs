use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("property {property} has not been populated by a refresh")]
    PropertyNotFound { property: String },
    #[error("bus communication failed: {message}")]
    Communication { message: String },
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },
}

impl Error {
    pub fn property_not_found(property: impl Into<String>) -> Self {
        Self::PropertyNotFound {
            property: property.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// True for transport-level failures, as opposed to local conditions a
    /// caller can handle without touching the bus again.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. })
    }
}

impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Self::communication(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn communication_is_classified() {
        assert!(Error::communication("timeout").is_communication());
        assert!(!Error::property_not_found("ActiveState").is_communication());
    }

    #[test]
    fn messages_name_the_subject() {
        let err = Error::property_not_found("SubState");
        assert!(err.to_string().contains("SubState"));

        let err = Error::unsupported("SetProperties");
        assert!(err.to_string().contains("SetProperties"));
    }
}
