use {parley_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("session credential is empty")]
    EmptyCredential,

    #[error("authentication rejected")]
    AuthRejected,

    #[error("no credential candidate authenticated ({attempts} tried)")]
    AuthExhausted { attempts: usize },

    #[error("peer not found: {reference}")]
    PeerNotFound { reference: String },

    #[error("peer could not be resolved: {reference}")]
    PeerUnresolved { reference: String },

    #[error("session already closed")]
    SessionClosed,

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn peer_not_found(reference: impl Into<String>) -> Self {
        Self::PeerNotFound {
            reference: reference.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

parley_common::impl_context!();
