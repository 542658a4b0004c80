use chatsync_common::Service;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the operator console. Adapter faults inside the relay
/// loops never end up here; they drive supervisor transitions instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested session is not `Connected`.
    #[error("{service} session is not ready")]
    NotReady { service: Service },

    #[error(transparent)]
    Adapter(#[from] chatsync_channels::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn not_ready(service: Service) -> Self {
        Self::NotReady { service }
    }
}
