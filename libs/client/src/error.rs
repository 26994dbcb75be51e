use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building or caching per-cluster clients.
#[derive(Error, Debug)]
pub enum Error {
    #[error("kubeconfig is not valid: {0}")]
    InvalidKubeconfig(String),

    #[error("provider config must set exactly one credentials source, found {0}")]
    AmbiguousCredentialsSource(usize),

    #[error("failed to exchange credentials with {provider}: {message}")]
    CredentialExchange { provider: &'static str, message: String },

    #[error("{0} is not a valid EKS cluster ARN")]
    InvalidEksArn(String),

    #[error("failed to build client configuration: {0}")]
    Config(#[from] kube::config::InferConfigError),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}
