use super::types::LoginDetails;

/// Source of the current login, if any.
pub trait CredentialStore: Send + Sync {
  fn current(&self) -> Option<LoginDetails>;
}

/// Reads the login from `GZM_USERNAME` and `GZM_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
  fn current(&self) -> Option<LoginDetails> {
    let name = std::env::var("GZM_USERNAME").ok().filter(|v| !v.is_empty())?;
    let api_key = std::env::var("GZM_API_KEY").ok().filter(|v| !v.is_empty())?;
    Some(LoginDetails { name, api_key })
  }
}
