use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::remote::RemoteError;

/// Authenticated user context scoping every remote read and write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Account/session collaborator. `get_current_user` may answer with a bare
/// user object, a `{"user": ..}` wrapper, a `{"data": {"user": ..}}`
/// envelope, or nothing at all.
pub trait AuthProvider: Send + Sync {
    fn get_current_user(&self) -> Result<Option<Value>, RemoteError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<(), RemoteError>;
    fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError>;
    fn sign_out(&self) -> Result<(), RemoteError>;
}

/// Resolves the current identity for remote operations. Absence of a
/// session is a normal answer, never an error.
#[derive(Clone)]
pub struct SessionGate {
    auth: Arc<dyn AuthProvider>,
}

impl SessionGate {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        match self.auth.get_current_user() {
            Ok(Some(response)) => normalize_identity(&response),
            Ok(None) => None,
            Err(err) => {
                log::warn!("current user lookup failed: {err}");
                None
            }
        }
    }
}

/// Collapses every accepted response shape into one optional identity.
pub fn normalize_identity(response: &Value) -> Option<Identity> {
    let user = locate_user(response)?;
    let id = match user.get("id")? {
        Value::String(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    let email = user
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(Identity { id, email })
}

/// `data.user` wins over a top-level `user`, which wins over the bare object.
fn locate_user(response: &Value) -> Option<&Value> {
    let object = response.as_object()?;
    let enveloped = object.get("data").and_then(|data| data.get("user"));
    if let Some(user) = enveloped.filter(|user| user.is_object()) {
        return Some(user);
    }
    if let Some(user) = object.get("user").filter(|user| user.is_object()) {
        return Some(user);
    }
    object.contains_key("id").then_some(response)
}
