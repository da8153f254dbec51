use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

pub trait CredentialStore: Send + Sync {
    fn save_public_key(&self, public_key: &str) -> Result<(), InfraError>;
    fn load_public_key(&self) -> Result<Option<String>, InfraError>;
    fn delete_public_key(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("taskflow.record-store", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_public_key(&self, public_key: &str) -> Result<(), InfraError> {
        let public_key = public_key.trim();
        if public_key.is_empty() {
            return Err(InfraError::Credential("public key must not be empty".to_string()));
        }
        self.entry()?
            .set_password(public_key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_public_key(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value).filter(|value| !value.trim().is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_public_key(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    public_key: Mutex<Option<String>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_public_key(&self, public_key: &str) -> Result<(), InfraError> {
        let mut guard = self
            .public_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(public_key.trim().to_string());
        Ok(())
    }

    fn load_public_key(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .public_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_public_key(&self) -> Result<(), InfraError> {
        let mut guard = self
            .public_key
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
