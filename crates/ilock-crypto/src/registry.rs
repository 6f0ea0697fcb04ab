//! Cipher/HSM registry: available vs. enabled providers
//!
//! [`RegistryBuilder`] is mutated only during startup. [`RegistryBuilder::build`]
//! freezes it into a [`Registry`] that is shared read-only (`Arc<Registry>`)
//! by every request task, so no locking is needed while serving.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cipher::{Cipher, CipherInfo};
use crate::error::{CipherError, RegistryError};
use crate::hsm::{Hsm, HsmBinding, HsmRole};
use crate::xchacha::XChaCha20Cipher;
use ilock_core::config::{CryptoConfig, HSM_OFF};

#[derive(Default)]
pub struct RegistryBuilder {
    available: HashMap<String, Arc<dyn Cipher>>,
    enabled: BTreeMap<String, Arc<dyn Cipher>>,
    hsms: HashMap<String, Arc<dyn Hsm>>,
    auth_hsm: Option<HsmBinding>,
    tls_hsm: Option<HsmBinding>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pre-loaded with the ciphers compiled into this crate
    pub fn with_builtins() -> Self {
        let mut builder = Self::new();
        builder.register_cipher(Arc::new(XChaCha20Cipher::new()));
        builder
    }

    /// Add a provider to the available set. A later registration under the
    /// same name replaces the earlier one.
    pub fn register_cipher(&mut self, cipher: Arc<dyn Cipher>) -> &mut Self {
        let name = cipher.info().name;
        if self.available.insert(name.clone(), cipher).is_some() {
            debug!(cipher = %name, "cipher re-registered, previous provider replaced");
        }
        self
    }

    /// Add an HSM driver under `model`, replacing any earlier one.
    pub fn register_hsm(&mut self, model: impl Into<String>, hsm: Arc<dyn Hsm>) -> &mut Self {
        self.hsms.insert(model.into(), hsm);
        self
    }

    /// Enable the named ciphers. Every name must be available; on the first
    /// miss nothing is enabled and the error lists the supported names.
    pub fn enable_ciphers(&mut self, names: &[String]) -> Result<(), RegistryError> {
        if names.is_empty() {
            return Err(RegistryError::MissingCipherSpec {
                available: self.available_cipher_names(),
            });
        }

        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            match self.available.get(name) {
                Some(cipher) => selected.push((name.clone(), cipher.clone())),
                None => {
                    return Err(RegistryError::UnknownCipher {
                        name: name.clone(),
                        available: self.available_cipher_names(),
                    })
                }
            }
        }

        for (name, cipher) in selected {
            info!(cipher = %name, "cipher enabled");
            self.enabled.insert(name, cipher);
        }
        Ok(())
    }

    /// Apply an HSM directive of the form `model:opt[,opt...]`, or `off`.
    pub fn enable_hsm(&mut self, directive: &str) -> Result<(), RegistryError> {
        if directive == HSM_OFF {
            return Ok(());
        }

        let (model, options) = directive
            .split_once(':')
            .ok_or_else(|| RegistryError::MalformedHsmDirective(directive.to_string()))?;

        let prototype = self
            .hsms
            .get(model)
            .ok_or_else(|| RegistryError::UnknownHsmModel {
                model: model.to_string(),
                available: self.available_hsm_models(),
            })?;

        let options: Vec<&str> = options.split(',').collect();
        let roles = options
            .iter()
            .map(|opt| HsmRole::parse(opt).ok_or_else(|| RegistryError::UnknownHsmOption(opt.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        info!(model = %model, options = ?options, "enabling HSM");

        // One instance per directive, shared by all of its roles
        let binding = HsmBinding {
            model: model.to_string(),
            hsm: prototype.fresh(),
        };

        for role in roles {
            match role {
                HsmRole::Auth => {
                    if let Some(prev) = self.auth_hsm.replace(binding.clone()) {
                        debug!(previous = %prev.model, "auth role rebound");
                    }
                }
                HsmRole::Tls => {
                    if let Some(prev) = self.tls_hsm.replace(binding.clone()) {
                        debug!(previous = %prev.model, "tls role rebound");
                    }
                }
                HsmRole::Cipher => {
                    let cipher: Arc<dyn Cipher> =
                        Arc::from(binding.hsm.cipher().map_err(|source| {
                            RegistryError::HsmCipher {
                                model: model.to_string(),
                                source,
                            }
                        })?);
                    let name = cipher.info().name;
                    self.register_cipher(cipher.clone());
                    info!(cipher = %name, model = %model, "HSM cipher enabled");
                    self.enabled.insert(name, cipher);
                }
            }
        }

        Ok(())
    }

    pub fn available_cipher_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.available.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn available_hsm_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.hsms.keys().cloned().collect();
        models.sort();
        models
    }

    /// Startup sequence: enable the configured ciphers, apply the HSM
    /// directive, then freeze.
    pub fn initialize(mut self, config: &CryptoConfig) -> Result<Registry, RegistryError> {
        self.enable_ciphers(&config.ciphers)?;
        self.enable_hsm(&config.hsm)?;
        Ok(self.build())
    }

    /// Freeze the registry for serving.
    pub fn build(self) -> Registry {
        let mut by_extension = HashMap::new();
        for (name, cipher) in &self.enabled {
            let ext = cipher.info().extension;
            if ext.is_empty() {
                continue;
            }
            // BTreeMap order: the alphabetically first name keeps the extension
            if let Some(owner) = by_extension.get(&ext) {
                warn!(extension = %ext, owner = %owner, ignored = %name, "duplicate cipher extension");
                continue;
            }
            by_extension.insert(ext, name.clone());
        }

        Registry {
            available: self.available,
            enabled: self.enabled,
            by_extension,
            auth_hsm: self.auth_hsm,
            tls_hsm: self.tls_hsm,
        }
    }
}

/// Immutable provider registry shared by all request handlers
pub struct Registry {
    available: HashMap<String, Arc<dyn Cipher>>,
    enabled: BTreeMap<String, Arc<dyn Cipher>>,
    by_extension: HashMap<String, String>,
    auth_hsm: Option<HsmBinding>,
    tls_hsm: Option<HsmBinding>,
}

impl Registry {
    /// Fresh instance of an enabled cipher.
    pub fn lookup_enabled(&self, name: &str) -> Result<Box<dyn Cipher>, CipherError> {
        self.enabled
            .get(name)
            .map(|c| c.fresh())
            .ok_or_else(|| CipherError::UnknownCipher(name.to_string()))
    }

    /// Fresh instance of the enabled cipher owning file extension `ext`.
    pub fn lookup_enabled_by_extension(&self, ext: &str) -> Result<Box<dyn Cipher>, CipherError> {
        let ext = ext.trim_start_matches('.');
        self.by_extension
            .get(ext)
            .and_then(|name| self.enabled.get(name))
            .map(|c| c.fresh())
            .ok_or_else(|| CipherError::UnknownCipher(format!(".{ext}")))
    }

    /// Fresh instance of any registered cipher, enabled or not.
    pub fn lookup_available(&self, name: &str) -> Result<Box<dyn Cipher>, CipherError> {
        self.available
            .get(name)
            .map(|c| c.fresh())
            .ok_or_else(|| CipherError::UnknownCipher(name.to_string()))
    }

    /// Toggle activation on every enabled cipher. Failures are logged and
    /// returned; they never stop the remaining providers from being toggled.
    pub fn activate_all(&self, on: bool) -> Vec<(String, CipherError)> {
        let mut failures = Vec::new();
        for (name, cipher) in &self.enabled {
            if let Err(e) = cipher.activate(on) {
                warn!(cipher = %name, activate = on, "cipher activation failed: {e}");
                failures.push((name.clone(), e));
            }
        }
        failures
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains_key(name)
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    /// Enabled cipher descriptions, sorted by name
    pub fn enabled_info(&self) -> Vec<CipherInfo> {
        self.enabled.values().map(|c| c.info()).collect()
    }

    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled.keys().cloned().collect()
    }

    pub fn auth_hsm(&self) -> Option<&HsmBinding> {
        self.auth_hsm.as_ref()
    }

    pub fn tls_hsm(&self) -> Option<&HsmBinding> {
        self.tls_hsm.as_ref()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut available: Vec<&String> = self.available.keys().collect();
        available.sort();
        f.debug_struct("Registry")
            .field("available", &available)
            .field("enabled", &self.enabled.keys().collect::<Vec<_>>())
            .field("auth_hsm", &self.auth_hsm)
            .field("tls_hsm", &self.tls_hsm)
            .finish()
    }
}
