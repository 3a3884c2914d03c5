//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the gateway.  The config is stored as a
//! single postcard blob; the host build keeps it in an in-memory map.
//!
//! - Every save is range-checked by [`SystemConfig::validate`] first.
//! - A missing blob is not an error: `load` returns the defaults.
//! - ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
const CONFIG_NAMESPACE: &str = "meterlink";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "syscfg";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the single main-task context before any
            // concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Store raw bytes under the config key, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&self, bytes: &[u8]) {
        self.store.borrow_mut().insert(Self::composite_key(), bytes.to_vec());
    }

    fn decode(bytes: &[u8]) -> Result<SystemConfig, ConfigError> {
        let cfg: SystemConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        if let Err(e) = cfg.validate() {
            warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
            return Ok(SystemConfig::default());
        }
        Ok(cfg)
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(bytes) = self.store.borrow().get(&Self::composite_key()) {
                let cfg = Self::decode(bytes)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match NvsHandle::open(false).and_then(|h| h.read_blob()) {
                Ok(Some(bytes)) => {
                    let cfg = Self::decode(&bytes)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Ok(None) => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(SystemConfig::default())
                }
                Err(rc) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", rc);
                    Ok(SystemConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.put_raw(&bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            NvsHandle::open(true)
                .and_then(|h| h.write_blob(&bytes))
                .map_err(|rc| {
                    warn!("NvsAdapter: NVS write error {}", rc);
                    ConfigError::IoError
                })?;
            info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
            Ok(())
        }
    }
}

// ── ESP-IDF NVS handle ───────────────────────────────────────

/// Open handle on the config namespace; closed on drop.
#[cfg(target_os = "espidf")]
struct NvsHandle(nvs_handle_t);

#[cfg(target_os = "espidf")]
impl NvsHandle {
    const NAMESPACE: &'static [u8] = b"meterlink\0";
    const KEY: &'static [u8] = b"syscfg\0";

    fn open(write: bool) -> Result<Self, esp_err_t> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        // SAFETY: NAMESPACE is NUL-terminated; `handle` is a valid out-pointer.
        let rc = unsafe { nvs_open(Self::NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if rc == ESP_OK { Ok(Self(handle)) } else { Err(rc) }
    }

    /// `Ok(None)` when no blob has been stored yet.
    fn read_blob(&self) -> Result<Option<Vec<u8>>, esp_err_t> {
        let mut size: usize = 0;
        // SAFETY: a null buffer asks NVS for the stored length only.
        let rc = unsafe {
            nvs_get_blob(self.0, Self::KEY.as_ptr().cast(), core::ptr::null_mut(), &mut size)
        };
        if rc == ESP_ERR_NVS_NOT_FOUND {
            return Ok(None);
        }
        if rc != ESP_OK {
            return Err(rc);
        }
        if size == 0 || size > MAX_BLOB_SIZE {
            return Err(ESP_ERR_NVS_INVALID_LENGTH);
        }

        let mut buf = vec![0u8; size];
        // SAFETY: `buf` holds exactly `size` writable bytes.
        let rc = unsafe {
            nvs_get_blob(self.0, Self::KEY.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
        };
        if rc != ESP_OK {
            return Err(rc);
        }
        buf.truncate(size);
        Ok(Some(buf))
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<(), esp_err_t> {
        // SAFETY: `bytes` is valid for its length; NVS copies it.
        let rc = unsafe {
            nvs_set_blob(self.0, Self::KEY.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
        };
        if rc != ESP_OK {
            return Err(rc);
        }
        // SAFETY: handle was opened read-write.
        let rc = unsafe { nvs_commit(self.0) };
        if rc == ESP_OK { Ok(()) } else { Err(rc) }
    }
}

#[cfg(target_os = "espidf")]
impl Drop for NvsHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful nvs_open.
        unsafe { nvs_close(self.0) };
    }
}
