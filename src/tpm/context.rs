use std::sync::{Arc, Mutex};

use tss_esapi::handles::KeyHandle;
use tss_esapi::{Context, TctiNameConf};

use super::{TpmError, keys};

struct Shared {
    ctx: Mutex<Context>,
    primary: KeyHandle,
    device: String,
}

/// Shared handle to one TPM connection plus its storage primary key.
/// Clones share the connection; operations are serialized.
#[derive(Clone)]
pub struct TpmContext {
    shared: Arc<Shared>,
}

impl TpmContext {
    pub fn open(device: &str) -> Result<Self, TpmError> {
        let tcti = format!("device:{device}")
            .parse::<TctiNameConf>()
            .map_err(|e| TpmError::Context(e.to_string()))?;
        let mut ctx = Context::new(tcti).map_err(|e| TpmError::Context(e.to_string()))?;
        let primary = keys::create_primary(&mut ctx)?;
        tracing::debug!(device, "TPM storage primary created");
        Ok(Self {
            shared: Arc::new(Shared {
                ctx: Mutex::new(ctx),
                primary,
                device: device.to_string(),
            }),
        })
    }

    pub fn device(&self) -> &str {
        &self.shared.device
    }

    /// Run a synchronous TPM operation. Blocks; call from a blocking worker.
    pub fn with_ctx<F, T>(&self, f: F) -> Result<T, TpmError>
    where
        F: FnOnce(&mut Context, KeyHandle) -> Result<T, TpmError>,
    {
        let mut ctx = self
            .shared
            .ctx
            .lock()
            .map_err(|_| TpmError::Context("mutex poisoned".into()))?;
        f(&mut ctx, self.shared.primary)
    }
}

impl std::fmt::Debug for TpmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TpmContext")
            .field("device", &self.shared.device)
            .finish()
    }
}
