use std::time::Duration;

pub const AAGUID: [u8; 16] = [
    0x7a, 0x1e, 0x55, 0x0b, 0x3c, 0x42, 0x4f, 0x19, 0x9d, 0x61, 0x2e, 0x80, 0x5a, 0xc4, 0x00, 0x01,
];
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where credential keys live.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process P-256 keys; lost on exit.
    Soft,
    /// TPM 2.0 wrapped keys (requires the `tpm` feature).
    Tpm,
}

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about = "Register and assert a WebAuthn credential against a local key store")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[arg(long, value_enum, default_value = "soft")]
    pub backend: Backend,
    #[arg(long, default_value = "/dev/tpmrm0")]
    pub tpm_device: String,
    #[arg(long, default_value = "0x01800100")]
    pub nv_index: String,
    #[arg(long, default_value = "pinentry")]
    pub pinentry: String,
    /// Approve every prompt without asking.
    #[arg(long)]
    pub yes: bool,
    #[arg(long, default_value = "example.org")]
    pub rp_id: String,
    /// User handle to register.
    #[arg(long, default_value = "user")]
    pub user: String,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Delete the credential-identifier key, invalidating every issued credential, then exit.
    #[arg(long)]
    pub rotate_key: bool,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
