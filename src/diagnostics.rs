use crate::config::{Backend, Config};

/// Preflight checks for the selected backend and consent path. Prints every
/// failure with a remediation hint before bailing.
pub fn check(cfg: &Config) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.backend == Backend::Tpm {
        if !cfg!(feature = "tpm") {
            errors.push(
                "TPM backend requested but this build lacks TPM support\n  \
                 → rebuild with: cargo build --features tpm"
                    .to_string(),
            );
        }
        if let Err(e) = std::fs::OpenOptions::new().read(true).open(&cfg.tpm_device) {
            errors.push(format!(
                "cannot open {}: {e}\n  \
                 → add yourself to the 'tss' group: sudo usermod -aG tss $USER",
                cfg.tpm_device
            ));
        }
    }

    if !cfg.yes {
        if let Err(e) = std::process::Command::new(&cfg.pinentry)
            .arg("--version")
            .output()
        {
            errors.push(format!(
                "pinentry binary not found: '{}': {e}\n  \
                 → install pinentry, point --pinentry at it, or pass --yes",
                cfg.pinentry
            ));
        }
    }

    let timeout = cfg.timeout();
    if timeout < crate::config::MIN_TIMEOUT || timeout > crate::config::MAX_TIMEOUT {
        errors.push(format!(
            "--timeout-secs {} out of range\n  \
             → use {}..={} seconds",
            cfg.timeout_secs,
            crate::config::MIN_TIMEOUT.as_secs(),
            crate::config::MAX_TIMEOUT.as_secs()
        ));
    }

    if errors.is_empty() {
        return Ok(());
    }
    for err in &errors {
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}
