use tss_esapi::Context;
use tss_esapi::attributes::NvIndexAttributesBuilder;
use tss_esapi::constants::{CapabilityType, NvIndexType};
use tss_esapi::handles::{NvIndexHandle, NvIndexTpmHandle, TpmHandle};
use tss_esapi::interface_types::algorithm::HashingAlgorithm;
use tss_esapi::interface_types::resource_handles::{NvAuth, Provision};
use tss_esapi::structures::{CapabilityData, NvPublicBuilder};

use super::{TpmContext, TpmError};
use crate::counter::SignCounter;
use crate::keystore::KeyStoreError;

fn counter_err(e: impl std::fmt::Display) -> TpmError {
    TpmError::Counter(e.to_string())
}

/// Parse an NV index given as hex, with or without `0x`.
pub fn parse_nv_index(s: &str) -> Result<u32, TpmError> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| TpmError::Counter(format!("NV index {s:?}: {e}")))
}

fn nv_handle(ctx: &mut Context, nv_index: u32) -> Result<NvIndexHandle, TpmError> {
    let tpm_handle = NvIndexTpmHandle::new(nv_index).map_err(counter_err)?;
    let obj = ctx
        .tr_from_tpm_public(TpmHandle::NvIndex(tpm_handle))
        .map_err(counter_err)?;
    Ok(NvIndexHandle::from(obj))
}

/// Query the handle capability rather than reading the index, which would
/// log a TPM error when it is absent.
fn exists(ctx: &mut Context, nv_index: u32) -> Result<bool, TpmError> {
    let target = TpmHandle::NvIndex(NvIndexTpmHandle::new(nv_index).map_err(counter_err)?);
    let (data, _) = ctx
        .get_capability(CapabilityType::Handles, nv_index, 1)
        .map_err(counter_err)?;
    Ok(matches!(data, CapabilityData::Handles(handles) if handles.as_ref().contains(&target)))
}

/// Define the NV counter if it is missing. Idempotent.
pub fn ensure_counter(ctx: &mut Context, nv_index: u32) -> Result<(), TpmError> {
    if exists(ctx, nv_index)? {
        return Ok(());
    }
    let attrs = NvIndexAttributesBuilder::new()
        .with_nv_index_type(NvIndexType::Counter)
        .with_owner_write(true)
        .with_owner_read(true)
        .with_no_da(true)
        .build()
        .map_err(counter_err)?;
    let public = NvPublicBuilder::new()
        .with_nv_index(NvIndexTpmHandle::new(nv_index).map_err(counter_err)?)
        .with_index_name_algorithm(HashingAlgorithm::Sha256)
        .with_index_attributes(attrs)
        .with_data_area_size(8)
        .build()
        .map_err(counter_err)?;
    ctx.execute_with_nullauth_session(|ctx| ctx.nv_define_space(Provision::Owner, None, public))
        .map_err(|e: tss_esapi::Error| counter_err(e))?;

    // A counter index is unreadable until its first increment.
    increment(ctx, nv_index)?;
    tracing::info!(index = format!("{nv_index:#010x}"), "NV counter defined");
    Ok(())
}

fn increment(ctx: &mut Context, nv_index: u32) -> Result<(), TpmError> {
    let handle = nv_handle(ctx, nv_index)?;
    ctx.execute_with_nullauth_session(|ctx| ctx.nv_increment(NvAuth::Owner, handle))
        .map_err(|e: tss_esapi::Error| counter_err(e))
}

pub fn read_counter(ctx: &mut Context, nv_index: u32) -> Result<u64, TpmError> {
    let handle = nv_handle(ctx, nv_index)?;
    let buf = ctx
        .execute_with_nullauth_session(|ctx| ctx.nv_read(NvAuth::Owner, handle, 8, 0))
        .map_err(|e: tss_esapi::Error| counter_err(e))?;
    let bytes: [u8; 8] = buf
        .value()
        .try_into()
        .map_err(|_| TpmError::Counter("counter read returned wrong size".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn increment_and_read(ctx: &mut Context, nv_index: u32) -> Result<u64, TpmError> {
    increment(ctx, nv_index)?;
    read_counter(ctx, nv_index)
}

/// One persistent monotonic counter shared by every credential. Survives
/// restarts, so values never repeat for a relying party.
#[derive(Debug, Clone)]
pub struct TpmCounter {
    tpm: TpmContext,
    nv_index: u32,
}

impl TpmCounter {
    /// Open the counter at `nv_index`, defining it on first use.
    pub fn open(tpm: TpmContext, nv_index: u32) -> Result<Self, TpmError> {
        tpm.with_ctx(|ctx, _| ensure_counter(ctx, nv_index))?;
        Ok(Self { tpm, nv_index })
    }
}

impl SignCounter for TpmCounter {
    fn next(&self, label: &str, floor: u32) -> Result<u32, KeyStoreError> {
        let value = self
            .tpm
            .with_ctx(|ctx, _| increment_and_read(ctx, self.nv_index))?;
        let value = u32::try_from(value)
            .map_err(|_| KeyStoreError::Sign(format!("NV counter overflowed u32: {value}")))?;
        if value <= floor {
            return Err(KeyStoreError::Sign(format!(
                "NV counter {value} not above credential floor {floor}"
            )));
        }
        tracing::debug!(label, count = value, "NV counter incremented");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_nv_index;

    #[test]
    fn test_parse_nv_index() {
        assert_eq!(parse_nv_index("0x01800100").unwrap(), 0x0180_0100);
        assert_eq!(parse_nv_index("1800101").unwrap(), 0x0180_0101);
        assert!(parse_nv_index("0xzz").is_err());
    }
}
