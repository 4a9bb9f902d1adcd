use ciborium::value::Value;

use super::types::AuthenticatorError;
use crate::algorithm::CoseAlgorithm;

/// Build a "packed" self-attestation object: the credential key signed its
/// own registration, so `attStmt` carries no certificate chain.
pub(crate) fn build_attestation_object(
    auth_data: &[u8],
    alg: CoseAlgorithm,
    der_sig: &[u8],
) -> Result<Vec<u8>, AuthenticatorError> {
    let map = Value::Map(vec![
        (Value::Text("fmt".to_string()), Value::Text("packed".to_string())),
        (
            Value::Text("attStmt".to_string()),
            Value::Map(vec![
                (
                    Value::Text("alg".to_string()),
                    Value::Integer(alg.value().into()),
                ),
                (
                    Value::Text("sig".to_string()),
                    Value::Bytes(der_sig.to_vec()),
                ),
            ]),
        ),
        (
            Value::Text("authData".to_string()),
            Value::Bytes(auth_data.to_vec()),
        ),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).map_err(|e| AuthenticatorError::Internal(e.to_string()))?;
    Ok(buf)
}
