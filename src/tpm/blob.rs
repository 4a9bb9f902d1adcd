use super::TpmError;

/// A TPM object wrapped by the storage primary: the encrypted private area
/// and the marshalled public area. Only the TPM that created it can load it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlob {
    pub private: Vec<u8>,
    pub public: Vec<u8>,
}

impl KeyBlob {
    /// `private_len (BE u32) || private || public`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.private.len() + self.public.len());
        out.extend_from_slice(&(self.private.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.private);
        out.extend_from_slice(&self.public);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TpmError> {
        let (len, rest) = bytes
            .split_first_chunk::<4>()
            .ok_or_else(|| TpmError::Blob("truncated header".into()))?;
        let private_len = u32::from_be_bytes(*len) as usize;
        if rest.len() < private_len {
            return Err(TpmError::Blob(format!(
                "private section truncated: want {private_len}, have {}",
                rest.len()
            )));
        }
        let (private, public) = rest.split_at(private_len);
        if public.is_empty() {
            return Err(TpmError::Blob("missing public section".into()));
        }
        Ok(Self {
            private: private.to_vec(),
            public: public.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_layout() {
        let blob = KeyBlob {
            private: vec![1, 2, 3],
            public: vec![9, 8],
        };
        let bytes = blob.to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 3, 1, 2, 3, 9, 8]);
        assert_eq!(KeyBlob::from_bytes(&bytes).unwrap(), blob);
    }

    #[test]
    fn test_truncated_blobs_rejected() {
        assert!(KeyBlob::from_bytes(&[0, 0]).is_err());
        assert!(KeyBlob::from_bytes(&[0, 0, 0, 9, 1, 2]).is_err());
        assert!(KeyBlob::from_bytes(&[0, 0, 0, 1, 1]).is_err());
    }
}
