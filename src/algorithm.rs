use std::fmt;

/// COSE algorithm identifiers a relying party may request.
///
/// Only `Es256` has a key-support implementation; the other named values
/// exist so negotiation can log what was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    Es256,
    EdDsa,
    Es384,
    Es512,
    Ps256,
    Rs256,
    Other(i64),
}

impl CoseAlgorithm {
    pub fn value(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::Ps256 => -37,
            Self::Rs256 => -257,
            Self::Other(v) => v,
        }
    }
}

impl From<i64> for CoseAlgorithm {
    fn from(v: i64) -> Self {
        match v {
            -7 => Self::Es256,
            -8 => Self::EdDsa,
            -35 => Self::Es384,
            -36 => Self::Es512,
            -37 => Self::Ps256,
            -257 => Self::Rs256,
            other => Self::Other(other),
        }
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(alg: CoseAlgorithm) -> Self {
        alg.value()
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Es256 => write!(f, "ES256"),
            Self::EdDsa => write!(f, "EdDSA"),
            Self::Es384 => write!(f, "ES384"),
            Self::Es512 => write!(f, "ES512"),
            Self::Ps256 => write!(f, "PS256"),
            Self::Rs256 => write!(f, "RS256"),
            Self::Other(v) => write!(f, "COSE({v})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values_map_both_ways() {
        for alg in [
            CoseAlgorithm::Es256,
            CoseAlgorithm::EdDsa,
            CoseAlgorithm::Es384,
            CoseAlgorithm::Es512,
            CoseAlgorithm::Ps256,
            CoseAlgorithm::Rs256,
        ] {
            assert_eq!(CoseAlgorithm::from(alg.value()), alg);
        }
        assert_eq!(CoseAlgorithm::Es256.value(), -7);
    }

    #[test]
    fn test_unknown_value_is_preserved() {
        let alg = CoseAlgorithm::from(-65535);
        assert_eq!(alg, CoseAlgorithm::Other(-65535));
        assert_eq!(i64::from(alg), -65535);
        assert_eq!(alg.to_string(), "COSE(-65535)");
    }
}
