//! Biometric channels and bundles.
//!
//! A bundle maps each capture channel to the digest produced by the capture
//! device. Raw biometric samples never enter the core; only device digests do.
//! Digests are zeroized on drop.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{IdentityError, Result};

/// Maximum length of a single biometric digest in bytes.
pub const MAX_DIGEST_LEN: usize = 128;

/// A biometric capture channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BiometricChannel {
    /// Fingerprint minutiae digest.
    Fingerprint,
    /// Iris code digest.
    Iris,
    /// Face embedding digest.
    Face,
    /// Voice print digest.
    Voice,
    /// Behavioral pattern digest (typing cadence, gait).
    BehavioralPattern,
}

impl BiometricChannel {
    /// All known channels.
    pub const ALL: [BiometricChannel; 5] = [
        BiometricChannel::Fingerprint,
        BiometricChannel::Iris,
        BiometricChannel::Face,
        BiometricChannel::Voice,
        BiometricChannel::BehavioralPattern,
    ];

    /// Wire name of the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            BiometricChannel::Fingerprint => "fingerprint",
            BiometricChannel::Iris => "iris",
            BiometricChannel::Face => "face",
            BiometricChannel::Voice => "voice",
            BiometricChannel::BehavioralPattern => "behavioral-pattern",
        }
    }
}

impl fmt::Display for BiometricChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiometricChannel {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        BiometricChannel::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| IdentityError::UnknownChannel(s.to_string()))
    }
}

/// Digest produced by a capture device for one channel.
///
/// Serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BiometricDigest(Vec<u8>);

impl BiometricDigest {
    /// Wrap digest bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDigest` if the digest exceeds [`MAX_DIGEST_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_DIGEST_LEN {
            return Err(IdentityError::InvalidDigest {
                channel: "unknown".into(),
                reason: format!("{} bytes exceeds maximum of {}", bytes.len(), MAX_DIGEST_LEN),
            });
        }
        Ok(Self(bytes))
    }

    /// Parse a digest from hex.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDigest` for malformed hex or an oversized digest.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| IdentityError::InvalidDigest {
            channel: "unknown".into(),
            reason: e.to_string(),
        })?;
        Self::new(bytes)
    }

    /// Digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the digest carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BiometricDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BiometricDigest({} bytes)", self.0.len())
    }
}

impl Serialize for BiometricDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BiometricDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Set of biometric digests keyed by channel.
///
/// On the wire this is a JSON object `{ "iris": "<hex>", ... }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiometricBundle {
    entries: BTreeMap<BiometricChannel, BiometricDigest>,
}

impl BiometricBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel digest, returning the bundle.
    #[must_use]
    pub fn with(mut self, channel: BiometricChannel, digest: BiometricDigest) -> Self {
        self.insert(channel, digest);
        self
    }

    /// Add raw digest bytes for a channel.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDigest` if the digest is oversized.
    pub fn with_bytes(self, channel: BiometricChannel, bytes: &[u8]) -> Result<Self> {
        let digest = BiometricDigest::new(bytes).map_err(|e| with_channel(e, channel))?;
        Ok(self.with(channel, digest))
    }

    /// Insert or replace a channel digest.
    pub fn insert(&mut self, channel: BiometricChannel, digest: BiometricDigest) {
        self.entries.insert(channel, digest);
    }

    /// Digest for a channel, if present.
    pub fn get(&self, channel: BiometricChannel) -> Option<&BiometricDigest> {
        self.entries.get(&channel)
    }

    /// Number of channels present, populated or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bundle has no channels.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of channels carrying a non-empty digest.
    pub fn populated_layers(&self) -> usize {
        self.entries.values().filter(|d| !d.is_empty()).count()
    }

    /// Populated entries sorted lexicographically by channel name.
    pub fn canonical_entries(&self) -> Vec<(BiometricChannel, &BiometricDigest)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, d)| !d.is_empty())
            .map(|(c, d)| (*c, d))
            .collect();
        entries.sort_by_key(|(c, _)| c.as_str());
        entries
    }

    /// Channels present in the bundle.
    pub fn channels(&self) -> impl Iterator<Item = BiometricChannel> + '_ {
        self.entries.keys().copied()
    }
}

impl FromIterator<(BiometricChannel, BiometricDigest)> for BiometricBundle {
    fn from_iter<I: IntoIterator<Item = (BiometricChannel, BiometricDigest)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn with_channel(err: IdentityError, channel: BiometricChannel) -> IdentityError {
    match err {
        IdentityError::InvalidDigest { reason, .. } => IdentityError::InvalidDigest {
            channel: channel.to_string(),
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(byte: u8, len: usize) -> BiometricDigest {
        BiometricDigest::new(vec![byte; len]).unwrap()
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(BiometricChannel::BehavioralPattern.as_str(), "behavioral-pattern");
        assert_eq!(
            "behavioral_pattern".parse::<BiometricChannel>().unwrap(),
            BiometricChannel::BehavioralPattern
        );
        assert_eq!("IRIS".parse::<BiometricChannel>().unwrap(), BiometricChannel::Iris);
        assert!(matches!(
            "retina".parse::<BiometricChannel>(),
            Err(IdentityError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_digest_length_limit() {
        assert!(BiometricDigest::new(vec![0u8; MAX_DIGEST_LEN]).is_ok());
        assert!(matches!(
            BiometricDigest::new(vec![0u8; MAX_DIGEST_LEN + 1]),
            Err(IdentityError::InvalidDigest { .. })
        ));
    }

    #[test]
    fn test_oversized_digest_names_channel() {
        let err = BiometricBundle::new()
            .with_bytes(BiometricChannel::Voice, &[0u8; 200])
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidDigest { channel, .. } if channel == "voice"));
    }

    #[test]
    fn test_empty_digest_not_populated() {
        let bundle = BiometricBundle::new()
            .with(BiometricChannel::Iris, digest(1, 32))
            .with(BiometricChannel::Face, digest(2, 0));
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.populated_layers(), 1);
        assert_eq!(bundle.canonical_entries().len(), 1);
    }

    #[test]
    fn test_canonical_order_is_by_name() {
        let bundle = BiometricBundle::new()
            .with(BiometricChannel::Voice, digest(1, 8))
            .with(BiometricChannel::BehavioralPattern, digest(2, 8))
            .with(BiometricChannel::Fingerprint, digest(3, 8))
            .with(BiometricChannel::Iris, digest(4, 8))
            .with(BiometricChannel::Face, digest(5, 8));
        let names: Vec<_> = bundle
            .canonical_entries()
            .into_iter()
            .map(|(c, _)| c.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["behavioral-pattern", "face", "fingerprint", "iris", "voice"]
        );
    }

    #[test]
    fn test_bundle_json_shape() {
        let bundle = BiometricBundle::new()
            .with(BiometricChannel::Iris, digest(0xab, 2))
            .with(BiometricChannel::BehavioralPattern, digest(0x01, 1));
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(json, r#"{"iris":"abab","behavioral-pattern":"01"}"#);

        let back: BiometricBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
    }

    #[test]
    fn test_bundle_json_rejects_bad_hex() {
        let result: std::result::Result<BiometricBundle, _> =
            serde_json::from_str(r#"{"iris":"zz"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_digest_debug_hides_bytes() {
        let d = digest(0x42, 4);
        assert_eq!(format!("{:?}", d), "BiometricDigest(4 bytes)");
    }
}
