//! Client-level configuration (§11.3), mirroring
//! `rbp_engine::config`'s plain-struct-with-`Default` style.

use rbp_engine::{EngineConfig, ReliabilityConfig};
use rbp_proto::RbpVersion;

use crate::uri::ClientUri;

/// Everything needed to construct one [`crate::client::RbpClient`]: where to
/// connect, which protocol version to speak, and the engine/reliability
/// tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target endpoint, already parsed.
    pub uri: ClientUri,
    /// Protocol version to speak; must agree with `reliability.is_some()`.
    pub version: RbpVersion,
    /// Transaction staging/validation tunables.
    pub engine: EngineConfig,
    /// Recovery tunables; required for v2.0, absent for v1.x.
    pub reliability: Option<ReliabilityConfig>,
}

impl ClientConfig {
    /// Parse `uri` and derive `version`/`reliability` from the client
    /// factory's descriptor for its protocol tag.
    ///
    /// # Errors
    ///
    /// `ClientError::MalformedUri` or `ClientError::UnknownProtocol`.
    pub fn from_uri(
        uri: &str,
        factory: &crate::factory::ClientFactory,
        engine: EngineConfig,
        reliability: ReliabilityConfig,
    ) -> Result<Self, crate::error::ClientError> {
        let uri = ClientUri::parse(uri)?;
        let descriptor = factory.resolve(&uri)?;
        let reliability = descriptor.version.has_packet_header().then_some(reliability);
        Ok(Self { uri, version: descriptor.version, engine, reliability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ClientFactory;

    #[test]
    fn v1_tag_carries_no_reliability_config() {
        let factory = ClientFactory::with_standard_protocols();
        let config = ClientConfig::from_uri(
            "ipbusudp-1.3://fpga0:50001/board.xml",
            &factory,
            EngineConfig::default(),
            ReliabilityConfig::default(),
        )
        .unwrap();
        assert_eq!(config.version, RbpVersion::V1);
        assert!(config.reliability.is_none());
    }

    #[test]
    fn v2_tag_carries_a_reliability_config() {
        let factory = ClientFactory::with_standard_protocols();
        let config = ClientConfig::from_uri(
            "ipbusudp-2.0://fpga0:50001/board.xml",
            &factory,
            EngineConfig::default(),
            ReliabilityConfig::default(),
        )
        .unwrap();
        assert_eq!(config.version, RbpVersion::V2);
        assert!(config.reliability.is_some());
    }
}
