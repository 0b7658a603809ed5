use std::collections::BTreeMap;

use ethereum_types::{H256, U256};
use hex_literal::hex;
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::genesis::{GenesisSeed, default_genesis_block};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl Network {
    pub fn id(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        }
    }
}

/// Soft-fork deployments signaled through version bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPos {
    TestDummy = 0,
    Csv = 1,
    Segwit = 2,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Deployment {
    /// Version bit reserved for this deployment.
    pub bit: u8,
    /// Start of the signaling period (unix time).
    pub start_time: u64,
    /// Deadline for lock-in (unix time).
    pub timeout: u64,
}

/// Consensus-critical constants of one network.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
    pub pow_limit: U256,
    pub pos_limit: U256,
    /// Retarget interval, seconds.
    pub target_timespan: u32,
    /// Target block spacing, seconds.
    pub target_spacing: u32,
    pub pow_allow_min_difficulty_blocks: bool,
    pub pow_no_retargeting: bool,
    pub majority_enforce_block_upgrade: u32,
    pub majority_reject_block_outdated: u32,
    pub majority_window: u32,
    /// BIP34 activation height; negative when never locked in.
    pub bip34_height: i64,
    pub bip34_hash: H256,
    /// Blocks that must signal within a window to lock a rule change in.
    pub rule_change_activation_threshold: u32,
    pub miner_confirmation_window: u32,
    pub deployments: [Deployment; 3],
}

/// Everything a node needs to know about one network: wire magic, ports,
/// address prefixes, consensus constants, the genesis block and the
/// checkpoint map. Built by value and passed by reference; there is no
/// process-global parameter set.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,
    pub message_start: [u8; 4],
    pub default_port: u16,
    pub prune_after_height: u64,
    pub base58_pubkey_prefix: Vec<u8>,
    pub base58_script_prefix: Vec<u8>,
    pub base58_secret_prefix: Vec<u8>,
    pub base58_ext_public_prefix: Vec<u8>,
    pub base58_ext_secret_prefix: Vec<u8>,
    pub consensus: ConsensusParams,
    pub genesis: Block,
    pub genesis_hash: H256,
    pub dns_seeds: Vec<&'static str>,
    pub checkpoints: BTreeMap<u32, H256>,
    /// Height of the last proof-of-work block; staking takes over after.
    pub last_pow_block: u32,
    pub mining_requires_peers: bool,
    pub default_consistency_checks: bool,
    pub require_standard: bool,
    pub mine_blocks_on_demand: bool,
}

// The sub-1 difficulty ceiling shared by main and test.
fn pow_limit_low() -> U256 {
    U256::from_big_endian(&hex!(
        "0000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    ))
}

fn pow_limit_regtest() -> U256 {
    U256::from_big_endian(&hex!(
        "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
    ))
}

impl ChainParams {
    pub fn new(network: Network) -> Self {
        match network {
            Network::Main => Self::main(),
            Network::Test => Self::test(),
            Network::Regtest => Self::regtest(),
        }
    }

    fn main() -> Self {
        let genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 1575083623,
            bits: 0x1f00ffff,
        });
        let genesis_hash = genesis.header.hash();
        Self {
            network: Network::Main,
            message_start: [0xf9, 0xbe, 0xb4, 0xd9],
            default_port: 8889,
            prune_after_height: 100_000,
            base58_pubkey_prefix: vec![0],
            base58_script_prefix: vec![5],
            base58_secret_prefix: vec![128],
            base58_ext_public_prefix: vec![0x04, 0x88, 0xb2, 0x1e],
            base58_ext_secret_prefix: vec![0x04, 0x88, 0xad, 0xe4],
            consensus: ConsensusParams {
                pow_limit: pow_limit_low(),
                pos_limit: pow_limit_low(),
                target_timespan: 16 * 60,
                target_spacing: 64,
                pow_allow_min_difficulty_blocks: false,
                pow_no_retargeting: true,
                majority_enforce_block_upgrade: 750,
                majority_reject_block_outdated: 950,
                majority_window: 1000,
                bip34_height: 227_931,
                bip34_hash: H256(hex!(
                    "000000000000024b89b42a942fe0d9fea3bb44ab7bd1b19115dd6a759c0808b8"
                )),
                // 95% of 15
                rule_change_activation_threshold: 14,
                miner_confirmation_window: 15,
                deployments: [
                    Deployment {
                        bit: 28,
                        start_time: 1_199_145_601,
                        timeout: 1_230_767_999,
                    },
                    Deployment {
                        bit: 0,
                        start_time: 1_462_060_800,
                        timeout: 1_493_596_800,
                    },
                    Deployment {
                        bit: 1,
                        start_time: 0,
                        timeout: 0,
                    },
                ],
            },
            genesis,
            genesis_hash,
            dns_seeds: Vec::new(),
            checkpoints: BTreeMap::from([(
                0,
                H256(hex!(
                    "00000e5e9fef0577210c46b7139bbbbebbf4ed3df5670ed404595a3dc3fa7ff3"
                )),
            )]),
            last_pow_block: 5000,
            mining_requires_peers: true,
            default_consistency_checks: false,
            require_standard: true,
            mine_blocks_on_demand: false,
        }
    }

    fn test() -> Self {
        let genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 107231206,
            bits: 0x1f00ffff,
        });
        let genesis_hash = genesis.header.hash();
        Self {
            network: Network::Test,
            message_start: [0x0b, 0x11, 0x09, 0x07],
            default_port: 18889,
            prune_after_height: 1000,
            base58_pubkey_prefix: vec![111],
            base58_script_prefix: vec![196],
            base58_secret_prefix: vec![239],
            base58_ext_public_prefix: vec![0x04, 0x35, 0x87, 0xcf],
            base58_ext_secret_prefix: vec![0x04, 0x35, 0x83, 0x94],
            consensus: ConsensusParams {
                pow_limit: pow_limit_low(),
                pos_limit: pow_limit_low(),
                target_timespan: 16 * 60,
                target_spacing: 64,
                pow_allow_min_difficulty_blocks: true,
                pow_no_retargeting: true,
                majority_enforce_block_upgrade: 51,
                majority_reject_block_outdated: 75,
                majority_window: 100,
                bip34_height: 21_111,
                bip34_hash: H256(hex!(
                    "0000000023b3a96d3484e5abb3755c413e7d41500f8e2a5c3f0dd01299cd8ef8"
                )),
                // 75% for testchains
                rule_change_activation_threshold: 11,
                miner_confirmation_window: 15,
                deployments: [
                    Deployment {
                        bit: 28,
                        start_time: 1_199_145_601,
                        timeout: 1_230_767_999,
                    },
                    Deployment {
                        bit: 0,
                        start_time: 1_456_790_400,
                        timeout: 1_493_596_800,
                    },
                    Deployment {
                        bit: 1,
                        start_time: 1_462_060_800,
                        timeout: 1_493_596_800,
                    },
                ],
            },
            genesis,
            genesis_hash,
            dns_seeds: Vec::new(),
            checkpoints: BTreeMap::from([(
                0,
                H256(hex!(
                    "0000803698155bf158957dc6435eeb83648d016cbfee8fa28cb399eedcf7b7a6"
                )),
            )]),
            last_pow_block: 50,
            mining_requires_peers: true,
            default_consistency_checks: false,
            require_standard: false,
            mine_blocks_on_demand: false,
        }
    }

    fn regtest() -> Self {
        let genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 13,
            bits: 0x207fffff,
        });
        let genesis_hash = genesis.header.hash();
        Self {
            network: Network::Regtest,
            message_start: [0xfa, 0xbf, 0xb5, 0xda],
            default_port: 22889,
            prune_after_height: 1000,
            base58_pubkey_prefix: vec![111],
            base58_script_prefix: vec![196],
            base58_secret_prefix: vec![239],
            base58_ext_public_prefix: vec![0x04, 0x35, 0x87, 0xcf],
            base58_ext_secret_prefix: vec![0x04, 0x35, 0x83, 0x94],
            consensus: ConsensusParams {
                pow_limit: pow_limit_regtest(),
                pos_limit: pow_limit_regtest(),
                target_timespan: 16 * 60,
                target_spacing: 64,
                pow_allow_min_difficulty_blocks: true,
                pow_no_retargeting: true,
                majority_enforce_block_upgrade: 750,
                majority_reject_block_outdated: 950,
                majority_window: 1000,
                // BIP34 never necessarily activated on regtest
                bip34_height: -1,
                bip34_hash: H256::zero(),
                rule_change_activation_threshold: 7,
                miner_confirmation_window: 10,
                deployments: [
                    Deployment {
                        bit: 28,
                        start_time: 0,
                        timeout: 999_999_999_999,
                    },
                    Deployment {
                        bit: 0,
                        start_time: 0,
                        timeout: 999_999_999_999,
                    },
                    Deployment {
                        bit: 1,
                        start_time: 0,
                        timeout: 999_999_999_999,
                    },
                ],
            },
            genesis,
            genesis_hash,
            dns_seeds: Vec::new(),
            checkpoints: BTreeMap::from([(
                0,
                H256(hex!(
                    "55f542c97770bb12c0d947bbdab8a0bd63799f58a7d923e515253ca10d1047ca"
                )),
            )]),
            last_pow_block: 100,
            mining_requires_peers: false,
            default_consistency_checks: true,
            require_standard: false,
            mine_blocks_on_demand: true,
        }
    }

    pub fn deployment(&self, pos: DeploymentPos) -> &Deployment {
        &self.consensus.deployments[pos as usize]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quanta_trie::EMPTY_TRIE_HASH;

    #[test]
    fn networks_disagree_on_magic_and_ports() {
        let main = ChainParams::new(Network::Main);
        let test = ChainParams::new(Network::Test);
        let regtest = ChainParams::new(Network::Regtest);
        assert_ne!(main.message_start, test.message_start);
        assert_ne!(test.message_start, regtest.message_start);
        assert_eq!(main.default_port, 8889);
        assert_eq!(test.default_port, 18889);
        assert_eq!(regtest.default_port, 22889);
    }

    #[test]
    fn every_network_anchors_the_empty_roots() {
        for network in [Network::Main, Network::Test, Network::Regtest] {
            let params = ChainParams::new(network);
            assert_eq!(params.genesis.header.state_root, *EMPTY_TRIE_HASH);
            assert_eq!(params.genesis.header.utxo_root, *EMPTY_TRIE_HASH);
            assert_eq!(params.genesis_hash, params.genesis.header.hash());
            assert_eq!(params.checkpoints.len(), 1);
        }
    }

    #[test]
    fn confirmation_windows_match_thresholds() {
        let main = ChainParams::new(Network::Main);
        assert_eq!(main.consensus.rule_change_activation_threshold, 14);
        assert_eq!(main.consensus.miner_confirmation_window, 15);
        let regtest = ChainParams::new(Network::Regtest);
        assert!(
            regtest.consensus.rule_change_activation_threshold
                < regtest.consensus.miner_confirmation_window
        );
    }

    #[test]
    fn deployment_lookup() {
        let params = ChainParams::new(Network::Main);
        assert_eq!(params.deployment(DeploymentPos::TestDummy).bit, 28);
        assert_eq!(params.deployment(DeploymentPos::Segwit).bit, 1);
    }
}
