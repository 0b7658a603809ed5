use ethereum_types::{H160, H256};
use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::{Digest, Keccak256};

/// Keccak-256, the hash of the account side: trie keys, code hashes, roots.
pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Keccak256::digest(data.as_ref()).as_slice())
}

/// Single SHA-256.
pub fn sha256(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Sha256::digest(data.as_ref()).as_slice())
}

/// Double SHA-256, the hash of the UTXO side: txids and block hashes.
pub fn sha256d(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Sha256::digest(Sha256::digest(data.as_ref())).as_slice())
}

/// RIPEMD160(SHA256(data)), the 20-byte hash of scripts and derived
/// contract addresses.
pub fn hash160(data: impl AsRef<[u8]>) -> H160 {
    H160::from_slice(Ripemd160::digest(Sha256::digest(data.as_ref())).as_slice())
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn keccak_empty_matches_known_constant() {
        assert_eq!(keccak([]), crate::constants::EMPTY_KECCAK_HASH);
    }

    #[test]
    fn sha256d_genesis_style() {
        // sha256d("hello") is a fixed, externally verifiable vector
        assert_eq!(
            sha256d(b"hello").0,
            hex!("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50")
        );
    }

    #[test]
    fn hash160_known_vector() {
        // hash160 of the empty string
        assert_eq!(
            hash160([]).0,
            hex!("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb")
        );
    }
}
