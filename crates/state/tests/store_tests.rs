//! On-disk store behavior: versioned layout, lock discipline and
//! durability of a committed root pair across process-style reopens.

use ethereum_types::{H256, U256};
use tempdir::TempDir;

use quanta_state::{
    BaseState, QuantaState, StateDB, StateError, StoreError, WithExisting,
};

fn genesis_hash() -> H256 {
    H256::repeat_byte(0x5e)
}

#[test]
fn open_creates_versioned_layout() {
    let dir = TempDir::new("quanta-store").unwrap();
    let db = StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust).unwrap();
    drop(db);

    let versioned = dir.path().join(hex::encode([0x5e, 0x5e, 0x5e, 0x5e]));
    assert!(versioned.exists());
}

#[test]
fn second_open_of_same_store_is_rejected() {
    let dir = TempDir::new("quanta-store").unwrap();
    let _held = StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust).unwrap();
    let result = StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust);
    assert!(matches!(result, Err(StoreError::DatabaseAlreadyOpen)));
}

#[test]
fn lock_is_released_on_drop() {
    let dir = TempDir::new("quanta-store").unwrap();
    let db = StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust).unwrap();
    drop(db);
    StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust).unwrap();
}

#[test]
fn kill_wipes_the_versioned_directory() {
    let dir = TempDir::new("quanta-store").unwrap();
    {
        let db = StateDB::open(dir.path(), genesis_hash(), WithExisting::Trust).unwrap();
        db.insert(b"key".to_vec(), b"value".to_vec()).unwrap();
        db.commit().unwrap();
    }
    {
        let db = StateDB::open(dir.path(), genesis_hash(), WithExisting::Kill).unwrap();
        assert_eq!(db.lookup(b"key").unwrap(), None);
    }
}

#[test]
fn committed_roots_survive_reopen_from_disk() -> Result<(), StateError> {
    let dir = TempDir::new("quanta-store").unwrap();
    let base = dir.path();
    let address = ethereum_types::Address::repeat_byte(0xaa);

    let (state_root, utxo_root) = {
        let mut state = QuantaState::open(
            base,
            genesis_hash(),
            U256::zero(),
            WithExisting::Trust,
            BaseState::Empty,
        )?;
        state.add_balance(address, U256::from(1234))?;
        state.add_vin(
            address,
            quanta_common::types::Vin::new(
                quanta_common::types::OutPoint::new(H256::repeat_byte(1), 0),
                1234,
            ),
        )?;
        state.commit_all()?
    };

    let mut reopened = QuantaState::open(
        base,
        genesis_hash(),
        U256::zero(),
        WithExisting::Trust,
        BaseState::PreExisting,
    )?;
    reopened.set_root(state_root);
    reopened.set_root_utxo(utxo_root);

    assert_eq!(reopened.balance(address)?, U256::from(1234));
    assert_eq!(reopened.get_vins(address)?.len(), 1);
    assert!(reopened.is_trie_good());
    Ok(())
}
