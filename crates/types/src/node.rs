//! Local node identity.

use crate::crypto::{Address, KeyPair};

/// The identity of the locally running node: its keypair and the address
/// derived from it.
#[derive(Debug)]
pub struct LocalNode {
    keypair: KeyPair,
    address: Address,
}

impl LocalNode {
    pub fn new(keypair: KeyPair) -> Self {
        let address = keypair.address();
        Self { keypair, address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}
