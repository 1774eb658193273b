//! Ballots: the signed proposal/vote messages driving consensus rounds.

use crate::crypto::{Address, KeyPair, PublicKey, Signature, SignatureError};
use crate::operation::Operation;
use crate::state::BallotState;
use crate::transaction::Transaction;
use crate::{block::now_iso8601, hash_hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A vote carried by a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Vote {
    Yes,
    No,
    /// The prior state expired without agreement; drives round progression.
    Exp,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vote::Yes => "YES",
            Vote::No => "NO",
            Vote::Exp => "EXP",
        };
        f.write_str(name)
    }
}

/// The reference-block metadata a ballot attaches to: the latest confirmed
/// block as this node sees it, plus the round being voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basis {
    pub round: u64,
    pub height: u64,
    pub block_hash: String,
    pub total_txs: u64,
    pub total_ops: u64,
}

/// Signatures over a ballot body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotHeader {
    /// Proposer's signature; binds the proposer transaction.
    pub proposer_signature: Signature,
    /// Emitting node's signature.
    pub signature: Signature,
}

/// The signed content of a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotBody {
    /// Node emitting this ballot.
    pub source: Address,
    /// Proposer selected for `(basis.height, basis.round)`.
    pub proposer: Address,
    pub basis: Basis,
    pub ballot_state: BallotState,
    pub vote: Vote,
    /// Creation time, ISO-8601 with timezone.
    pub confirmed: String,
    /// Hashes of the transactions proposed in this ballot.
    pub transactions: Vec<String>,
    pub proposer_transaction: Option<ProposerTransaction>,
}

/// A signed proposal/vote message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub header: BallotHeader,
    pub body: BallotBody,
}

impl Ballot {
    /// Create an unsigned ballot in `INIT` voting `YES`.
    pub fn new(source: Address, proposer: Address, basis: Basis, transactions: Vec<String>) -> Self {
        Self {
            header: BallotHeader::default(),
            body: BallotBody {
                source,
                proposer,
                basis,
                ballot_state: BallotState::Init,
                vote: Vote::Yes,
                confirmed: now_iso8601(),
                transactions,
                proposer_transaction: None,
            },
        }
    }

    /// Set the ballot state being voted and the vote itself.
    pub fn set_vote(&mut self, state: BallotState, vote: Vote) {
        self.body.ballot_state = state;
        self.body.vote = vote;
    }

    pub fn set_proposer_transaction(&mut self, ptx: ProposerTransaction) {
        self.body.proposer_transaction = Some(ptx);
    }

    /// The message that gets signed: the network id followed by the content
    /// hash of the body. Binding the network id keeps ballots from being
    /// replayed across networks.
    pub fn signing_message(&self, network_id: &[u8]) -> Vec<u8> {
        let encoded = serde_json::to_vec(&self.body).expect("ballot body is json-encodable");
        let mut message = network_id.to_vec();
        message.extend_from_slice(hash_hex(&encoded).as_bytes());
        message
    }

    /// Sign as the emitting node.
    pub fn sign(&mut self, keypair: &KeyPair, network_id: &[u8]) {
        self.header.signature = keypair.sign(&self.signing_message(network_id));
    }

    /// Sign as the proposer.
    pub fn sign_by_proposer(&mut self, keypair: &KeyPair, network_id: &[u8]) {
        self.header.proposer_signature = keypair.sign(&self.signing_message(network_id));
    }

    /// Verify the emitting node's signature against `body.source`.
    pub fn verify(&self, network_id: &[u8]) -> Result<(), SignatureError> {
        let key = PublicKey::from_address(&self.body.source)?;
        key.verify(&self.signing_message(network_id), &self.header.signature)
    }

    /// Verify the proposer's signature against `body.proposer`.
    pub fn verify_proposer(&self, network_id: &[u8]) -> Result<(), SignatureError> {
        let key = PublicKey::from_address(&self.body.proposer)?;
        key.verify(
            &self.signing_message(network_id),
            &self.header.proposer_signature,
        )
    }
}

/// The transaction a proposer attaches to every ballot, carrying the
/// collect-tx-fee and inflation operations for the proposed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposerTransaction {
    pub transaction: Transaction,
}

impl ProposerTransaction {
    /// Assemble the proposer transaction for `ballot`.
    ///
    /// The sequence id is the basis height: a proposer issues exactly one
    /// such transaction per height attempt.
    pub fn from_ballot(ballot: &Ballot, collect_tx_fee: Operation, inflation: Operation) -> Self {
        Self {
            transaction: Transaction::new(
                ballot.body.proposer.clone(),
                ballot.body.basis.height,
                vec![collect_tx_fee, inflation],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis() -> Basis {
        Basis {
            round: 3,
            height: 10,
            block_hash: "abc".into(),
            total_txs: 4,
            total_ops: 9,
        }
    }

    fn ballot_between(source: &KeyPair, proposer: &KeyPair) -> Ballot {
        Ballot::new(source.address(), proposer.address(), basis(), vec![])
    }

    #[test]
    fn sign_then_verify() {
        let source = KeyPair::from_seed(&[1; 32]);
        let proposer = KeyPair::from_seed(&[2; 32]);
        let mut ballot = ballot_between(&source, &proposer);
        ballot.set_vote(BallotState::Accept, Vote::Exp);

        ballot.sign_by_proposer(&proposer, b"net");
        ballot.sign(&source, b"net");

        ballot.verify(b"net").unwrap();
        ballot.verify_proposer(b"net").unwrap();
    }

    #[test]
    fn network_id_is_bound() {
        let source = KeyPair::from_seed(&[1; 32]);
        let proposer = KeyPair::from_seed(&[2; 32]);
        let mut ballot = ballot_between(&source, &proposer);
        ballot.sign(&source, b"net-a");

        assert!(ballot.verify(b"net-b").is_err());
    }

    #[test]
    fn signature_covers_vote() {
        let source = KeyPair::from_seed(&[1; 32]);
        let proposer = KeyPair::from_seed(&[2; 32]);
        let mut ballot = ballot_between(&source, &proposer);
        ballot.sign(&source, b"net");

        // Tampering with the vote after signing must invalidate it.
        ballot.set_vote(BallotState::Sign, Vote::No);
        assert!(ballot.verify(b"net").is_err());
    }

    #[test]
    fn proposer_transaction_shape() {
        let source = KeyPair::from_seed(&[1; 32]);
        let proposer = KeyPair::from_seed(&[2; 32]);
        let common = Address::new("common-account");
        let ballot = ballot_between(&source, &proposer);

        let opc = Operation::collect_tx_fee_from_ballot(&ballot, common.clone());
        let opi = Operation::inflation_from_ballot(&ballot, common, 10_000_000_000);
        let ptx = ProposerTransaction::from_ballot(&ballot, opc, opi);

        assert_eq!(ptx.transaction.source, proposer.address());
        assert_eq!(ptx.transaction.sequence_id, 10);
        assert_eq!(ptx.transaction.operations.len(), 2);
    }
}
