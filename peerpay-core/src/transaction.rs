//! Transaction data structures and operations

use crate::{now_millis, Address, Amount, Balance, CoreError, CoreResult, Hash, Timestamp};
use libp2p::identity::{Keypair, PublicKey};
use libp2p::PeerId;
use serde::{Deserialize, Serialize};

/// Transaction signature (ed25519, 64 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode)]
pub struct Signature(#[serde(with = "hex_bytes")] Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Public half of the sending identity. The private key never leaves the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Sender {
    /// Base58 peer id of the sender
    pub id: Address,
    /// Protobuf-encoded libp2p public key
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

impl Sender {
    /// Strip a keypair down to its shareable parts
    pub fn from_keypair(keypair: &Keypair) -> Self {
        let public = keypair.public();
        Self {
            id: Address::from(public.to_peer_id()),
            public_key: public.encode_protobuf(),
        }
    }

    /// Decode the public key and check that it hashes to the claimed id
    pub fn public_key(&self) -> CoreResult<PublicKey> {
        let public = PublicKey::try_decode_protobuf(&self.public_key)
            .map_err(|e| CoreError::InvalidPublicKey(e.to_string()))?;

        let claimed: PeerId = self
            .id
            .to_peer_id()
            .map_err(|e| CoreError::InvalidAddress(format!("{}: {}", self.id, e)))?;

        if PeerId::from_public_key(&public) != claimed {
            return Err(CoreError::InvalidPublicKey(format!(
                "public key does not belong to {}",
                self.id
            )));
        }

        Ok(public)
    }
}

/// Transaction data structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Transaction {
    /// Sending identity (None for a mining reward)
    pub sender: Option<Sender>,
    /// Receiving wallet
    pub receiver: Address,
    /// Amount transferred
    pub amount: Amount,
    /// Creation time in milliseconds
    pub timestamp: Timestamp,
    /// Signature over every other field
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create an unsigned transfer stamped with the current time
    pub fn new(sender: Sender, receiver: Address, amount: Amount) -> Self {
        Self::with_timestamp(sender, receiver, amount, now_millis())
    }

    /// Create an unsigned transfer with an explicit timestamp
    pub fn with_timestamp(
        sender: Sender,
        receiver: Address,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sender: Some(sender),
            receiver,
            amount,
            timestamp,
            signature: None,
        }
    }

    /// Create the reward transaction that pays a miner
    pub fn reward(miner: Address, amount: Amount, timestamp: Timestamp) -> Self {
        Self {
            sender: None,
            receiver: miner,
            amount,
            timestamp,
            signature: None,
        }
    }

    /// Whether this is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }

    /// Encode transaction for signing (without signature)
    pub fn encode_for_signing(&self) -> CoreResult<Vec<u8>> {
        let tx_data = TransactionForSigning {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            amount: self.amount,
            timestamp: self.timestamp,
        };

        bincode::encode_to_vec(&tx_data, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))
    }

    /// Transaction id (including signature)
    pub fn id(&self) -> CoreResult<Hash> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))?;
        Ok(Hash::new(*blake3::hash(&encoded).as_bytes()))
    }

    /// Sign the transaction with the sender's keypair
    pub fn sign(&mut self, keypair: &Keypair) -> CoreResult<()> {
        let sender = self.sender.as_ref().ok_or(CoreError::InvalidSignature)?;
        if sender.public_key != keypair.public().encode_protobuf() {
            return Err(CoreError::Crypto(
                "keypair does not match transaction sender".to_string(),
            ));
        }

        let message = self.encode_for_signing()?;
        let signature = keypair
            .sign(&message)
            .map_err(|e| CoreError::Crypto(e.to_string()))?;

        self.signature = Some(Signature::new(signature));
        Ok(())
    }

    /// Verify the signature against the sender's public identity
    pub fn verify_signature(&self) -> CoreResult<()> {
        let (sender, signature) = match (&self.sender, &self.signature) {
            (Some(sender), Some(signature)) => (sender, signature),
            _ => return Err(CoreError::InvalidSignature),
        };

        let public = sender.public_key()?;
        let message = self.encode_for_signing()?;

        if public.verify(&message, signature.as_bytes()) {
            Ok(())
        } else {
            Err(CoreError::InvalidSignature)
        }
    }

    /// Full validity check for a transfer: positive amount and a good signature
    pub fn validate(&self) -> CoreResult<()> {
        if self.amount == 0 {
            return Err(CoreError::InvalidAmount(self.amount));
        }
        self.verify_signature()
    }

    /// Sending address, if any
    pub fn sender_address(&self) -> Option<&Address> {
        self.sender.as_ref().map(|s| &s.id)
    }

    /// Net effect of this transaction on `address`
    pub fn delta_for(&self, address: &Address) -> Balance {
        let mut delta: Balance = 0;
        if &self.receiver == address {
            delta += self.amount as Balance;
        }
        if self.sender_address() == Some(address) {
            delta -= self.amount as Balance;
        }
        delta
    }
}

/// Helper struct for encoding transaction data for signing
#[derive(bincode::Encode)]
struct TransactionForSigning {
    sender: Option<Sender>,
    receiver: Address,
    amount: Amount,
    timestamp: Timestamp,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
