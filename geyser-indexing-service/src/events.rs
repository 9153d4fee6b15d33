use serde::{Deserialize, Serialize};

/// One decoded on-chain event, as delivered by the event feed. Envelopes
/// arrive strictly ordered by `ordinal` (block height, then transaction
/// index, then log index) and are processed one at a time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventEnvelope {
    pub ordinal: u64,
    /// Emitting contract address (geyser pool or reward module).
    pub address: String,
    pub block_timestamp: i64,
    pub tx_hash: String,
    #[serde(flatten)]
    pub event: Event,
}

/// Raw amounts are fixed-point integer strings scaled by the token's
/// reported decimal precision; conversion happens in the handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "params", rename_all = "snake_case")]
pub enum Event {
    PoolRegistered {
        staking_token: String,
        reward_token: String,
        reward_module: String,
        reward_module_type: String,
    },
    Staked {
        user: String,
        amount: String,
        shares: String,
    },
    Unstaked {
        user: String,
        amount: String,
        shares: String,
    },
    RewardsFunded {
        amount: String,
        shares: String,
        timestamp: i64,
    },
    RewardsDistributed {
        user: String,
        amount: String,
    },
    RewardsExpired {
        amount: String,
        timestamp: i64,
    },
    RewardsWithdrawn {
        amount: String,
    },
    GysrSpent {
        user: String,
        amount: String,
    },
    GysrVested {
        user: String,
        amount: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_deserialization() {
        let json = r#"{
            "ordinal": 42,
            "address": "0xPool",
            "block_timestamp": 1650000000,
            "tx_hash": "0xabc",
            "event": "staked",
            "params": {
                "user": "0xUser",
                "amount": "100000000000000000000",
                "shares": "100000000000000000000000000"
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.ordinal, 42);
        match envelope.event {
            Event::Staked { ref user, .. } => assert_eq!(user, "0xUser"),
            ref other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = EventEnvelope {
            ordinal: 7,
            address: "0xmodule".to_owned(),
            block_timestamp: 1650000000,
            tx_hash: "0xdef".to_owned(),
            event: Event::RewardsExpired {
                amount: "1000000".to_owned(),
                timestamp: 1649000000,
            },
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        match parsed.event {
            Event::RewardsExpired { timestamp, .. } => assert_eq!(timestamp, 1649000000),
            ref other => panic!("unexpected event: {:?}", other),
        }
    }
}
