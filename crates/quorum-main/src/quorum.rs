// Majority arithmetic and the primary partition rules.
// Witnesses never count toward the base majority; they only break
// ties once the validated db members fall short.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Majority {
    quorum_pass: usize,
}

impl Majority {
    pub fn of(members: usize) -> Self {
        Self {
            quorum_pass: members / 2 + 1,
        }
    }

    pub fn size(&self) -> usize {
        self.quorum_pass
    }

    pub fn is_quorum_pass(&self, votes: usize) -> bool {
        votes >= self.quorum_pass
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumDecision {
    pub is_primary: bool,
    pub conclusion: String,
}

impl QuorumDecision {
    pub fn primary(conclusion: String) -> Self {
        Self { is_primary: true, conclusion }
    }

    pub fn refused(conclusion: String) -> Self {
        Self { is_primary: false, conclusion }
    }
}

/// Counts taken from one consistent snapshot of the validation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumTally {
    pub majority: Majority,
    pub validated_db: usize,
    pub validated_active_witnesses: usize,
    pub passive_witnesses: usize,
    pub all_passive_reachable: bool,
}

impl QuorumTally {
    fn passive_credit(&self) -> usize {
        // All or nothing: a partial set of reachable witnesses is worth zero.
        if self.passive_witnesses > 0 && self.all_passive_reachable { 1 } else { 0 }
    }

    /// Applies the rules in order; the first one that matches wins.
    pub fn decide(&self, valid_membership: bool) -> QuorumDecision {
        if !valid_membership {
            return QuorumDecision::refused("MEMBERSHIP IS INVALID".to_string());
        }

        let v_db = self.validated_db;
        let v_aw = self.validated_active_witnesses;
        let m = self.majority.size();

        if self.majority.is_quorum_pass(v_db) {
            return QuorumDecision::primary(format!(
                "I AM IN A PRIMARY PARTITION OF {} DB MEMBERS OUT OF THE REQUIRED MAJORITY OF {}",
                v_db, m
            ));
        }

        if v_aw > 0 && self.majority.is_quorum_pass(v_db + v_aw) {
            return QuorumDecision::primary(format!(
                "I AM IN A PRIMARY PARTITION WITH {} VALIDATED DB MEMBERS AND {} VALIDATED ACTIVE WITNESSES",
                v_db, v_aw
            ));
        }

        let credit = self.passive_credit();
        if credit > 0 && self.majority.is_quorum_pass(v_db + credit) {
            return QuorumDecision::primary(format!(
                "I AM IN A PRIMARY PARTITION OF {} MEMBERS, WITH {} VALIDATED DB MEMBERS AND ALL ({}) REACHABLE PASSIVE WITNESSES",
                v_db + 1, v_db, self.passive_witnesses
            ));
        }

        QuorumDecision::refused(format!(
            "NOT IN A PRIMARY PARTITION: {} OF {} REQUIRED DB MEMBERS VALIDATED",
            v_db, m
        ))
    }
}
