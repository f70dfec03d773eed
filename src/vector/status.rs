//! Parallel status of a vector and the rules for combining two of them.
//!
//! Every reconciliation decision in the crate goes through [`add_plan`] or
//! [`dot_plan`]; both are a single exhaustive match over the status pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which representation a vector's shared entries are in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParallelStatus {
    /// No replication: plain local arithmetic.
    #[default]
    NotParallel,
    /// Shared entries hold partial contributions; the true value is their sum.
    Distributed,
    /// Shared entries hold the final value at every replica.
    Cumulated,
}

impl ParallelStatus {
    #[inline]
    pub fn is_parallel(self) -> bool {
        !matches!(self, ParallelStatus::NotParallel)
    }
}

impl fmt::Display for ParallelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParallelStatus::NotParallel => "NOT PARALLEL",
            ParallelStatus::Distributed => "DISTRIBUTED",
            ParallelStatus::Cumulated => "CUMULATED",
        })
    }
}

/// What to do before `receiver += s * operand`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddPlan {
    /// Same representation on both sides.
    Direct,
    /// Receiver is distributed, the operand is not.
    CumulateReceiver,
    /// Operand is distributed, the receiver is not.
    CumulateOperand,
    /// Neither side is partitioned.
    LocalOnly,
}

/// What to do before a global inner product of receiver and operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DotPlan {
    /// Mixed representations already count every shared dof once.
    Direct,
    /// Both distributed.
    CumulateReceiver,
    /// Both cumulated.
    DistributeReceiver,
    /// One side cumulated, the other unpartitioned: shared dofs are summed
    /// at their master only.
    MasterOnly,
    /// Neither side is partitioned: no reduction.
    LocalOnly,
}

pub fn add_plan(receiver: ParallelStatus, operand: ParallelStatus) -> AddPlan {
    use ParallelStatus::*;
    match (receiver, operand) {
        (NotParallel, NotParallel) => AddPlan::LocalOnly,
        (Distributed, Distributed) | (Cumulated, Cumulated) => AddPlan::Direct,
        (Distributed, Cumulated) | (Distributed, NotParallel) => AddPlan::CumulateReceiver,
        (Cumulated, Distributed) | (NotParallel, Distributed) => AddPlan::CumulateOperand,
        (Cumulated, NotParallel) | (NotParallel, Cumulated) => AddPlan::Direct,
    }
}

pub fn dot_plan(receiver: ParallelStatus, operand: ParallelStatus) -> DotPlan {
    use ParallelStatus::*;
    match (receiver, operand) {
        (NotParallel, NotParallel) => DotPlan::LocalOnly,
        (Distributed, Distributed) => DotPlan::CumulateReceiver,
        (Cumulated, Cumulated) => DotPlan::DistributeReceiver,
        (Distributed, Cumulated) | (Cumulated, Distributed) => DotPlan::Direct,
        // an unpartitioned side holds the same value at every replica
        (Distributed, NotParallel) | (NotParallel, Distributed) => DotPlan::Direct,
        (Cumulated, NotParallel) | (NotParallel, Cumulated) => DotPlan::MasterOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::ParallelStatus::*;
    use super::*;

    #[test]
    fn display_matches_status_dump() {
        assert_eq!(NotParallel.to_string(), "NOT PARALLEL");
        assert_eq!(Distributed.to_string(), "DISTRIBUTED");
        assert_eq!(Cumulated.to_string(), "CUMULATED");
    }

    #[test]
    fn add_table() {
        assert_eq!(add_plan(Distributed, Distributed), AddPlan::Direct);
        assert_eq!(add_plan(Cumulated, Cumulated), AddPlan::Direct);
        assert_eq!(add_plan(Distributed, Cumulated), AddPlan::CumulateReceiver);
        assert_eq!(add_plan(Cumulated, Distributed), AddPlan::CumulateOperand);
        assert_eq!(add_plan(Distributed, NotParallel), AddPlan::CumulateReceiver);
        assert_eq!(add_plan(NotParallel, Distributed), AddPlan::CumulateOperand);
        assert_eq!(add_plan(Cumulated, NotParallel), AddPlan::Direct);
        assert_eq!(add_plan(NotParallel, Cumulated), AddPlan::Direct);
        assert_eq!(add_plan(NotParallel, NotParallel), AddPlan::LocalOnly);
    }

    #[test]
    fn dot_table() {
        assert_eq!(dot_plan(Distributed, Distributed), DotPlan::CumulateReceiver);
        assert_eq!(dot_plan(Cumulated, Cumulated), DotPlan::DistributeReceiver);
        assert_eq!(dot_plan(Distributed, Cumulated), DotPlan::Direct);
        assert_eq!(dot_plan(Cumulated, Distributed), DotPlan::Direct);
        assert_eq!(dot_plan(Distributed, NotParallel), DotPlan::Direct);
        assert_eq!(dot_plan(NotParallel, Distributed), DotPlan::Direct);
        assert_eq!(dot_plan(Cumulated, NotParallel), DotPlan::MasterOnly);
        assert_eq!(dot_plan(NotParallel, Cumulated), DotPlan::MasterOnly);
        assert_eq!(dot_plan(NotParallel, NotParallel), DotPlan::LocalOnly);
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&Cumulated).unwrap();
        let back: ParallelStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Cumulated);
        assert!(!NotParallel.is_parallel());
        assert!(Distributed.is_parallel());
    }
}
