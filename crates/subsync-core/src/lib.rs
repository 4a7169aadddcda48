// Library root: lineup substitution planning and execution.

pub mod eligibility;
pub mod engine;
pub mod error;
pub mod formation;
pub mod locks;
pub mod planner;
pub mod position;
pub mod protocol;
pub mod remote;
pub mod roster;
pub mod throttle;
pub mod verifier;

pub use eligibility::{EligibilityCache, EligibilityMap, ResolvedPositions};
pub use engine::{EngineSettings, ExecutionResult, LineupEngine, SwapResult};
pub use error::{EngineError, PlanError};
pub use formation::Formation;
pub use planner::{ExecutionPolicy, PlanOptions, PlanOutcome, SwapPair, SwapPlan};
pub use position::{EligibilitySet, PositionCode, SlotPosition};
pub use protocol::{LineupChangeRequest, ProtocolOutcome, ProtocolState};
pub use remote::{EligibilityLookup, LineupTransport, RosterSource};
pub use roster::{Roster, RosterSlot, RosteredPlayer};
