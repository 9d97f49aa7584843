//! The recursive symbolic ternary interpreter.
//!
//! Built on [`vm_asm`]'s wire format, this crate adds the three operand
//! tiers, the bounded stack, the tier state machine, the optimizer hook,
//! the event stream, snapshot/rollback, and the dispatcher that ties them
//! together.

pub mod bigint;
pub mod code;
pub mod config;
pub mod disasm;
pub mod error;
pub mod event;
pub mod hook;
pub mod operand;
pub mod snapshot;
pub mod tensor;
pub mod tier;
pub mod vm;

pub use bigint::{BigIntMid, Sign};
pub use code::Code;
pub use config::VmConfig;
pub use disasm::{disassemble, DisasmLine, DisasmLineKind};
pub use error::VmError;
pub use event::{Event, EventCallback, EventLog, HaltReason};
pub use hook::{Hook, NullHook};
pub use operand::{Operand, Stack, Tag};
pub use snapshot::{Snapshot, SnapshotSlot};
pub use tensor::Tensor;
pub use tier::{Tier, TierChangeReason};
pub use vm::{ExecSummary, Vm};
