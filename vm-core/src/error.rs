//! Interpreter error variants and their conversion from lower layers.

use vm_asm::AsmError;

/// Every way a dispatched opcode, or the load/push/pop path around it, can
/// fail.
///
/// Raised inside `execute`, these halt the VM and surface through
/// [`crate::vm::ExecSummary`] before the stack is left touched: precondition
/// checks run before an opcode commits its effects, so a failing opcode
/// never partially applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// Popped or peeked an empty stack.
    #[error("stack underflow")]
    StackUnderflow,
    /// Pushed past the configured stack capacity.
    #[error("stack overflow")]
    StackOverflow,
    /// A `mod`/`div` divisor was zero.
    #[error("division by zero")]
    DivByZero,
    /// An opcode received an operand tag it cannot widen to its expected
    /// tier (e.g. a LOW-only opcode fed a TOP operand).
    #[error("type error")]
    TypeError,
    /// Tensor operands had incompatible shapes for the requested op.
    #[error("shape mismatch")]
    ShapeMismatch,
    /// A tensor index fell outside its axis bounds.
    #[error("index out of range")]
    IndexOutOfRange,
    /// A tensor op required a rank it was not given.
    #[error("rank error")]
    RankError,
    /// A string or byte payload could not be parsed into the expected type.
    #[error("invalid input")]
    InvalidInput,
    /// The opcode byte does not name any entry in the canonical table.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// Fewer bytes remained in the code buffer than the opcode's operand
    /// requires.
    #[error("truncated operand")]
    TruncatedOperand,
    /// `rollback` was requested with no prior `snapshot`.
    #[error("no snapshot to roll back to")]
    NoSnapshot,
    /// A hook or event callback attempted to call back into the VM that
    /// invoked it.
    #[error("reentrant call into VM")]
    Reentrant,
    /// A heap allocation for a mid-tier or tensor payload failed.
    #[error("out of memory")]
    OutOfMemory,
}

impl From<AsmError> for VmError {
    fn from(err: AsmError) -> Self {
        match err {
            AsmError::DivByZero => VmError::DivByZero,
            AsmError::TruncatedOperand => VmError::TruncatedOperand,
            AsmError::UnknownOpcode(byte) => VmError::UnknownOpcode(byte),
        }
    }
}
