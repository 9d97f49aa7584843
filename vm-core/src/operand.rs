//! Tagged-union `Operand` and the bounded LIFO `Stack` it lives on.

use core::fmt;

use vm_asm::Digit81;

use crate::bigint::BigIntMid;
use crate::error::VmError;
use crate::tensor::Tensor;

/// Which tier payload an [`Operand`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Low,
    Mid,
    Top,
}

/// A tagged-union value on the operand stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Low(Digit81),
    Mid(BigIntMid),
    Top(Tensor),
}

impl Operand {
    pub fn tag(&self) -> Tag {
        match self {
            Operand::Low(_) => Tag::Low,
            Operand::Mid(_) => Tag::Mid,
            Operand::Top(_) => Tag::Top,
        }
    }

    /// Widen to MID: a LOW operand maps through
    /// [`Digit81::to_mid_digit`] into a single base-243 digit; a MID
    /// operand passes through; a TOP operand cannot widen into MID and
    /// fails with [`VmError::TypeError`] (widening only ever grows tiers).
    pub fn into_mid(self) -> Result<BigIntMid, VmError> {
        match self {
            Operand::Low(d) => Ok(BigIntMid::from_i64(d.to_mid_digit() as i64)),
            Operand::Mid(m) => Ok(m),
            Operand::Top(_) => Err(VmError::TypeError),
        }
    }

    /// Widen to TOP: MID wraps as a rank-0 tensor; TOP passes through; LOW
    /// widens through MID first.
    pub fn into_top(self) -> Result<Tensor, VmError> {
        match self {
            Operand::Top(t) => Ok(t),
            Operand::Mid(m) => Ok(Tensor::scalar(m)),
            Operand::Low(d) => Ok(Tensor::scalar(BigIntMid::from_i64(d.to_mid_digit() as i64))),
        }
    }

    /// Require a LOW operand with no widening: opcodes that expect LOW
    /// refuse MID/TOP per the stack's explicit-demotion rule.
    pub fn into_low(self) -> Result<Digit81, VmError> {
        match self {
            Operand::Low(d) => Ok(d),
            _ => Err(VmError::TypeError),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Low(d) => write!(f, "low{d}"),
            Operand::Mid(m) => write!(f, "mid({m})"),
            Operand::Top(t) => write!(f, "top({t})"),
        }
    }
}

/// A bounded LIFO of [`Operand`]s.
#[derive(Debug, Clone)]
pub struct Stack {
    capacity: usize,
    items: Vec<Operand>,
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, operand: Operand) -> Result<(), VmError> {
        if self.items.len() >= self.capacity {
            return Err(VmError::StackOverflow);
        }
        self.items.push(operand);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Operand, VmError> {
        self.items.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> Result<&Operand, VmError> {
        self.items.last().ok_or(VmError::StackUnderflow)
    }

    pub fn drop_top(&mut self) -> Result<(), VmError> {
        self.pop().map(|_| ())
    }

    pub fn dup(&mut self) -> Result<(), VmError> {
        let top = self.peek()?.clone();
        self.push(top)
    }

    pub fn swap(&mut self) -> Result<(), VmError> {
        let len = self.items.len();
        if len < 2 {
            return Err(VmError::StackUnderflow);
        }
        self.items.swap(len - 1, len - 2);
        Ok(())
    }
}
