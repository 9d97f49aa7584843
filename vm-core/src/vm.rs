//! The dispatcher: fetch, decode, execute, apply tier rules, emit events.

use vm_asm::{Digit81, Instruction, Opcode, Operand as WireOperand};

use crate::bigint::BigIntMid;
use crate::code::Code;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::event::{Event, EventCallback, EventLog, HaltReason};
use crate::hook::{Hook, NullHook};
use crate::operand::{Operand, Stack};
use crate::snapshot::{Snapshot, SnapshotSlot};
use crate::tensor::Tensor;
use crate::tier::{evaluate_automatic_transition, Tier, TierChangeReason, TierInputs};

/// What `execute` reports once it stops, beyond the bare step count the
/// foreign interface uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecSummary {
    pub steps: u32,
    pub tier: Tier,
    pub halted: bool,
    pub error: Option<VmError>,
}

/// Execution state: instruction pointer, halted flag, operand stack, tier,
/// recursion depth, latest entropy, snapshot slot, hook, and event
/// machinery.
///
/// The hook is boxed rather than a type parameter so `set_hook` can swap in
/// a collaborator of a different concrete type at runtime, matching the
/// foreign-interface contract's `vm_set_hook(vm, hook)`.
pub struct Vm {
    config: VmConfig,
    code: Code,
    ip: usize,
    halted: bool,
    stack: Stack,
    tier: Tier,
    depth: u32,
    entropy: f64,
    recent_tensor_ops: Vec<bool>,
    snapshot: SnapshotSlot,
    hook: Box<dyn Hook>,
    callback: Option<Box<dyn EventCallback>>,
    event_log: EventLog,
    dispatching: bool,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Self::with_hook(config, NullHook)
    }

    pub fn with_hook(config: VmConfig, hook: impl Hook + 'static) -> Self {
        let stack = Stack::new(config.stack_capacity);
        let event_log = EventLog::new(config.event_log_capacity);
        Self {
            config,
            code: Code::load(&[]),
            ip: 0,
            halted: false,
            stack,
            tier: Tier::Low,
            depth: 0,
            entropy: 0.0,
            recent_tensor_ops: Vec::new(),
            snapshot: SnapshotSlot::new(),
            hook: Box::new(hook),
            callback: None,
            event_log,
            dispatching: false,
        }
    }

    pub fn set_event_callback(&mut self, callback: Box<dyn EventCallback>) {
        self.callback = Some(callback);
    }

    pub fn set_hook(&mut self, hook: impl Hook + 'static) {
        self.hook = Box::new(hook);
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn push(&mut self, operand: Operand) -> Result<(), VmError> {
        self.stack.push(operand)
    }

    pub fn pop(&mut self) -> Result<Operand, VmError> {
        self.stack.pop()
    }

    pub fn peek(&self) -> Result<&Operand, VmError> {
        self.stack.peek()
    }

    pub fn load(&mut self, raw: &[u8]) {
        self.code = Code::load(raw);
        self.ip = 0;
        self.halted = false;
        if self.code.opens_hook_session() {
            tracing::debug!("bytecode opens a hook session");
        }
    }

    fn emit(&mut self, event: Event) {
        self.event_log.record(event);
        if let Some(mut callback) = self.callback.take() {
            self.dispatching = true;
            callback.on_event(event);
            self.dispatching = false;
            self.callback = Some(callback);
        }
    }

    /// Runs at most `max_steps` opcodes, stopping earlier on halt or error.
    /// A halted VM returns an `ExecSummary` with zero steps on every
    /// subsequent call, per the foreign-interface contract.
    pub fn execute(&mut self, max_steps: u32) -> ExecSummary {
        let mut steps = 0;
        while steps < max_steps && !self.halted && self.ip < self.code.len() {
            match self.step() {
                Ok(()) => steps += 1,
                Err(error) => {
                    self.halted = true;
                    tracing::warn!(?error, "halting on error");
                    self.emit(Event::Halted {
                        reason: HaltReason::Error,
                        error: Some(error),
                    });
                    return ExecSummary {
                        steps,
                        tier: self.tier,
                        halted: true,
                        error: Some(error),
                    };
                }
            }
        }
        ExecSummary {
            steps,
            tier: self.tier,
            halted: self.halted,
            error: None,
        }
    }

    #[tracing::instrument(name = "instruction", skip(self))]
    fn step(&mut self) -> Result<(), VmError> {
        if self.dispatching {
            return Err(VmError::Reentrant);
        }

        let (instruction, next_ip) = Instruction::decode(self.code.bytes(), self.ip)?;
        tracing::trace!(ip = self.ip, opcode = ?instruction.opcode, "decoded instruction");

        self.dispatching = true;
        self.hook.observe(instruction.opcode);
        let entropy = self.hook.read_entropy().clamp(0.0, 1.0);
        self.entropy = entropy;
        if self.hook.request_snapshot() {
            self.take_snapshot();
        }
        self.dispatching = false;

        self.ip = next_ip;
        let result = self.execute_opcode(instruction.opcode, instruction.operand);

        self.dispatching = true;
        let should_roll_back = self.hook.request_rollback();
        self.dispatching = false;
        if should_roll_back {
            self.rollback()?;
        }

        result?;
        let is_tensor_op = matches!(
            instruction.opcode,
            Opcode::T729Dot | Opcode::T729Print | Opcode::TnnAccum | Opcode::T81Matmul
        );
        self.record_tensor_window(is_tensor_op);
        self.apply_tier_rules(is_tensor_op);

        self.emit(Event::OpcodeExecuted {
            ip: self.ip,
            opcode: instruction.opcode,
            tier_after: self.tier,
            entropy,
        });

        if instruction.opcode == Opcode::Halt {
            self.halted = true;
            self.emit(Event::Halted {
                reason: HaltReason::Opcode,
                error: None,
            });
        }

        Ok(())
    }

    fn record_tensor_window(&mut self, is_tensor_op: bool) {
        self.recent_tensor_ops.push(is_tensor_op);
        if self.recent_tensor_ops.len() > self.config.tensor_window {
            self.recent_tensor_ops.remove(0);
        }
    }

    fn apply_tier_rules(&mut self, last_op_was_tensor: bool) {
        let inputs = TierInputs {
            depth: self.depth,
            entropy: self.entropy,
            last_op_was_tensor,
            tensor_op_in_window: self.recent_tensor_ops.iter().any(|&t| t),
        };
        if let Some((next_tier, reason)) =
            evaluate_automatic_transition(self.tier, &inputs, &self.config)
        {
            self.change_tier(next_tier, reason);
        }
    }

    fn change_tier(&mut self, next_tier: Tier, reason: TierChangeReason) {
        if next_tier == self.tier {
            return;
        }
        tracing::debug!(from = ?self.tier, to = ?next_tier, ?reason, "tier transition");
        let from = self.tier;
        self.tier = next_tier;
        self.emit(Event::TierChanged {
            from,
            to: next_tier,
            reason,
        });
    }

    fn take_snapshot(&mut self) {
        self.snapshot.store(Snapshot {
            stack: self.stack.clone(),
            tier: self.tier,
            depth: self.depth,
            ip: self.ip,
        });
        self.emit(Event::SnapshotTaken {
            depth: self.depth,
            stack_size: self.stack.len(),
        });
    }

    fn rollback(&mut self) -> Result<(), VmError> {
        let snapshot = self.snapshot.take().ok_or(VmError::NoSnapshot)?;
        self.stack = snapshot.stack;
        self.tier = snapshot.tier;
        self.depth = snapshot.depth;
        self.ip = snapshot.ip;
        self.emit(Event::RolledBack {
            depth: self.depth,
            stack_size: self.stack.len(),
        });
        Ok(())
    }

    fn execute_opcode(&mut self, opcode: Opcode, operand: WireOperand) -> Result<(), VmError> {
        match opcode {
            Opcode::Nop => Ok(()),
            Opcode::Push => {
                let WireOperand::Digit(digit) = operand else {
                    unreachable!("PUSH always decodes a Digit operand")
                };
                self.stack.push(Operand::Low(digit))
            }
            Opcode::Add => self.binary_arith(|a, b| a.add(b), Digit81::add),
            Opcode::Sub => self.binary_arith(|a, b| a.sub(b), Digit81::sub),
            Opcode::Mul => self.binary_arith(|a, b| a.mul(b), Digit81::mul),
            Opcode::Div => self.binary_arith_mid_only(|a, b| a.div_rem(b).map(|(q, _)| q)),
            Opcode::Mod => self.mod_op(),
            Opcode::Neg => self.unary_arith(|a| a.neg(), Digit81::neg),
            Opcode::Abs => self.unary_arith(|a| a.abs(), Digit81::abs),
            Opcode::Cmp3 => self.cmp3(),
            Opcode::TnnAccum => {
                let WireOperand::DigitPair(x, y) = operand else {
                    unreachable!("TNN_ACCUM always decodes a DigitPair operand")
                };
                self.tnn_accum(x, y)
            }
            Opcode::T81Matmul => {
                let WireOperand::DigitPair(x, y) = operand else {
                    unreachable!("T81_MATMUL always decodes a DigitPair operand")
                };
                self.t81_matmul(x, y)
            }
            Opcode::T243Add => self.mid_binary(|a, b| a.add(b)),
            Opcode::T243Mul => self.mid_binary(|a, b| a.mul(b)),
            Opcode::T243Print => self.mid_print(),
            Opcode::Dup => self.stack.dup(),
            Opcode::Swap => self.stack.swap(),
            Opcode::Jmp => {
                let WireOperand::Address(addr) = operand else {
                    unreachable!("JMP always decodes an Address operand")
                };
                self.ip = addr as usize;
                Ok(())
            }
            Opcode::Jz => self.conditional_jump(operand, true),
            Opcode::Jnz => self.conditional_jump(operand, false),
            Opcode::Call => {
                let WireOperand::Address(addr) = operand else {
                    unreachable!("CALL always decodes an Address operand")
                };
                self.stack
                    .push(Operand::Low(Digit81::new(self.ip as u32, 0, 0)))?;
                self.depth += 1;
                self.ip = addr as usize;
                Ok(())
            }
            Opcode::Ret => {
                let return_address = self.stack.pop()?.into_low()?;
                self.depth = self.depth.saturating_sub(1);
                self.ip = return_address.a as usize;
                Ok(())
            }
            Opcode::Drop => self.stack.drop_top(),
            Opcode::T729Dot => self.t729_dot(),
            Opcode::T729Print => self.t729_print(),
            Opcode::RecurseFact => self.recurse_mid(|n| BigIntMid::factorial(n)),
            Opcode::RecurseFib => self.recurse_mid(|n| BigIntMid::fibonacci(n)),
            Opcode::PromoteMid => {
                self.change_tier(Tier::Mid, TierChangeReason::Explicit);
                Ok(())
            }
            Opcode::PromoteTop => {
                self.change_tier(Tier::Top, TierChangeReason::Explicit);
                Ok(())
            }
            Opcode::DemoteMid => {
                self.change_tier(Tier::Mid, TierChangeReason::Explicit);
                Ok(())
            }
            Opcode::DemoteLow => {
                self.change_tier(Tier::Low, TierChangeReason::Explicit);
                Ok(())
            }
            Opcode::Halt => Ok(()),
        }
    }

    fn conditional_jump(&mut self, operand: WireOperand, jump_if_zero: bool) -> Result<(), VmError> {
        let WireOperand::Address(addr) = operand else {
            unreachable!("JZ/JNZ always decode an Address operand")
        };
        let top = self.stack.pop()?.into_mid()?;
        let take_branch = top.is_zero() == jump_if_zero;
        if take_branch {
            self.ip = addr as usize;
        }
        Ok(())
    }

    fn binary_arith(
        &mut self,
        mid_op: impl Fn(&BigIntMid, &BigIntMid) -> BigIntMid,
        low_op: impl Fn(Digit81, Digit81) -> Digit81,
    ) -> Result<(), VmError> {
        match self.tier {
            Tier::Low => {
                let b = self.stack.pop()?.into_low()?;
                let a = self.stack.pop()?.into_low()?;
                self.stack.push(Operand::Low(low_op(a, b)))
            }
            Tier::Mid => {
                let b = self.stack.pop()?.into_mid()?;
                let a = self.stack.pop()?.into_mid()?;
                self.stack.push(Operand::Mid(mid_op(&a, &b)))
            }
            Tier::Top => {
                let b = self.stack.pop()?.into_top()?;
                let a = self.stack.pop()?.into_top()?;
                let result = a.zip_with(&b, &mid_op)?;
                self.stack.push(Operand::Top(result))
            }
        }
    }

    fn binary_arith_mid_only(
        &mut self,
        op: impl Fn(&BigIntMid, &BigIntMid) -> Result<BigIntMid, VmError>,
    ) -> Result<(), VmError> {
        if self.tier == Tier::Low {
            return Err(VmError::TypeError);
        }
        if self.tier == Tier::Top {
            let b = self.stack.pop()?.into_top()?;
            let a = self.stack.pop()?.into_top()?;
            let result = a.try_zip_with(&b, &op)?;
            return self.stack.push(Operand::Top(result));
        }
        let b = self.stack.pop()?.into_mid()?;
        let a = self.stack.pop()?.into_mid()?;
        self.stack.push(Operand::Mid(op(&a, &b)?))
    }

    fn mod_op(&mut self) -> Result<(), VmError> {
        if self.tier == Tier::Low {
            let b = self.stack.pop()?.into_low()?;
            let a = self.stack.pop()?.into_low()?;
            return self.stack.push(Operand::Low(a.modulo(b)?));
        }
        self.binary_arith_mid_only(|a, b| a.modulo(b))
    }

    fn unary_arith(
        &mut self,
        mid_op: impl Fn(&BigIntMid) -> BigIntMid,
        low_op: impl Fn(Digit81) -> Digit81,
    ) -> Result<(), VmError> {
        match self.tier {
            Tier::Low => {
                let a = self.stack.pop()?.into_low()?;
                self.stack.push(Operand::Low(low_op(a)))
            }
            Tier::Mid => {
                let a = self.stack.pop()?.into_mid()?;
                self.stack.push(Operand::Mid(mid_op(&a)))
            }
            Tier::Top => {
                let a = self.stack.pop()?.into_top()?;
                self.stack.push(Operand::Top(a.map(&mid_op)))
            }
        }
    }

    fn cmp3(&mut self) -> Result<(), VmError> {
        let b = self.stack.pop()?.into_mid()?;
        let a = self.stack.pop()?.into_mid()?;
        let c = match a.cmp(&b) {
            core::cmp::Ordering::Less => 0u8.wrapping_sub(1),
            core::cmp::Ordering::Equal => 0,
            core::cmp::Ordering::Greater => 1,
        };
        self.stack.push(Operand::Low(Digit81::new(0, 0, c)))
    }

    fn mid_binary(&mut self, op: impl Fn(&BigIntMid, &BigIntMid) -> BigIntMid) -> Result<(), VmError> {
        let b = self.stack.pop()?.into_mid()?;
        let a = self.stack.pop()?.into_mid()?;
        self.stack.push(Operand::Mid(op(&a, &b)))
    }

    fn mid_print(&mut self) -> Result<(), VmError> {
        let value = self.stack.pop()?.into_mid()?;
        tracing::info!(value = %value, "t243_print");
        self.stack.push(Operand::Mid(value))
    }

    fn tnn_accum(&mut self, x: Digit81, y: Digit81) -> Result<(), VmError> {
        let accumulator = self.stack.pop()?.into_mid()?;
        let product = BigIntMid::from_i64(x.to_mid_digit() as i64)
            .mul(&BigIntMid::from_i64(y.to_mid_digit() as i64));
        self.stack.push(Operand::Mid(accumulator.add(&product)))
    }

    fn t81_matmul(&mut self, x: Digit81, y: Digit81) -> Result<(), VmError> {
        let a = BigIntMid::from_i64(x.to_mid_digit() as i64);
        let b = BigIntMid::from_i64(y.to_mid_digit() as i64);
        self.stack.push(Operand::Top(Tensor::scalar(a.mul(&b))))
    }

    fn t729_dot(&mut self) -> Result<(), VmError> {
        let b = self.stack.pop()?.into_top()?;
        let a = self.stack.pop()?.into_top()?;
        let result = a.dot(&b)?;
        self.stack.push(Operand::Top(result))
    }

    fn t729_print(&mut self) -> Result<(), VmError> {
        let value = self.stack.pop()?.into_top()?;
        tracing::info!(value = %value, "t729_print");
        self.stack.push(Operand::Top(value))
    }

    fn recurse_mid(&mut self, f: impl Fn(&BigIntMid) -> BigIntMid) -> Result<(), VmError> {
        let n = self.stack.pop()?.into_mid()?;
        self.stack.push(Operand::Mid(f(&n)))
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_bytes(code: &mut Vec<u8>, opcode: Opcode, digit: Digit81) {
        code.push(opcode as u8);
        code.extend_from_slice(&digit.to_bytes());
    }

    #[test]
    fn arithmetic_seed_scenario() {
        let mut vm = Vm::new(VmConfig::default());
        let mut code = Vec::new();
        push_bytes(&mut code, Opcode::Push, Digit81::new(0, 0, 5));
        push_bytes(&mut code, Opcode::Push, Digit81::new(0, 0, 7));
        code.push(Opcode::Add as u8);
        code.push(Opcode::Halt as u8);
        vm.load(&code);

        let summary = vm.execute(10);
        assert!(summary.halted);
        assert_eq!(summary.error, None);
        let top = vm.pop().unwrap();
        assert_eq!(top, Operand::Low(Digit81::new(0, 0, 12)));
    }

    #[test]
    fn unknown_opcode_halts_and_leaves_stack_untouched() {
        let mut vm = Vm::new(VmConfig::default());
        vm.load(&[0xAB, Opcode::Halt as u8]);
        let summary = vm.execute(10);
        assert!(summary.halted);
        assert_eq!(summary.error, Some(VmError::UnknownOpcode(0xAB)));
        assert_eq!(vm.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn halted_vm_takes_zero_further_steps() {
        let mut vm = Vm::new(VmConfig::default());
        vm.load(&[Opcode::Halt as u8]);
        vm.execute(10);
        let summary = vm.execute(10);
        assert_eq!(summary.steps, 0);
    }

    #[test]
    fn factorial_seed_scenario() {
        let mut vm = Vm::new(VmConfig::default());
        vm.push(Operand::Mid(BigIntMid::from_i64(5))).unwrap();
        vm.load(&[Opcode::RecurseFact as u8, Opcode::Halt as u8]);
        vm.execute(10);
        let result = vm.pop().unwrap().into_mid().unwrap();
        assert_eq!(result.to_decimal_string(), "120");
    }

    #[test]
    fn snapshot_then_rollback_restores_stack_size() {
        struct SnapshotOnceHook {
            armed: bool,
        }
        impl Hook for SnapshotOnceHook {
            fn observe(&mut self, _opcode: Opcode) {}
            fn read_entropy(&mut self) -> f64 {
                0.0
            }
            fn request_snapshot(&mut self) -> bool {
                std::mem::take(&mut self.armed)
            }
            fn request_rollback(&mut self) -> bool {
                false
            }
        }

        // `delta2: 0` keeps MID from auto-demoting back to LOW right after
        // the explicit PROMOTE_MID below (the automatic rule demotes
        // whenever `depth < delta2`).
        let config = VmConfig {
            delta2: 0,
            ..VmConfig::default()
        };
        let mut vm = Vm::with_hook(config, SnapshotOnceHook { armed: true });
        vm.push(Operand::Mid(BigIntMid::from_i64(1))).unwrap();
        let pre_snapshot_size = 1;
        vm.load(&[Opcode::Nop as u8, Opcode::Halt as u8]);
        vm.execute(1);
        assert_eq!(vm.tier(), Tier::Low);
        assert_eq!(vm.depth(), 0);

        vm.push(Operand::Mid(BigIntMid::from_i64(2))).unwrap();
        vm.push(Operand::Mid(BigIntMid::from_i64(3))).unwrap();
        assert_eq!(vm.stack.len(), 3);

        // Bump depth and explicitly promote the tier so rollback has
        // something to undo besides the stack.
        vm.depth = 1;
        vm.change_tier(Tier::Mid, TierChangeReason::Explicit);
        assert_eq!(vm.tier(), Tier::Mid);
        assert_eq!(vm.depth(), 1);

        vm.rollback().unwrap();
        assert_eq!(vm.stack.len(), pre_snapshot_size);
        assert_eq!(vm.tier(), Tier::Low);
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn tier_promotes_after_enough_calls_with_sufficient_entropy() {
        struct ConstantEntropyHook;
        impl Hook for ConstantEntropyHook {
            fn observe(&mut self, _opcode: Opcode) {}
            fn read_entropy(&mut self) -> f64 {
                0.5
            }
            fn request_snapshot(&mut self) -> bool {
                false
            }
            fn request_rollback(&mut self) -> bool {
                false
            }
        }

        let mut vm = Vm::with_hook(VmConfig::default(), ConstantEntropyHook);
        const CALL_SIZE: u32 = 5;
        let call_count = 12u32;
        let mut code = Vec::new();
        for i in 0..call_count {
            code.push(Opcode::Call as u8);
            let target = (i + 1) * CALL_SIZE;
            code.extend_from_slice(&target.to_be_bytes());
        }
        code.push(Opcode::Halt as u8);
        vm.load(&code);
        vm.execute(200);
        assert_eq!(vm.tier(), Tier::Mid);
    }
}
