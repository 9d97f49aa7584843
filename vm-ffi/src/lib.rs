//! The stable `extern "C"` surface over [`vm_core`]: an opaque VM handle,
//! push/pop/peek, bounded execution, and callback-based hook/event hookup
//! for hosts outside the Rust type system.

pub mod wire;

use std::os::raw::c_void;

use vm_asm::Opcode;
use vm_core::{Event, EventCallback, HaltReason, Hook, Tier, TierChangeReason, Vm, VmConfig, VmError};

pub use wire::{FfiDigit81, FfiOperand, TAG_LOW, TAG_MID, TAG_TOP};

/// Opaque handle returned by [`vm_create`]. Hosts never see the fields.
pub struct VmHandle {
    vm: Vm,
}

/// Mirrors [`VmConfig`] field-for-field for the foreign interface.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiVmConfig {
    pub theta1: u32,
    pub delta1: u32,
    pub delta2: u32,
    pub tensor_window: usize,
    pub stack_capacity: usize,
    pub event_log_capacity: usize,
}

impl From<FfiVmConfig> for VmConfig {
    fn from(config: FfiVmConfig) -> Self {
        VmConfig {
            theta1: config.theta1,
            delta1: config.delta1,
            delta2: config.delta2,
            tensor_window: config.tensor_window,
            stack_capacity: config.stack_capacity,
            event_log_capacity: config.event_log_capacity,
        }
    }
}

/// Maps every [`VmError`] variant to a stable nonzero code. `0` always
/// means success; there is no code `0` variant.
fn error_code(error: VmError) -> i32 {
    match error {
        VmError::StackUnderflow => 1,
        VmError::StackOverflow => 2,
        VmError::DivByZero => 3,
        VmError::TypeError => 4,
        VmError::ShapeMismatch => 5,
        VmError::IndexOutOfRange => 6,
        VmError::RankError => 7,
        VmError::InvalidInput => 8,
        VmError::UnknownOpcode(_) => 9,
        VmError::TruncatedOperand => 10,
        VmError::NoSnapshot => 11,
        VmError::Reentrant => 12,
        VmError::OutOfMemory => 13,
    }
}

fn tier_code(tier: Tier) -> u8 {
    match tier {
        Tier::Low => 0,
        Tier::Mid => 1,
        Tier::Top => 2,
    }
}

/// Result of [`vm_execute`]: the bare step count plus enough of
/// [`vm_core::ExecSummary`] for a host to render a status line without
/// touching the event log.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiExecSummary {
    pub steps: u32,
    pub tier: u8,
    pub halted: bool,
    pub has_error: bool,
    pub error_code: i32,
}

type HookObserveFn = extern "C" fn(user_data: *mut c_void, opcode: u8);
type HookEntropyFn = extern "C" fn(user_data: *mut c_void) -> f64;
type HookBoolFn = extern "C" fn(user_data: *mut c_void) -> bool;

/// Adapts four raw C function pointers plus one `user_data` pointer into a
/// [`Hook`] implementation, the same shape [`vm_set_hook`] receives.
struct CHook {
    user_data: *mut c_void,
    observe: HookObserveFn,
    read_entropy: HookEntropyFn,
    request_snapshot: HookBoolFn,
    request_rollback: HookBoolFn,
}

// SAFETY: the host is responsible for `user_data`'s thread-safety; the VM
// itself never calls a hook from more than one thread at a time.
unsafe impl Send for CHook {}

impl Hook for CHook {
    fn observe(&mut self, opcode: Opcode) {
        (self.observe)(self.user_data, opcode as u8);
    }

    fn read_entropy(&mut self) -> f64 {
        (self.read_entropy)(self.user_data)
    }

    fn request_snapshot(&mut self) -> bool {
        (self.request_snapshot)(self.user_data)
    }

    fn request_rollback(&mut self) -> bool {
        (self.request_rollback)(self.user_data)
    }
}

/// Tag values written into the `kind` field an event callback receives.
pub const EVENT_OPCODE_EXECUTED: u8 = 0;
pub const EVENT_TIER_CHANGED: u8 = 1;
pub const EVENT_SNAPSHOT_TAKEN: u8 = 2;
pub const EVENT_ROLLED_BACK: u8 = 3;
pub const EVENT_HALTED: u8 = 4;

type EventCallbackFn = extern "C" fn(
    user_data: *mut c_void,
    kind: u8,
    ip_or_depth: u64,
    opcode_or_tier: u8,
    extra_tier: u8,
    entropy_or_stack_size: f64,
    has_error: bool,
    error_code: i32,
);

struct CEventCallback {
    user_data: *mut c_void,
    callback: EventCallbackFn,
}

// SAFETY: see CHook.
unsafe impl Send for CEventCallback {}

impl EventCallback for CEventCallback {
    fn on_event(&mut self, event: Event) {
        let call = self.callback;
        match event {
            Event::OpcodeExecuted {
                ip,
                opcode,
                tier_after,
                entropy,
            } => call(
                self.user_data,
                EVENT_OPCODE_EXECUTED,
                ip as u64,
                opcode as u8,
                tier_code(tier_after),
                entropy,
                false,
                0,
            ),
            Event::TierChanged { from, to, reason } => call(
                self.user_data,
                EVENT_TIER_CHANGED,
                0,
                tier_code(from),
                tier_code(to),
                match reason {
                    TierChangeReason::Promote => 0.0,
                    TierChangeReason::Demote => 1.0,
                    TierChangeReason::Explicit => 2.0,
                },
                false,
                0,
            ),
            Event::SnapshotTaken { depth, stack_size } => call(
                self.user_data,
                EVENT_SNAPSHOT_TAKEN,
                depth as u64,
                0,
                0,
                stack_size as f64,
                false,
                0,
            ),
            Event::RolledBack { depth, stack_size } => call(
                self.user_data,
                EVENT_ROLLED_BACK,
                depth as u64,
                0,
                0,
                stack_size as f64,
                false,
                0,
            ),
            Event::Halted { reason, error } => call(
                self.user_data,
                EVENT_HALTED,
                0,
                match reason {
                    HaltReason::Opcode => 0,
                    HaltReason::Error => 1,
                },
                0,
                0.0,
                error.is_some(),
                error.map(error_code).unwrap_or(0),
            ),
        }
    }
}

/// Allocates a VM. The returned pointer is owned by the caller and must be
/// released with [`vm_destroy`].
#[no_mangle]
pub extern "C" fn vm_create(config: FfiVmConfig) -> *mut VmHandle {
    let vm = Vm::new(config.into());
    Box::into_raw(Box::new(VmHandle { vm }))
}

/// Releases a VM created by [`vm_create`]. `handle` must not be used again.
///
/// # Safety
/// `handle` must be a pointer returned by [`vm_create`] and not already
/// freed.
#[no_mangle]
pub unsafe extern "C" fn vm_destroy(handle: *mut VmHandle) {
    if handle.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(handle) });
}

/// Loads bytecode, resetting the instruction pointer and halted flag.
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]; `code` must be valid
/// for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn vm_load(handle: *mut VmHandle, code: *const u8, len: usize) {
    let handle = unsafe { &mut *handle };
    let bytes = unsafe { std::slice::from_raw_parts(code, len) };
    handle.vm.load(bytes);
}

/// Pushes an operand. Returns `0` on success, or a positive error code from
/// [`error_code`] on failure (the only possible failure is stack overflow).
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]; if `operand.tag` is
/// MID or TOP, `operand.payload` must be valid for `operand.payload_len`
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn vm_push(handle: *mut VmHandle, operand: FfiOperand) -> i32 {
    let handle = unsafe { &mut *handle };
    let decoded = match unsafe { wire::decode(&operand) } {
        Ok(value) => value,
        Err(error) => return error_code(error),
    };
    match handle.vm.push(decoded) {
        Ok(()) => 0,
        Err(error) => error_code(error),
    }
}

/// Pops an operand into `*out`. Returns `0` on success; on failure `*out`
/// is left untouched. MID/TOP results allocate a payload the caller must
/// release with [`vm_free_operand_payload`].
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]; `out` must be valid
/// for writes.
#[no_mangle]
pub unsafe extern "C" fn vm_pop(handle: *mut VmHandle, out: *mut FfiOperand) -> i32 {
    let handle = unsafe { &mut *handle };
    match handle.vm.pop() {
        Ok(operand) => {
            unsafe { *out = wire::encode(&operand) };
            0
        }
        Err(error) => error_code(error),
    }
}

/// Reads the top operand without removing it. Same allocation contract as
/// [`vm_pop`].
///
/// # Safety
/// Same as [`vm_pop`].
#[no_mangle]
pub unsafe extern "C" fn vm_peek(handle: *mut VmHandle, out: *mut FfiOperand) -> i32 {
    let handle = unsafe { &mut *handle };
    match handle.vm.peek() {
        Ok(operand) => {
            unsafe { *out = wire::encode(operand) };
            0
        }
        Err(error) => error_code(error),
    }
}

/// Releases a payload buffer produced by [`wire::encode`] (via `vm_pop` or
/// `vm_peek`). Safe to call with a null pointer.
///
/// # Safety
/// `payload` must either be null or a pointer previously returned inside an
/// `FfiOperand` whose payload has not already been freed, and `len` must
/// match the length that operand carried.
#[no_mangle]
pub unsafe extern "C" fn vm_free_operand_payload(payload: *mut u8, len: usize) {
    if payload.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(payload, len)) });
}

/// Runs at most `max_steps` opcodes and reports the outcome in `*out`.
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]; `out` must be valid
/// for writes.
#[no_mangle]
pub unsafe extern "C" fn vm_execute(
    handle: *mut VmHandle,
    max_steps: u32,
    out: *mut FfiExecSummary,
) {
    let handle = unsafe { &mut *handle };
    let summary = handle.vm.execute(max_steps);
    unsafe {
        *out = FfiExecSummary {
            steps: summary.steps,
            tier: tier_code(summary.tier),
            halted: summary.halted,
            has_error: summary.error.is_some(),
            error_code: summary.error.map(error_code).unwrap_or(0),
        };
    }
}

/// Registers an event callback, replacing any previously registered one.
/// Pass a null `callback` to clear it.
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]. `user_data` must
/// remain valid for as long as the callback is registered.
#[no_mangle]
pub unsafe extern "C" fn vm_set_event_callback(
    handle: *mut VmHandle,
    callback: Option<EventCallbackFn>,
    user_data: *mut c_void,
) {
    let handle = unsafe { &mut *handle };
    match callback {
        Some(callback) => handle
            .vm
            .set_event_callback(Box::new(CEventCallback { user_data, callback })),
        None => handle.vm.set_event_callback(Box::new(|_event: Event| {})),
    }
}

/// Swaps in a new optimizer collaborator made of four C function pointers
/// over a shared `user_data`, replacing whatever hook (native or foreign)
/// was previously installed.
///
/// # Safety
/// `handle` must be a live pointer from [`vm_create`]. `user_data` must
/// remain valid for as long as the hook is installed.
#[no_mangle]
pub unsafe extern "C" fn vm_set_hook(
    handle: *mut VmHandle,
    observe: HookObserveFn,
    read_entropy: HookEntropyFn,
    request_snapshot: HookBoolFn,
    request_rollback: HookBoolFn,
    user_data: *mut c_void,
) {
    let handle = unsafe { &mut *handle };
    handle.vm.set_hook(CHook {
        user_data,
        observe,
        read_entropy,
        request_snapshot,
        request_rollback,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_void;

    #[test]
    fn create_load_execute_destroy_round_trips() {
        unsafe {
            let handle = vm_create(FfiVmConfig {
                theta1: 10,
                delta1: 5,
                delta2: 2,
                tensor_window: 3,
                stack_capacity: 2187,
                event_log_capacity: 256,
            });

            let code = [
                vm_asm::Opcode::Push as u8,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                5,
                vm_asm::Opcode::Push as u8,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                0,
                7,
                vm_asm::Opcode::Add as u8,
                vm_asm::Opcode::Halt as u8,
            ];
            vm_load(handle, code.as_ptr(), code.len());

            let mut summary = std::mem::zeroed();
            vm_execute(handle, 10, &mut summary);
            assert!(summary.halted);
            assert!(!summary.has_error);

            let mut out = std::mem::zeroed();
            assert_eq!(vm_pop(handle, &mut out), 0);
            assert_eq!(out.tag, TAG_LOW);
            assert_eq!(out.low.c, 12);

            vm_destroy(handle);
        }
    }

    extern "C" fn constant_entropy(_user_data: *mut c_void) -> f64 {
        0.0
    }
    extern "C" fn no_observe(_user_data: *mut c_void, _opcode: u8) {}
    extern "C" fn never(_user_data: *mut c_void) -> bool {
        false
    }

    #[test]
    fn set_hook_replaces_the_installed_collaborator() {
        unsafe {
            let handle = vm_create(FfiVmConfig {
                theta1: 10,
                delta1: 5,
                delta2: 2,
                tensor_window: 3,
                stack_capacity: 2187,
                event_log_capacity: 256,
            });
            vm_set_hook(
                handle,
                no_observe,
                constant_entropy,
                never,
                never,
                std::ptr::null_mut(),
            );
            vm_load(handle, [vm_asm::Opcode::Halt as u8].as_ptr(), 1);
            let mut summary = std::mem::zeroed();
            vm_execute(handle, 1, &mut summary);
            assert!(summary.halted);
            vm_destroy(handle);
        }
    }
}
