use vm_asm::{Digit81, Opcode};
use vm_core::{BigIntMid, Operand, Tensor, Tier, VmConfig, Vm};

fn push_digit(code: &mut Vec<u8>, digit: Digit81) {
    code.push(Opcode::Push as u8);
    code.extend_from_slice(&digit.to_bytes());
}

#[test]
fn arithmetic_adds_two_low_operands() {
    let mut vm = Vm::new(VmConfig::default());
    let mut code = Vec::new();
    push_digit(&mut code, Digit81::new(0, 0, 5));
    push_digit(&mut code, Digit81::new(0, 0, 7));
    code.push(Opcode::Add as u8);
    code.push(Opcode::Halt as u8);
    vm.load(&code);

    let summary = vm.execute(10);
    assert!(summary.halted);
    assert_eq!(summary.error, None);
    assert_eq!(vm.pop().unwrap(), Operand::Low(Digit81::new(0, 0, 12)));
}

#[test]
fn factorial_of_five_is_120() {
    let mut vm = Vm::new(VmConfig::default());
    vm.push(Operand::Mid(BigIntMid::from_i64(5))).unwrap();
    vm.load(&[Opcode::RecurseFact as u8, Opcode::Halt as u8]);
    vm.execute(10);
    let result = vm.pop().unwrap().into_mid().unwrap();
    assert_eq!(result.to_decimal_string(), "120");
}

#[test]
fn factorial_boundary_cases() {
    for (n, expected) in [(0i64, "1"), (1, "1")] {
        let mut vm = Vm::new(VmConfig::default());
        vm.push(Operand::Mid(BigIntMid::from_i64(n))).unwrap();
        vm.load(&[Opcode::RecurseFact as u8, Opcode::Halt as u8]);
        vm.execute(10);
        assert_eq!(
            vm.pop().unwrap().into_mid().unwrap().to_decimal_string(),
            expected
        );
    }
}

#[test]
fn tensor_contraction_matches_matrix_product() {
    let mut vm = Vm::new(VmConfig::default());
    let a = Tensor::new(
        vec![2, 2],
        vec![1, 2, 3, 4].into_iter().map(BigIntMid::from_i64).collect(),
    )
    .unwrap();
    let b = Tensor::new(
        vec![2, 2],
        vec![5, 6, 7, 8].into_iter().map(BigIntMid::from_i64).collect(),
    )
    .unwrap();
    vm.push(Operand::Top(a)).unwrap();
    vm.push(Operand::Top(b)).unwrap();
    vm.load(&[Opcode::T729Dot as u8, Opcode::Halt as u8]);
    vm.execute(10);

    let result = vm.pop().unwrap();
    let Operand::Top(result) = result else {
        panic!("expected a TOP operand");
    };
    assert_eq!(result.shape(), &[2, 2]);
    let expected = ["19", "22", "43", "50"];
    for (element, want) in result.elements().iter().zip(expected) {
        assert_eq!(element.to_decimal_string(), want);
    }
}

#[test]
fn unknown_opcode_halts_with_error_and_leaves_stack_untouched() {
    let mut vm = Vm::new(VmConfig::default());
    vm.load(&[0xAB, Opcode::Halt as u8]);
    let summary = vm.execute(10);
    assert!(summary.halted);
    assert!(summary.error.is_some());
    assert_eq!(vm.pop(), Err(vm_core::VmError::StackUnderflow));
}

#[test]
fn tier_promotes_from_low_to_mid_under_constant_entropy() {
    use vm_core::Hook;

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
    let mut code = Vec::new();
    for i in 0..12u32 {
        code.push(Opcode::Call as u8);
        code.extend_from_slice(&((i + 1) * CALL_SIZE).to_be_bytes());
    }
    code.push(Opcode::Halt as u8);
    vm.load(&code);
    vm.execute(200);
    assert_eq!(vm.tier(), Tier::Mid);
}

#[test]
fn halted_vm_returns_zero_steps_on_next_execute() {
    let mut vm = Vm::new(VmConfig::default());
    vm.load(&[Opcode::Halt as u8]);
    vm.execute(10);
    let second = vm.execute(10);
    assert_eq!(second.steps, 0);
}
