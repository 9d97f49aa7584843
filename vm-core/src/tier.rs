//! The tier state machine: promotion/demotion rules driven by recursion
//! depth and the hook's entropy scalar.

use crate::config::VmConfig;

/// The VM's current operating mode; distinct from an [`crate::operand::Operand`]'s
/// tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Low,
    Mid,
    Top,
}

/// Why a [`crate::event::Event::TierChanged`] happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierChangeReason {
    Promote,
    Demote,
    Explicit,
}

/// Everything the automatic transition rules need to know about the most
/// recently dispatched opcode and the VM's running state.
pub struct TierInputs {
    pub depth: u32,
    pub entropy: f64,
    pub last_op_was_tensor: bool,
    pub tensor_op_in_window: bool,
}

/// Evaluates the promotion/demotion table after one dispatched opcode.
/// Returns `Some((next_tier, reason))` if a transition fires, `None`
/// otherwise. Never demotes and promotes in the same call; at most one
/// step of the state machine applies per opcode.
pub fn evaluate_automatic_transition(
    tier: Tier,
    inputs: &TierInputs,
    config: &VmConfig,
) -> Option<(Tier, TierChangeReason)> {
    match tier {
        Tier::Low => {
            if inputs.depth > config.theta1 && inputs.entropy >= 0.2 {
                Some((Tier::Mid, TierChangeReason::Promote))
            } else {
                None
            }
        }
        Tier::Mid => {
            if inputs.last_op_was_tensor || inputs.entropy >= 0.6 {
                Some((Tier::Top, TierChangeReason::Promote))
            } else if inputs.depth < config.delta2 {
                Some((Tier::Low, TierChangeReason::Demote))
            } else {
                None
            }
        }
        Tier::Top => {
            if inputs.depth < config.delta1 && !inputs.tensor_op_in_window {
                Some((Tier::Mid, TierChangeReason::Demote))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VmConfig {
        VmConfig::default()
    }

    #[test]
    fn low_promotes_past_theta1_with_sufficient_entropy() {
        let inputs = TierInputs {
            depth: 11,
            entropy: 0.5,
            last_op_was_tensor: false,
            tensor_op_in_window: false,
        };
        assert_eq!(
            evaluate_automatic_transition(Tier::Low, &inputs, &config()),
            Some((Tier::Mid, TierChangeReason::Promote))
        );
    }

    #[test]
    fn low_does_not_promote_with_low_entropy() {
        let inputs = TierInputs {
            depth: 11,
            entropy: 0.1,
            last_op_was_tensor: false,
            tensor_op_in_window: false,
        };
        assert_eq!(
            evaluate_automatic_transition(Tier::Low, &inputs, &config()),
            None
        );
    }

    #[test]
    fn mid_promotes_to_top_on_tensor_op() {
        let inputs = TierInputs {
            depth: 0,
            entropy: 0.0,
            last_op_was_tensor: true,
            tensor_op_in_window: true,
        };
        assert_eq!(
            evaluate_automatic_transition(Tier::Mid, &inputs, &config()),
            Some((Tier::Top, TierChangeReason::Promote))
        );
    }

    #[test]
    fn top_demotes_to_mid_once_window_is_clear() {
        let inputs = TierInputs {
            depth: 1,
            entropy: 0.0,
            last_op_was_tensor: false,
            tensor_op_in_window: false,
        };
        assert_eq!(
            evaluate_automatic_transition(Tier::Top, &inputs, &config()),
            Some((Tier::Mid, TierChangeReason::Demote))
        );
    }

    #[test]
    fn top_stays_while_tensor_op_in_window() {
        let inputs = TierInputs {
            depth: 1,
            entropy: 0.0,
            last_op_was_tensor: false,
            tensor_op_in_window: true,
        };
        assert_eq!(
            evaluate_automatic_transition(Tier::Top, &inputs, &config()),
            None
        );
    }
}
