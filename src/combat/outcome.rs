//! Graded skill checks and opposed outcomes

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Trivial,
    Easy,
    Normal,
    Hard,
    VeryHard,
    Extreme,
}

impl Difficulty {
    /// Added to the skill value before rolling
    pub fn modifier(&self) -> f32 {
        match self {
            Difficulty::Trivial => 30.0,
            Difficulty::Easy => 15.0,
            Difficulty::Normal => 0.0,
            Difficulty::Hard => -15.0,
            Difficulty::VeryHard => -30.0,
            Difficulty::Extreme => -45.0,
        }
    }
}

/// Result of a single graded check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckOutcome {
    Fumble,
    Failure,
    MarginalFailure,
    MarginalSuccess,
    Success,
    Critical,
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CheckOutcome::MarginalSuccess | CheckOutcome::Success | CheckOutcome::Critical
        )
    }

    /// Signed degree, -3 (fumble) to 3 (critical)
    pub fn degree(&self) -> i8 {
        match self {
            CheckOutcome::Fumble => -3,
            CheckOutcome::Failure => -2,
            CheckOutcome::MarginalFailure => -1,
            CheckOutcome::MarginalSuccess => 1,
            CheckOutcome::Success => 2,
            CheckOutcome::Critical => 3,
        }
    }
}

/// Roll percentile against `skill` adjusted by difficulty.
///
/// The target is clamped to 5..=95 so nothing is ever certain.
pub fn skill_check(rng: &mut dyn RngCore, skill: f32, difficulty: Difficulty) -> CheckOutcome {
    let target = (skill + difficulty.modifier()).clamp(5.0, 95.0) as i32;
    let roll = rng::percentile(rng) as i32;
    if roll <= target {
        let margin = target - roll;
        if roll <= 3 || margin >= 50 {
            CheckOutcome::Critical
        } else if margin >= 20 {
            CheckOutcome::Success
        } else {
            CheckOutcome::MarginalSuccess
        }
    } else {
        let margin = roll - target;
        if roll >= 98 || margin >= 50 {
            CheckOutcome::Fumble
        } else if margin >= 20 {
            CheckOutcome::Failure
        } else {
            CheckOutcome::MarginalFailure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Attacker,
    Defender,
    Stalemate,
}

/// Attacker-versus-defender result with its severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpposedOutcome {
    pub direction: Direction,
    /// 0-3
    pub degree: u8,
}

impl OpposedOutcome {
    pub fn attacker(degree: u8) -> Self {
        Self {
            direction: Direction::Attacker,
            degree: degree.min(3),
        }
    }

    pub fn defender(degree: u8) -> Self {
        Self {
            direction: Direction::Defender,
            degree: degree.min(3),
        }
    }

    pub fn stalemate() -> Self {
        Self {
            direction: Direction::Stalemate,
            degree: 0,
        }
    }

    /// Compare an attack check against a defense check
    pub fn from_checks(attack: CheckOutcome, defense: CheckOutcome) -> Self {
        let diff = attack.degree() - defense.degree();
        if diff > 0 {
            Self::attacker(diff as u8)
        } else if diff < 0 {
            Self::defender((-diff) as u8)
        } else {
            Self::stalemate()
        }
    }

    pub fn favors_defender(&self) -> bool {
        self.direction == Direction::Defender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_low_roll_is_critical() {
        let outcome = skill_check(&mut StepRng::new(0, 0), 10.0, Difficulty::Extreme);
        assert_eq!(outcome, CheckOutcome::Critical);
    }

    #[test]
    fn test_high_roll_is_fumble() {
        let outcome = skill_check(&mut StepRng::new(u64::MAX, 0), 100.0, Difficulty::Trivial);
        assert_eq!(outcome, CheckOutcome::Fumble);
    }

    #[test]
    fn test_degrees_are_symmetric() {
        assert_eq!(CheckOutcome::Critical.degree(), -CheckOutcome::Fumble.degree());
        assert!(!CheckOutcome::MarginalFailure.is_success());
        assert!(CheckOutcome::MarginalSuccess.is_success());
    }

    #[test]
    fn test_opposed_from_checks() {
        let o = OpposedOutcome::from_checks(CheckOutcome::Critical, CheckOutcome::MarginalSuccess);
        assert_eq!(o, OpposedOutcome::attacker(2));
        let o = OpposedOutcome::from_checks(CheckOutcome::Failure, CheckOutcome::Success);
        assert!(o.favors_defender());
        assert_eq!(o.degree, 3);
        let o = OpposedOutcome::from_checks(CheckOutcome::Success, CheckOutcome::Success);
        assert_eq!(o.direction, Direction::Stalemate);
    }

    #[test]
    fn test_seeded_checks_reproduce() {
        let mut a = rng::seeded(9);
        let mut b = rng::seeded(9);
        for _ in 0..20 {
            assert_eq!(
                skill_check(&mut a, 50.0, Difficulty::Normal),
                skill_check(&mut b, 50.0, Difficulty::Normal)
            );
        }
    }
}
