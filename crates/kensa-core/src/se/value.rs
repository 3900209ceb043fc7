//! Abstract value lattice
//!
//! Each abstract value stands for a set of concrete runtime categories.
//! Only the named tags are representable. The tag family is closed under
//! intersection, so any set of categories widens to exactly one smallest tag
//! and merging is the join of a closure operator.

use std::fmt;
use std::str::FromStr;

const NULL: u8 = 1;
const UNDEFINED: u8 = 1 << 1;
const FALSE: u8 = 1 << 2;
/// `0`, `NaN` and `""`.
const OTHER_FALSY: u8 = 1 << 3;
const TRUE: u8 = 1 << 4;
const OTHER_TRUTHY: u8 = 1 << 5;
const ALL: u8 = NULL | UNDEFINED | FALSE | OTHER_FALSY | TRUE | OTHER_TRUTHY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbstractValue {
    Undefined,
    Null,
    UndefinedOrNull,
    /// Falsy but neither `null` nor `undefined`: `false`, `0`, `NaN`, `""`.
    Nully,
    True,
    False,
    Truthy,
    Falsy,
    Boolean,
    NotNull,
    Unknown,
}

/// Tags ordered by the number of categories they cover, so the first
/// superset found is the smallest one.
const BY_SIZE: [AbstractValue; 11] = [
    AbstractValue::Undefined,
    AbstractValue::Null,
    AbstractValue::True,
    AbstractValue::False,
    AbstractValue::UndefinedOrNull,
    AbstractValue::Nully,
    AbstractValue::Truthy,
    AbstractValue::Boolean,
    AbstractValue::Falsy,
    AbstractValue::NotNull,
    AbstractValue::Unknown,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Truthiness {
    AlwaysTrue,
    AlwaysFalse,
    Unknown,
}

/// A set of runtime categories a value is known to belong to on a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint(u8);

impl Constraint {
    pub const ANY: Constraint = Constraint(ALL);
    pub const TRUTHY: Constraint = Constraint(TRUE | OTHER_TRUTHY);
    pub const FALSY: Constraint = Constraint(NULL | UNDEFINED | FALSE | OTHER_FALSY);
    pub const NULLISH: Constraint = Constraint(NULL | UNDEFINED);
    pub const NOT_NULLISH: Constraint = Constraint(FALSE | OTHER_FALSY | TRUE | OTHER_TRUTHY);
    pub const NULL: Constraint = Constraint(NULL);
    pub const UNDEFINED: Constraint = Constraint(UNDEFINED);

    pub fn complement(self) -> Constraint {
        Constraint(!self.0 & ALL)
    }

    pub fn intersect(self, other: Constraint) -> Constraint {
        Constraint(self.0 & other.0)
    }

    pub fn admits(self, value: AbstractValue) -> bool {
        value.bits() & self.0 != 0
    }
}

impl AbstractValue {
    pub fn all() -> impl Iterator<Item = AbstractValue> {
        BY_SIZE.iter().copied()
    }

    fn bits(self) -> u8 {
        match self {
            AbstractValue::Undefined => UNDEFINED,
            AbstractValue::Null => NULL,
            AbstractValue::UndefinedOrNull => NULL | UNDEFINED,
            AbstractValue::Nully => FALSE | OTHER_FALSY,
            AbstractValue::True => TRUE,
            AbstractValue::False => FALSE,
            AbstractValue::Truthy => TRUE | OTHER_TRUTHY,
            AbstractValue::Falsy => NULL | UNDEFINED | FALSE | OTHER_FALSY,
            AbstractValue::Boolean => TRUE | FALSE,
            AbstractValue::NotNull => FALSE | OTHER_FALSY | TRUE | OTHER_TRUTHY,
            AbstractValue::Unknown => ALL,
        }
    }

    /// Smallest tag covering every category in `bits`, or `None` when the
    /// set is empty.
    fn from_bits(bits: u8) -> Option<AbstractValue> {
        if bits == 0 {
            return None;
        }
        BY_SIZE
            .iter()
            .copied()
            .find(|tag| bits & !tag.bits() == 0)
    }

    pub fn merge(self, other: AbstractValue) -> AbstractValue {
        Self::from_bits(self.bits() | other.bits()).unwrap_or(AbstractValue::Unknown)
    }

    /// Restricts the value to the categories allowed by `constraint`.
    /// `None` means no concrete value survives, so the branch is infeasible.
    pub fn narrow(self, constraint: Constraint) -> Option<AbstractValue> {
        Self::from_bits(self.bits() & constraint.0)
    }

    pub fn is_null_or_undefined(self) -> bool {
        self.bits() & !(NULL | UNDEFINED) == 0
    }

    pub fn truthiness(self) -> Truthiness {
        let bits = self.bits();
        if bits & !Constraint::TRUTHY.0 == 0 {
            Truthiness::AlwaysTrue
        } else if bits & !Constraint::FALSY.0 == 0 {
            Truthiness::AlwaysFalse
        } else {
            Truthiness::Unknown
        }
    }

    pub fn from_bool(value: bool) -> AbstractValue {
        if value {
            AbstractValue::True
        } else {
            AbstractValue::False
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AbstractValue::Undefined => "UNDEFINED",
            AbstractValue::Null => "NULL",
            AbstractValue::UndefinedOrNull => "UNDEFINED_OR_NULL",
            AbstractValue::Nully => "NULLY",
            AbstractValue::True => "TRUE",
            AbstractValue::False => "FALSE",
            AbstractValue::Truthy => "TRUTHY",
            AbstractValue::Falsy => "FALSY",
            AbstractValue::Boolean => "BOOLEAN",
            AbstractValue::NotNull => "NOT_NULL",
            AbstractValue::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown abstract value '{0}'")]
pub struct UnknownValueError(pub String);

impl FromStr for AbstractValue {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbstractValue::all()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownValueError(s.to_string()))
    }
}
