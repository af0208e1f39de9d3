// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::model::object::{StringId, SubnetId};

/// Upper bound on the fan-in of variadic built-in cells.
pub const MAX_ARITY: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellSymbol {
    In,
    Out,
    Zero,
    One,
    Buf,
    Not,
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
    Maj,
    /// Composite or library cell; semantics come from its implementing
    /// subnet.
    Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellProperties {
    pub combinational: bool,
    pub constant: bool,
    pub identity: bool,
    pub commutative: bool,
    pub associative: bool,
    pub regroupable: bool,
    pub negative: bool,
}

impl CellSymbol {
    /// Built-in symbols in registration order.
    pub const BUILTINS: [CellSymbol; 13] = [
        CellSymbol::In,
        CellSymbol::Out,
        CellSymbol::Zero,
        CellSymbol::One,
        CellSymbol::Buf,
        CellSymbol::Not,
        CellSymbol::And,
        CellSymbol::Or,
        CellSymbol::Xor,
        CellSymbol::Nand,
        CellSymbol::Nor,
        CellSymbol::Xnor,
        CellSymbol::Maj,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CellSymbol::In => "in",
            CellSymbol::Out => "out",
            CellSymbol::Zero => "zero",
            CellSymbol::One => "one",
            CellSymbol::Buf => "buf",
            CellSymbol::Not => "not",
            CellSymbol::And => "and",
            CellSymbol::Or => "or",
            CellSymbol::Xor => "xor",
            CellSymbol::Nand => "nand",
            CellSymbol::Nor => "nor",
            CellSymbol::Xnor => "xnor",
            CellSymbol::Maj => "maj",
            CellSymbol::Cell => "cell",
        }
    }

    pub fn arity_bounds(self) -> (u16, u16) {
        match self {
            CellSymbol::In | CellSymbol::Zero | CellSymbol::One => (0, 0),
            CellSymbol::Out | CellSymbol::Buf | CellSymbol::Not => (1, 1),
            CellSymbol::And
            | CellSymbol::Or
            | CellSymbol::Xor
            | CellSymbol::Nand
            | CellSymbol::Nor
            | CellSymbol::Xnor => (2, MAX_ARITY),
            CellSymbol::Maj => (3, MAX_ARITY),
            CellSymbol::Cell => (0, MAX_ARITY),
        }
    }

    pub fn properties(self) -> CellProperties {
        let base = CellProperties {
            combinational: self != CellSymbol::In,
            ..CellProperties::default()
        };
        match self {
            CellSymbol::Zero | CellSymbol::One => CellProperties {
                constant: true,
                ..base
            },
            CellSymbol::Out | CellSymbol::Buf => CellProperties {
                identity: true,
                ..base
            },
            CellSymbol::Not => CellProperties {
                negative: true,
                ..base
            },
            CellSymbol::And | CellSymbol::Or | CellSymbol::Xor => CellProperties {
                commutative: true,
                associative: true,
                regroupable: true,
                ..base
            },
            CellSymbol::Nand | CellSymbol::Nor | CellSymbol::Xnor => CellProperties {
                commutative: true,
                negative: true,
                ..base
            },
            CellSymbol::Maj => CellProperties {
                commutative: true,
                ..base
            },
            CellSymbol::In | CellSymbol::Cell => base,
        }
    }

    /// Positive counterpart of a negative symbol; the inversion moves onto
    /// the output link.
    pub fn positive(self) -> (CellSymbol, bool) {
        match self {
            CellSymbol::Not => (CellSymbol::Buf, true),
            CellSymbol::Nand => (CellSymbol::And, true),
            CellSymbol::Nor => (CellSymbol::Or, true),
            CellSymbol::Xnor => (CellSymbol::Xor, true),
            other => (other, false),
        }
    }

    pub fn is_const(self) -> bool {
        matches!(self, CellSymbol::Zero | CellSymbol::One)
    }

    pub fn from_name(name: &str) -> Option<CellSymbol> {
        CellSymbol::BUILTINS.into_iter().find(|s| s.name() == name)
    }
}

/// Cost attributes of a library cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellAttrs {
    pub area: f32,
    /// Input-to-output delay per input pin.
    pub delay: Vec<f32>,
    pub rise_power: Vec<f32>,
    pub fall_power: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellType {
    pub name: StringId,
    pub symbol: CellSymbol,
    pub in_min: u16,
    pub in_max: u16,
    pub out_num: u16,
    pub props: CellProperties,
    pub impl_subnet: Option<SubnetId>,
    pub attrs: Option<CellAttrs>,
}

impl CellType {
    pub fn is_in(&self) -> bool {
        self.symbol == CellSymbol::In
    }

    pub fn is_out(&self) -> bool {
        self.symbol == CellSymbol::Out
    }

    pub fn is_const(&self) -> bool {
        self.props.constant
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        (self.in_min as usize) <= arity && arity <= (self.in_max as usize)
    }
}
