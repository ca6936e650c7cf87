// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the adcodegen project (compiled derivative kernels).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Highest derivative a model is compiled for.
///
/// Ordered: `Zero < First < Second`. Requesting `Second` always produces the
/// first-order kernel as well.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeOrder {
    /// Function values only.
    #[default]
    Zero,
    /// Values and Jacobian.
    First,
    /// Values, Jacobian and Hessian.
    Second,
}

impl DerivativeOrder {
    pub fn as_u8(self) -> u8 {
        match self {
            DerivativeOrder::Zero => 0,
            DerivativeOrder::First => 1,
            DerivativeOrder::Second => 2,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(DerivativeOrder::Zero),
            1 => Some(DerivativeOrder::First),
            2 => Some(DerivativeOrder::Second),
            _ => None,
        }
    }

    pub fn includes_jacobian(self) -> bool {
        self >= DerivativeOrder::First
    }

    pub fn includes_hessian(self) -> bool {
        self >= DerivativeOrder::Second
    }
}

impl fmt::Display for DerivativeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivativeOrder::Zero => write!(f, "zero"),
            DerivativeOrder::First => write!(f, "first"),
            DerivativeOrder::Second => write!(f, "second"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown derivative order '{0}' (expected zero|first|second or 0|1|2)")]
pub struct ParseOrderError(pub String);

impl FromStr for DerivativeOrder {
    type Err = ParseOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "zero" | "none" => Ok(DerivativeOrder::Zero),
            "1" | "first" => Ok(DerivativeOrder::First),
            "2" | "second" => Ok(DerivativeOrder::Second),
            other => Err(ParseOrderError(other.to_string())),
        }
    }
}

/// Derivative facilities a loaded artifact actually provides.
///
/// Discovered from the artifact at load time, never recomputed from a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    ValueOnly,
    ValueAndJacobian,
    ValueJacobianAndHessian,
}

impl Capability {
    pub fn supports(self, order: DerivativeOrder) -> bool {
        self.order() >= order
    }

    pub fn order(self) -> DerivativeOrder {
        match self {
            Capability::ValueOnly => DerivativeOrder::Zero,
            Capability::ValueAndJacobian => DerivativeOrder::First,
            Capability::ValueJacobianAndHessian => DerivativeOrder::Second,
        }
    }
}

impl From<DerivativeOrder> for Capability {
    fn from(order: DerivativeOrder) -> Self {
        match order {
            DerivativeOrder::Zero => Capability::ValueOnly,
            DerivativeOrder::First => Capability::ValueAndJacobian,
            DerivativeOrder::Second => Capability::ValueJacobianAndHessian,
        }
    }
}
