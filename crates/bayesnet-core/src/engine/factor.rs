//! # Factors
//!
//! A factor maps every joint state of its scope to a non-negative real. Values
//! are stored densely in row-major order: the last scope variable varies
//! fastest, so the flat index of an assignment `(s_0, .., s_{k-1})` is
//! `Σ s_i · stride_i` with `stride_{k-1} = 1` and
//! `stride_i = stride_{i+1} · card_{i+1}`.
//!
//! All operations are pure and return new factors. Every table walk goes
//! through [`walk`], an odometer over one scope that keeps two flat offsets in
//! step with it. A variable missing from a table contributes stride zero, so
//! one loop serves product, summation, restriction, and permutation.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};

use crate::engine::errors::FactorError;
use crate::engine::variable::VarId;

/// Ordered variable list of a factor.
pub type Scope = SmallVec<[VarId; 8]>;

type Dims = SmallVec<[usize; 8]>;

/// Dense non-negative table over the joint states of a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: Scope,
    cardinalities: Dims,
    values: Vec<f64>,
}

impl Factor {
    /// Builds a factor from `(variable, cardinality)` pairs and a row-major
    /// table.
    ///
    /// Fails if a variable repeats, a cardinality is zero, the cardinalities
    /// multiply past `usize`, the table length is not their product, or an
    /// entry is negative or non-finite.
    pub fn new(
        scope: impl IntoIterator<Item = (VarId, usize)>,
        values: Vec<f64>,
    ) -> Result<Self, FactorError> {
        let mut vars = Scope::new();
        let mut cards = Dims::new();
        for (var, card) in scope {
            if vars.contains(&var) {
                return Err(FactorError::DuplicateScopeVariable(var.0));
            }
            if card == 0 {
                return Err(FactorError::ZeroCardinality(var.0));
            }
            vars.push(var);
            cards.push(card);
        }
        let factor = Self {
            scope: vars,
            cardinalities: cards,
            values,
        };
        factor.check()?;
        Ok(factor)
    }

    /// The multiplicative identity: empty scope, single entry `1.0`.
    pub fn unit() -> Self {
        Self {
            scope: Scope::new(),
            cardinalities: Dims::new(),
            values: vec![1.0],
        }
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Number of table entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.scope.contains(&var)
    }

    pub fn cardinality_of(&self, var: VarId) -> Option<usize> {
        self.position(var).map(|pos| self.cardinalities[pos])
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Row-major strides of the scope.
    pub fn strides(&self) -> SmallVec<[usize; 8]> {
        row_major_strides(&self.cardinalities)
    }

    /// Flat index of a joint assignment given in scope order.
    pub fn index_of(&self, assignment: &[usize]) -> Option<usize> {
        if assignment.len() != self.scope.len() {
            return None;
        }
        let mut index = 0;
        for ((&state, &card), stride) in assignment
            .iter()
            .zip(self.cardinalities.iter())
            .zip(self.strides())
        {
            if state >= card {
                return None;
            }
            index += state * stride;
        }
        Some(index)
    }

    /// Joint assignment (scope order) of a flat index.
    pub fn assignment_of(&self, index: usize) -> Option<SmallVec<[usize; 8]>> {
        if index >= self.values.len() {
            return None;
        }
        let mut assignment: SmallVec<[usize; 8]> = smallvec![0; self.scope.len()];
        let mut rest = index;
        for dim in (0..self.scope.len()).rev() {
            assignment[dim] = rest % self.cardinalities[dim];
            rest /= self.cardinalities[dim];
        }
        Some(assignment)
    }

    /// Value at a joint assignment given in scope order.
    pub fn value(&self, assignment: &[usize]) -> Option<f64> {
        self.index_of(assignment).map(|idx| self.values[idx])
    }

    /// Verifies the table against the declared scope.
    pub fn check(&self) -> Result<(), FactorError> {
        let expected = table_len(&self.cardinalities).ok_or(FactorError::TableTooLarge)?;
        if self.values.len() != expected {
            return Err(FactorError::MalformedTable {
                expected,
                found: self.values.len(),
            });
        }
        if let Some((index, &value)) = self
            .values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(FactorError::InvalidEntry { index, value });
        }
        Ok(())
    }

    /// Fixes every observed scope variable to its state and drops it.
    ///
    /// The remaining scope keeps its original relative order. A factor with no
    /// observed variable in scope is returned unchanged.
    pub fn restrict(&self, observed: &FxHashMap<VarId, usize>) -> Result<Factor, FactorError> {
        let strides = self.strides();
        let mut base = 0;
        let mut scope = Scope::new();
        let mut cards = Dims::new();
        let mut kept_strides = Dims::new();
        for (pos, &var) in self.scope.iter().enumerate() {
            let card = self.cardinalities[pos];
            match observed.get(&var) {
                Some(&state) if state >= card => {
                    return Err(FactorError::StateOutOfRange {
                        var: var.0,
                        state,
                        cardinality: card,
                    });
                }
                Some(&state) => base += state * strides[pos],
                None => {
                    scope.push(var);
                    cards.push(card);
                    kept_strides.push(strides[pos]);
                }
            }
        }
        if scope.len() == self.scope.len() {
            return Ok(self.clone());
        }

        let unused: Dims = smallvec![0; cards.len()];
        let mut values = Vec::with_capacity(table_len(&cards).ok_or(FactorError::TableTooLarge)?);
        walk(&cards, &kept_strides, &unused, |src, _| {
            values.push(self.values[base + src])
        });
        Ok(Factor {
            scope,
            cardinalities: cards,
            values,
        })
    }

    /// Pointwise product over the union scope.
    ///
    /// The union keeps `self`'s variables first, then `other`'s new ones in
    /// their order of appearance.
    pub fn multiply(&self, other: &Factor) -> Result<Factor, FactorError> {
        self.check()?;
        other.check()?;

        let mut scope = self.scope.clone();
        let mut cards = self.cardinalities.clone();
        for (pos, &var) in other.scope.iter().enumerate() {
            let card = other.cardinalities[pos];
            match self.position(var) {
                Some(own) if self.cardinalities[own] != card => {
                    return Err(FactorError::CardinalityConflict {
                        var: var.0,
                        left: self.cardinalities[own],
                        right: card,
                    });
                }
                Some(_) => {}
                None => {
                    scope.push(var);
                    cards.push(card);
                }
            }
        }

        let left = self.strides_over(&scope);
        let right = other.strides_over(&scope);
        let mut values = Vec::with_capacity(table_len(&cards).ok_or(FactorError::TableTooLarge)?);
        walk(&cards, &left, &right, |l, r| {
            values.push(self.values[l] * other.values[r])
        });
        Ok(Factor {
            scope,
            cardinalities: cards,
            values,
        })
    }

    /// Sums `var` out of the factor.
    pub fn marginalize_out(&self, var: VarId) -> Result<Factor, FactorError> {
        let pos = self.position(var).ok_or(FactorError::NotInScope(var.0))?;
        self.check()?;

        let mut scope = self.scope.clone();
        let mut cards = self.cardinalities.clone();
        scope.remove(pos);
        cards.remove(pos);

        let mut target_strides = row_major_strides(&cards);
        target_strides.insert(pos, 0);
        let mut values = vec![0.0; cards.iter().product()];
        walk(
            &self.cardinalities,
            &self.strides(),
            &target_strides,
            |src, dst| values[dst] += self.values[src],
        );
        Ok(Factor {
            scope,
            cardinalities: cards,
            values,
        })
    }

    /// Divides every entry by the total.
    ///
    /// Fails with [`FactorError::Degenerate`] when the total is non-finite or
    /// not above `epsilon`.
    pub fn normalize(&self, epsilon: f64) -> Result<Factor, FactorError> {
        let total = self.total();
        if !total.is_finite() || total <= epsilon {
            return Err(FactorError::Degenerate { total });
        }
        Ok(Factor {
            scope: self.scope.clone(),
            cardinalities: self.cardinalities.clone(),
            values: self.values.iter().map(|v| v / total).collect(),
        })
    }

    /// Reorders the scope to `order`, which must be a permutation of it.
    pub fn permute(&self, order: &[VarId]) -> Result<Factor, FactorError> {
        let distinct: FxHashSet<VarId> = order.iter().copied().collect();
        if order.len() != self.scope.len()
            || distinct.len() != order.len()
            || order.iter().any(|v| !self.contains(*v))
        {
            return Err(FactorError::InvalidPermutation);
        }
        if order == self.scope.as_slice() {
            return Ok(self.clone());
        }
        let strides = self.strides();
        let mut cards = Dims::new();
        let mut source = Dims::new();
        for &var in order {
            let pos = self.position(var).ok_or(FactorError::InvalidPermutation)?;
            cards.push(self.cardinalities[pos]);
            source.push(strides[pos]);
        }
        let unused: Dims = smallvec![0; cards.len()];
        let mut values = Vec::with_capacity(self.values.len());
        walk(&cards, &source, &unused, |src, _| values.push(self.values[src]));
        Ok(Factor {
            scope: order.iter().copied().collect(),
            cardinalities: cards,
            values,
        })
    }

    fn position(&self, var: VarId) -> Option<usize> {
        self.scope.iter().position(|&v| v == var)
    }

    /// Strides of this factor laid over `scope`; zero where a variable of
    /// `scope` is not in this factor.
    fn strides_over(&self, scope: &[VarId]) -> Dims {
        let own = self.strides();
        scope
            .iter()
            .map(|&var| self.position(var).map_or(0, |pos| own[pos]))
            .collect()
    }
}

/// Number of entries of a table over `cards`, or `None` on overflow.
pub(crate) fn table_len(cards: &[usize]) -> Option<usize> {
    cards.iter().try_fold(1usize, |acc, &card| acc.checked_mul(card))
}

fn row_major_strides(cards: &[usize]) -> Dims {
    let mut strides: Dims = smallvec![1; cards.len()];
    for dim in (0..cards.len().saturating_sub(1)).rev() {
        strides[dim] = strides[dim + 1] * cards[dim + 1];
    }
    strides
}

/// Visits every joint state of `cards` in row-major order, passing the flat
/// offsets under the `left` and `right` stride vectors.
fn walk(cards: &[usize], left: &[usize], right: &[usize], mut visit: impl FnMut(usize, usize)) {
    let total: usize = cards.iter().product();
    let mut counter: Dims = smallvec![0; cards.len()];
    let (mut l, mut r) = (0usize, 0usize);
    for _ in 0..total {
        visit(l, r);
        for dim in (0..cards.len()).rev() {
            counter[dim] += 1;
            if counter[dim] < cards[dim] {
                l += left[dim];
                r += right[dim];
                break;
            }
            l -= (cards[dim] - 1) * left[dim];
            r -= (cards[dim] - 1) * right[dim];
            counter[dim] = 0;
        }
    }
}
