use crate::burnrl::base::ElemType;

/// Shape and bounds of observations or actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Space {
    /// Continuous box with per-dimension inclusive bounds.
    Box {
        low: Vec<ElemType>,
        high: Vec<ElemType>,
    },
    /// A single integer in `0..n`.
    Discrete(usize),
    /// One integer per dimension, the i-th in `0..nvec[i]`.
    MultiDiscrete(Vec<usize>),
}

impl Space {
    pub fn bounded(low: Vec<ElemType>, high: Vec<ElemType>) -> Self {
        debug_assert_eq!(low.len(), high.len());
        Self::Box { low, high }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Box { low, .. } => low.len(),
            Self::Discrete(_) => 1,
            Self::MultiDiscrete(nvec) => nvec.len(),
        }
    }

    pub fn bounds(&self) -> Option<(&[ElemType], &[ElemType])> {
        match self {
            Self::Box { low, high } => Some((low, high)),
            _ => None,
        }
    }

    pub fn n(&self) -> Option<usize> {
        match self {
            Self::Discrete(n) => Some(*n),
            _ => None,
        }
    }

    pub fn nvec(&self) -> Option<&[usize]> {
        match self {
            Self::MultiDiscrete(nvec) => Some(nvec),
            _ => None,
        }
    }

    /// Clamps `values` into the box in place. Non-box spaces are left untouched.
    pub fn clip(&self, values: &mut [ElemType]) {
        if let Self::Box { low, high } = self {
            for ((value, low), high) in values.iter_mut().zip(low).zip(high) {
                *value = value.clamp(*low, *high);
            }
        }
    }

    pub fn contains(&self, values: &[ElemType]) -> bool {
        match self {
            Self::Box { low, high } => {
                values.len() == low.len()
                    && values
                        .iter()
                        .zip(low.iter().zip(high))
                        .all(|(value, (low, high))| *low <= *value && *value <= *high)
            }
            Self::Discrete(n) => {
                values.len() == 1 && values[0] >= 0.0 && (values[0] as usize) < *n
            }
            Self::MultiDiscrete(nvec) => {
                values.len() == nvec.len()
                    && values
                        .iter()
                        .zip(nvec)
                        .all(|(value, n)| *value >= 0.0 && (*value as usize) < *n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_clamps_each_dimension() {
        let space = Space::bounded(vec![-2.0, 0.0], vec![2.0, 1.0]);
        let mut action = vec![3.5, -0.25];
        space.clip(&mut action);
        assert_eq!(action, vec![2.0, 0.0]);
        assert!(space.contains(&action));
    }

    #[test]
    fn multi_discrete_contains_checks_every_entry() {
        let space = Space::MultiDiscrete(vec![4, 2]);
        assert!(space.contains(&[3.0, 1.0]));
        assert!(!space.contains(&[3.0, 2.0]));
        assert_eq!(space.dim(), 2);
        assert_eq!(space.nvec(), Some(&[4, 2][..]));
    }
}
