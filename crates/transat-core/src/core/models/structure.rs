use thiserror::Error;

/// Minimal sequence distance between two base-pairing columns.
pub const MIN_DIST: usize = 3;

/// Bracket pairs in pseudoknot-level order.
const BRACKETS: [(char, char); 8] = [
    ('(', ')'),
    ('<', '>'),
    ('[', ']'),
    ('{', '}'),
    ('A', 'a'),
    ('B', 'b'),
    ('C', 'c'),
    ('D', 'd'),
];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StructureError {
    #[error("Unrecognized character '{symbol}' at position {position} in dot-bracket string")]
    UnrecognizedCharacter { symbol: char, position: usize },
    #[error("Unbalanced bracket '{symbol}' at position {position}")]
    Unbalanced { symbol: char, position: usize },
    #[error("Partner {partner} of position {position} lies outside a structure of length {length}")]
    OutOfRange {
        position: usize,
        partner: usize,
        length: usize,
    },
    #[error("Pairing is not symmetric at position {position}")]
    Asymmetric { position: usize },
    #[error("Pair ({pos5}, {pos3}) is closer than the minimum pairing distance")]
    TooClose { pos5: usize, pos3: usize },
    #[error("Structure needs more than {max} pseudoknot levels to render")]
    TooManyLevels { max: usize },
}

/// A consensus (or per-sequence) pairing vector with a bracket level per pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecondaryStructure {
    partners: Vec<Option<usize>>,
    levels: Vec<u8>,
}

impl SecondaryStructure {
    pub fn unpaired(length: usize) -> Self {
        Self {
            partners: vec![None; length],
            levels: vec![0; length],
        }
    }

    pub fn from_dot_bracket(notation: &str) -> Result<Self, StructureError> {
        let symbols: Vec<char> = notation.trim().chars().collect();
        let mut partners = vec![None; symbols.len()];
        let mut levels = vec![0u8; symbols.len()];
        let mut stacks: [Vec<usize>; BRACKETS.len()] = Default::default();

        for (position, &symbol) in symbols.iter().enumerate() {
            if symbol == '.' {
                continue;
            }
            if let Some(level) = BRACKETS.iter().position(|&(open, _)| open == symbol) {
                stacks[level].push(position);
                levels[position] = level as u8;
            } else if let Some(level) = BRACKETS.iter().position(|&(_, close)| close == symbol) {
                let opening = stacks[level]
                    .pop()
                    .ok_or(StructureError::Unbalanced { symbol, position })?;
                partners[opening] = Some(position);
                partners[position] = Some(opening);
                levels[position] = level as u8;
            } else {
                return Err(StructureError::UnrecognizedCharacter { symbol, position });
            }
        }

        for (level, stack) in stacks.iter().enumerate() {
            if let Some(&position) = stack.last() {
                return Err(StructureError::Unbalanced {
                    symbol: BRACKETS[level].0,
                    position,
                });
            }
        }

        let structure = Self { partners, levels };
        structure.check_min_separation()?;
        Ok(structure)
    }

    /// Builds a structure from a raw pairing vector, assigning bracket levels greedily.
    pub fn from_partners(partners: Vec<Option<usize>>) -> Result<Self, StructureError> {
        let structure = Self::from_partners_unseparated(partners)?;
        structure.check_min_separation()?;
        Ok(structure)
    }

    /// As [`from_partners`](Self::from_partners), but pairs closer than [`MIN_DIST`]
    /// are kept. Realigned loops may be shorter than the consensus allows.
    pub(crate) fn from_partners_unseparated(
        partners: Vec<Option<usize>>,
    ) -> Result<Self, StructureError> {
        let length = partners.len();
        for (position, partner) in partners.iter().enumerate() {
            if let Some(partner) = *partner {
                if partner >= length {
                    return Err(StructureError::OutOfRange {
                        position,
                        partner,
                        length,
                    });
                }
                if partners[partner] != Some(position) {
                    return Err(StructureError::Asymmetric { position });
                }
            }
        }

        let mut structure = Self {
            partners,
            levels: vec![0; length],
        };
        structure.assign_levels();
        Ok(structure)
    }

    fn assign_levels(&mut self) {
        let mut placed: Vec<Vec<(usize, usize)>> = Vec::new();
        let pairs: Vec<(usize, usize)> = self.pairs().collect();
        for (i, j) in pairs {
            let crosses = |&(k, l): &(usize, usize)| (k < i && i < l && l < j) || (i < k && k < j && j < l);
            let level = match placed.iter().position(|existing| !existing.iter().any(crosses)) {
                Some(level) => level,
                None => {
                    placed.push(Vec::new());
                    placed.len() - 1
                }
            };
            placed[level].push((i, j));
            self.levels[i] = level as u8;
            self.levels[j] = level as u8;
        }
    }

    pub fn check_min_separation(&self) -> Result<(), StructureError> {
        for (pos5, pos3) in self.pairs() {
            if pos3 - pos5 < MIN_DIST {
                return Err(StructureError::TooClose { pos5, pos3 });
            }
        }
        Ok(())
    }

    pub fn to_dot_bracket(&self) -> Result<String, StructureError> {
        self.partners
            .iter()
            .enumerate()
            .map(|(position, partner)| match partner {
                None => Ok('.'),
                Some(partner) => {
                    let (open, close) = *BRACKETS
                        .get(self.levels[position] as usize)
                        .ok_or(StructureError::TooManyLevels {
                            max: BRACKETS.len(),
                        })?;
                    Ok(if *partner > position { open } else { close })
                }
            })
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    #[inline]
    pub fn partner(&self, position: usize) -> Option<usize> {
        self.partners.get(position).copied().flatten()
    }

    #[inline]
    pub fn partners(&self) -> &[Option<usize>] {
        &self.partners
    }

    #[inline]
    pub fn is_paired(&self, position: usize) -> bool {
        self.partner(position).is_some()
    }

    /// Base pairs as `(5', 3')` in ascending 5' order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.partners
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.filter(|&j| j > i).map(|j| (i, j)))
    }

    pub fn paired_count(&self) -> usize {
        self.partners.iter().filter(|p| p.is_some()).count()
    }

    /// Keeps only the pairs accepted by `keep`, preserving bracket levels.
    pub fn retain_pairs(&self, mut keep: impl FnMut(usize, usize) -> bool) -> Self {
        let mut partners = vec![None; self.len()];
        for (i, j) in self.pairs() {
            if keep(i, j) {
                partners[i] = Some(j);
                partners[j] = Some(i);
            }
        }
        Self {
            partners,
            levels: self.levels.clone(),
        }
    }
}

/// Whether `position` sits inside a stack of at least three consecutive pairs.
pub fn in_long_helix(partners: &[Option<usize>], position: usize) -> bool {
    let Some(partner) = partners.get(position).copied().flatten() else {
        return false;
    };
    let partner_at = |offset: isize| {
        position
            .checked_add_signed(offset)
            .and_then(|k| partners.get(k).copied().flatten())
    };
    let expect = |offset: isize| partner.checked_add_signed(-offset);

    let stacks = |offset: isize| match (partner_at(offset), expect(offset)) {
        (Some(actual), Some(expected)) => actual == expected,
        _ => false,
    };

    (stacks(1) && stacks(2)) || (stacks(-1) && stacks(-2)) || (stacks(1) && stacks(-1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_bracket_round_trip_preserves_notation() {
        for notation in [
            "((((....))))",
            "..((...))..<<<...>>>",
            "((((..[[[..))))..]]]",
            "(((..<<<..)))..[[[..>>>..]]]",
            "A(((..a..)))",
            "{{{...}}}BBB...bbb",
            "..........",
        ] {
            let structure = SecondaryStructure::from_dot_bracket(notation).unwrap();
            assert_eq!(structure.to_dot_bracket().unwrap(), notation);
        }
    }

    #[test]
    fn parsed_pairing_is_symmetric() {
        let structure =
            SecondaryStructure::from_dot_bracket("((..<<..))..[[..>>..]]....").unwrap();
        for (i, partner) in structure.partners().iter().enumerate() {
            if let Some(j) = partner {
                assert_eq!(structure.partner(*j), Some(i));
            }
        }
    }

    #[test]
    fn unbalanced_closing_bracket_is_rejected() {
        let result = SecondaryStructure::from_dot_bracket("(...))");
        assert!(matches!(
            result,
            Err(StructureError::Unbalanced {
                symbol: ')',
                position: 5
            })
        ));
    }

    #[test]
    fn unclosed_bracket_is_rejected() {
        let result = SecondaryStructure::from_dot_bracket("((....)");
        assert!(matches!(result, Err(StructureError::Unbalanced { .. })));
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let result = SecondaryStructure::from_dot_bracket("((..x..))");
        assert!(matches!(
            result,
            Err(StructureError::UnrecognizedCharacter { symbol: 'x', .. })
        ));
    }

    #[test]
    fn pairs_closer_than_minimum_distance_are_rejected() {
        let result = SecondaryStructure::from_dot_bracket("(..)");
        assert!(result.is_ok());
        let result = SecondaryStructure::from_dot_bracket("(.)");
        assert!(matches!(
            result,
            Err(StructureError::TooClose { pos5: 0, pos3: 2 })
        ));
    }

    #[test]
    fn from_partners_rejects_asymmetric_vector() {
        let result = SecondaryStructure::from_partners(vec![Some(4), None, None, None, None]);
        assert!(matches!(result, Err(StructureError::Asymmetric { position: 0 })));
    }

    #[test]
    fn from_partners_rejects_out_of_range_partner() {
        let result = SecondaryStructure::from_partners(vec![Some(9), None, None, None]);
        assert!(matches!(result, Err(StructureError::OutOfRange { .. })));
    }

    #[test]
    fn from_partners_places_crossing_pairs_on_separate_levels() {
        let mut partners = vec![None; 12];
        for (i, j) in [(0, 6), (1, 5), (3, 10), (4, 9)] {
            partners[i] = Some(j);
            partners[j] = Some(i);
        }
        let structure = SecondaryStructure::from_partners(partners).unwrap();
        assert_eq!(structure.to_dot_bracket().unwrap(), "((.<<))..>>.");
    }

    #[test]
    fn retain_pairs_drops_rejected_pairs_symmetrically() {
        let structure = SecondaryStructure::from_dot_bracket("((....))..((....))").unwrap();
        let kept = structure.retain_pairs(|i, _| i < 5);
        assert_eq!(kept.to_dot_bracket().unwrap(), "((....))..........");
    }

    #[test]
    fn long_helix_requires_three_stacked_pairs() {
        let long = SecondaryStructure::from_dot_bracket("(((....)))").unwrap();
        assert!((0..3).all(|i| in_long_helix(long.partners(), i)));
        assert!((7..10).all(|i| in_long_helix(long.partners(), i)));

        let short = SecondaryStructure::from_dot_bracket("((....))").unwrap();
        assert!(!in_long_helix(short.partners(), 0));
        assert!(!in_long_helix(short.partners(), 7));
        assert!(!in_long_helix(short.partners(), 3));
    }
}
