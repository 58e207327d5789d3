use phf::{Map, phf_map};

pub const GAP: char = '-';

/// Number of single-nucleotide states, ordered A, U, G, C.
pub const SINGLE_STATES: usize = 4;
/// Number of paired states, indexed `4 * five_prime + three_prime`.
pub const PAIR_STATES: usize = 16;

const STATE_BASES: [char; SINGLE_STATES] = ['A', 'U', 'G', 'C'];

// Indicator vectors over (A, U, G, C) for every accepted alignment character.
static IUPAC_STATES: Map<char, [f64; 4]> = phf_map! {
    'A' => [1.0, 0.0, 0.0, 0.0],
    'U' => [0.0, 1.0, 0.0, 0.0],
    'T' => [0.0, 1.0, 0.0, 0.0],
    'G' => [0.0, 0.0, 1.0, 0.0],
    'C' => [0.0, 0.0, 0.0, 1.0],
    'B' => [0.0, 1.0, 1.0, 1.0],
    'D' => [1.0, 1.0, 1.0, 0.0],
    'H' => [1.0, 1.0, 0.0, 1.0],
    'V' => [1.0, 0.0, 1.0, 1.0],
    'Y' => [0.0, 1.0, 0.0, 1.0],
    'R' => [1.0, 0.0, 1.0, 0.0],
    'M' => [1.0, 0.0, 0.0, 1.0],
    'K' => [0.0, 1.0, 1.0, 0.0],
    'W' => [1.0, 1.0, 0.0, 0.0],
    'S' => [0.0, 0.0, 1.0, 1.0],
    'N' => [1.0, 1.0, 1.0, 1.0],
    '-' => [1.0, 1.0, 1.0, 1.0],
};

/// Upper-cases a character and maps `T` to `U`.
#[inline]
pub fn normalize(c: char) -> char {
    match c.to_ascii_uppercase() {
        'T' => 'U',
        other => other,
    }
}

#[inline]
pub fn is_gap(c: char) -> bool {
    c == GAP
}

pub fn is_recognized(c: char) -> bool {
    IUPAC_STATES.contains_key(&normalize(c))
}

/// Returns the leaf indicator vector (A, U, G, C) for an alignment character.
///
/// IUPAC ambiguity codes yield the corresponding indicator set; `N` and gaps
/// yield all ones.
pub fn leaf_states(c: char) -> Option<[f64; SINGLE_STATES]> {
    IUPAC_STATES.get(&normalize(c)).copied()
}

/// Interprets a gap facing a determined base as "any base that cannot pair with it".
///
/// A excludes U, U excludes A and G, G excludes U and C, C excludes G. Ambiguity
/// codes exclude the union. If every state would be excluded the gap falls back to
/// all ones, so the leaf never contributes a zero likelihood.
pub fn non_pairing_gap_states(partner: &[f64; SINGLE_STATES]) -> [f64; SINGLE_STATES] {
    let mut states = [1.0; SINGLE_STATES];
    // A, U, G, C
    if partner[0] > 0.0 {
        states[1] = 0.0;
    }
    if partner[1] > 0.0 {
        states[0] = 0.0;
        states[2] = 0.0;
    }
    if partner[2] > 0.0 {
        states[1] = 0.0;
        states[3] = 0.0;
    }
    if partner[3] > 0.0 {
        states[2] = 0.0;
    }
    if states.iter().all(|&s| s == 0.0) {
        return [1.0; SINGLE_STATES];
    }
    states
}

/// Watson-Crick and G-U wobble pairs.
pub fn is_canonical_pair(a: char, b: char) -> bool {
    matches!(
        (normalize(a), normalize(b)),
        ('A', 'U') | ('U', 'A') | ('G', 'C') | ('C', 'G') | ('G', 'U') | ('U', 'G')
    )
}

/// Index into the nearest-neighbour stacking table (A=0, C=1, G=2, U=3).
pub fn stacking_index(c: char) -> Option<usize> {
    match normalize(c) {
        'A' => Some(0),
        'C' => Some(1),
        'G' => Some(2),
        'U' => Some(3),
        _ => None,
    }
}

/// Base emitted for a single-nucleotide state index.
pub fn state_base(state: usize) -> char {
    STATE_BASES[state % SINGLE_STATES]
}

/// Bases emitted for a paired state index.
pub fn pair_state_bases(state: usize) -> (char, char) {
    (
        state_base(state / SINGLE_STATES),
        state_base(state % SINGLE_STATES),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_converts_thymine() {
        assert_eq!(normalize('t'), 'U');
        assert_eq!(normalize('g'), 'G');
        assert_eq!(normalize('-'), '-');
    }

    #[test]
    fn canonical_pairs_include_wobble() {
        assert!(is_canonical_pair('G', 'U'));
        assert!(is_canonical_pair('u', 'g'));
        assert!(is_canonical_pair('A', 'T'));
        assert!(!is_canonical_pair('A', 'G'));
        assert!(!is_canonical_pair('A', '-'));
        assert!(!is_canonical_pair('N', 'N'));
    }

    #[test]
    fn leaf_states_follow_iupac_codes() {
        assert_eq!(leaf_states('a'), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(leaf_states('R'), Some([1.0, 0.0, 1.0, 0.0]));
        assert_eq!(leaf_states('n'), Some([1.0; 4]));
        assert_eq!(leaf_states('-'), Some([1.0; 4]));
        assert_eq!(leaf_states('X'), None);
    }

    #[test]
    fn non_pairing_gap_excludes_partners_of_observed_base() {
        let a = leaf_states('A').unwrap();
        assert_eq!(non_pairing_gap_states(&a), [1.0, 0.0, 1.0, 1.0]);
        let u = leaf_states('U').unwrap();
        assert_eq!(non_pairing_gap_states(&u), [0.0, 1.0, 0.0, 1.0]);
        let g = leaf_states('G').unwrap();
        assert_eq!(non_pairing_gap_states(&g), [1.0, 0.0, 1.0, 0.0]);
        let c = leaf_states('C').unwrap();
        assert_eq!(non_pairing_gap_states(&c), [1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn non_pairing_gap_falls_back_to_all_ones_when_everything_is_excluded() {
        let b = leaf_states('B').unwrap();
        assert_eq!(non_pairing_gap_states(&b), [1.0; 4]);
    }

    #[test]
    fn stacking_index_uses_alphabetical_order() {
        assert_eq!(stacking_index('A'), Some(0));
        assert_eq!(stacking_index('C'), Some(1));
        assert_eq!(stacking_index('G'), Some(2));
        assert_eq!(stacking_index('T'), Some(3));
        assert_eq!(stacking_index('N'), None);
    }

    #[test]
    fn pair_state_bases_decode_row_major_index() {
        assert_eq!(pair_state_bases(0), ('A', 'A'));
        assert_eq!(pair_state_bases(1), ('A', 'U'));
        assert_eq!(pair_state_bases(14), ('C', 'G'));
    }
}
