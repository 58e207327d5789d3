use std::ops::{Add, AddAssign};

/// Position of a competing base relative to its helix partner and its consensus partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Cis5,
    Trans5,
    Mid5,
    Cis3,
    Trans3,
    Mid3,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Cis5,
        Direction::Trans5,
        Direction::Mid5,
        Direction::Cis3,
        Direction::Trans3,
        Direction::Mid3,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated directional competition scores and occurrence counts for one
/// (true helix, competing helix) interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompetitionStats {
    scores: [f64; 6],
    counts: [u32; 6],
}

impl CompetitionStats {
    /// Adds a contribution, skipping values that are not finite.
    #[inline]
    pub fn record(&mut self, direction: Direction, value: f64) {
        if value.is_finite() {
            self.scores[direction.index()] += value;
            self.counts[direction.index()] += 1;
        }
    }

    #[inline]
    pub fn score(&self, direction: Direction) -> f64 {
        self.scores[direction.index()]
    }

    #[inline]
    pub fn count(&self, direction: Direction) -> u32 {
        self.counts[direction.index()]
    }

    pub fn cis5(&self) -> f64 {
        self.score(Direction::Cis5)
    }
    pub fn trans5(&self) -> f64 {
        self.score(Direction::Trans5)
    }
    pub fn mid5(&self) -> f64 {
        self.score(Direction::Mid5)
    }
    pub fn cis3(&self) -> f64 {
        self.score(Direction::Cis3)
    }
    pub fn trans3(&self) -> f64 {
        self.score(Direction::Trans3)
    }
    pub fn mid3(&self) -> f64 {
        self.score(Direction::Mid3)
    }

    #[inline]
    pub fn cis(&self) -> f64 {
        self.cis5() - self.cis3()
    }

    #[inline]
    pub fn trans(&self) -> f64 {
        self.trans3() - self.trans5()
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        self.mid5() - self.mid3()
    }

    /// True iff all six scores are zero.
    pub fn is_zero(&self) -> bool {
        self.scores.iter().all(|&s| s == 0.0)
    }
}

impl Add for CompetitionStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for CompetitionStats {
    fn add_assign(&mut self, rhs: Self) {
        for i in 0..6 {
            self.scores[i] += rhs.scores[i];
            self.counts[i] += rhs.counts[i];
        }
    }
}
