//! Card-pattern classification and the "beats" ordering between plays.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternKind {
    Single,
    Pair,
    Triple,
    TriplePlusOne,
    Bomb,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternKind::Single => "single",
            PatternKind::Pair => "pair",
            PatternKind::Triple => "triple",
            PatternKind::TriplePlusOne => "triple_plus_one",
            PatternKind::Bomb => "bomb",
        };
        f.write_str(name)
    }
}

/// A legal play: its shape and the rank that decides comparisons.
///
/// For `TriplePlusOne` the rank is the rank of the triple, the kicker never
/// matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub rank: u8,
}

impl Pattern {
    pub fn is_bomb(&self) -> bool {
        self.kind == PatternKind::Bomb
    }

    /// Whether `self` may be played on top of `previous`.
    pub fn beats(&self, previous: &Pattern) -> bool {
        match (self.is_bomb(), previous.is_bomb()) {
            (true, false) => true,
            (false, true) => false,
            _ => self.kind == previous.kind && self.rank > previous.rank,
        }
    }
}

/// Classifies a play by rank multiplicities. `None` means the play is invalid.
pub fn classify(cards: &[u8]) -> Option<Pattern> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for &card in cards {
        *counts.entry(card).or_insert(0) += 1;
    }

    let (kind, rank) = match (cards.len(), counts.len()) {
        (1, 1) => (PatternKind::Single, cards[0]),
        (2, 1) => (PatternKind::Pair, cards[0]),
        (3, 1) => (PatternKind::Triple, cards[0]),
        (4, 1) => (PatternKind::Bomb, cards[0]),
        (4, 2) => {
            let (&rank, _) = counts.iter().find(|&(_, &n)| n == 3)?;
            (PatternKind::TriplePlusOne, rank)
        }
        _ => return None,
    };

    Some(Pattern { kind, rank })
}
