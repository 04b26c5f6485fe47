use crate::error::RuleParseError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Neighbour counts 0..=8 as a bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub(crate) struct NeighborSet(u16);

impl NeighborSet {
    /// Counts above 8 are ignored.
    pub(crate) const fn of(counts: &[u8]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < counts.len() {
            if counts[i] <= 8 {
                bits |= 1 << counts[i];
            }
            i += 1;
        }
        Self(bits)
    }

    #[inline]
    pub(crate) fn contains(self, n: u8) -> bool {
        n <= 8 && self.0 & (1 << n) != 0
    }

    pub(crate) fn toggle(&mut self, n: u8) {
        if n <= 8 {
            self.0 ^= 1 << n;
        }
    }

    pub(crate) fn iter(self) -> impl Iterator<Item = u8> {
        (0..=8).filter(move |&n| self.contains(n))
    }
}

impl From<Vec<u8>> for NeighborSet {
    fn from(counts: Vec<u8>) -> Self {
        Self::of(&counts)
    }
}

impl From<NeighborSet> for Vec<u8> {
    fn from(set: NeighborSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for NeighborSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for n in self.iter() {
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NeighborSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{self}}}")
    }
}

/// Birth and survival conditions of a life-like automaton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct RuleSet {
    pub(crate) birth: NeighborSet,
    pub(crate) survival: NeighborSet,
}

impl RuleSet {
    pub(crate) const CONWAY: RuleSet = RuleSet::new(&[3], &[2, 3]);

    pub(crate) const fn new(birth: &[u8], survival: &[u8]) -> Self {
        Self {
            birth: NeighborSet::of(birth),
            survival: NeighborSet::of(survival),
        }
    }

    #[inline]
    pub(crate) fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        if alive {
            self.survival.contains(neighbors)
        } else {
            self.birth.contains(neighbors)
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}/S{}", self.birth, self.survival)
    }
}

impl FromStr for RuleSet {
    type Err = RuleParseError;

    /// Parses `B3/S23` notation; either half may be empty (`B2/S`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let shape = || RuleParseError::Shape(s.to_string());
        let (b, rest) = s.trim().split_once('/').ok_or_else(shape)?;
        let birth = b
            .strip_prefix(&['B', 'b'][..])
            .ok_or_else(shape)
            .and_then(parse_counts)?;
        let survival = rest
            .strip_prefix(&['S', 's'][..])
            .ok_or_else(shape)
            .and_then(parse_counts)?;
        Ok(Self { birth, survival })
    }
}

fn parse_counts(digits: &str) -> Result<NeighborSet, RuleParseError> {
    let mut set = NeighborSet::default();
    for ch in digits.chars() {
        match ch.to_digit(10) {
            Some(n) if n <= 8 => set.0 |= 1 << n,
            _ => return Err(RuleParseError::Count(ch)),
        }
    }
    Ok(set)
}

pub(crate) struct Preset {
    pub(crate) name: &'static str,
    pub(crate) rules: RuleSet,
}

pub(crate) static PRESETS: [Preset; 7] = [
    Preset {
        name: "Conway",
        rules: RuleSet::CONWAY,
    },
    Preset {
        name: "Day & Night",
        rules: RuleSet::new(&[3, 6, 7, 8], &[3, 4, 6, 7, 8]),
    },
    Preset {
        name: "HighLife",
        rules: RuleSet::new(&[3, 6], &[2, 3]),
    },
    Preset {
        name: "Maze",
        rules: RuleSet::new(&[3], &[1, 2, 3, 4, 5]),
    },
    Preset {
        name: "Coral",
        rules: RuleSet::new(&[3], &[4, 5, 6, 7, 8]),
    },
    Preset {
        name: "Seeds",
        rules: RuleSet::new(&[2], &[]),
    },
    Preset {
        name: "Diamoeba",
        rules: RuleSet::new(&[3, 5, 6, 7, 8], &[5, 6, 7, 8]),
    },
];

/// The preset whose sets match `rules` exactly.
pub(crate) fn active_preset(rules: &RuleSet) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.rules == *rules)
}

/// Preset after the active one, or the first when none is active.
pub(crate) fn next_preset(rules: &RuleSet) -> &'static Preset {
    let i = PRESETS
        .iter()
        .position(|p| p.rules == *rules)
        .map_or(0, |i| (i + 1) % PRESETS.len());
    &PRESETS[i]
}

/// Accepts a preset name (`highlife`, `day-night`) or `B../S..` notation.
pub(crate) fn parse_rule(s: &str) -> Result<RuleSet, RuleParseError> {
    let key = |name: &str| -> String {
        name.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    let wanted = key(s);
    match PRESETS.iter().find(|p| key(p.name) == wanted) {
        Some(p) => Ok(p.rules),
        None => s.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notation_round_trips() {
        for p in &PRESETS {
            let text = p.rules.to_string();
            assert_eq!(text.parse::<RuleSet>().unwrap(), p.rules, "{}", p.name);
        }
        assert_eq!(RuleSet::CONWAY.to_string(), "B3/S23");
        assert_eq!(PRESETS[5].rules.to_string(), "B2/S");
    }

    #[test]
    fn malformed_rules_are_rejected() {
        assert_eq!(
            "B3S23".parse::<RuleSet>(),
            Err(RuleParseError::Shape("B3S23".into()))
        );
        assert_eq!("B39/S23".parse::<RuleSet>(), Err(RuleParseError::Count('9')));
        assert_eq!("B3/Sx".parse::<RuleSet>(), Err(RuleParseError::Count('x')));
        assert!("S23/B3".parse::<RuleSet>().is_err());
    }

    #[test]
    fn preset_names_resolve() {
        assert_eq!(parse_rule("highlife").unwrap(), PRESETS[2].rules);
        assert_eq!(parse_rule("Day-Night").unwrap(), PRESETS[1].rules);
        assert_eq!(parse_rule("b36/s23").unwrap(), PRESETS[2].rules);
    }

    #[test]
    fn toggling_tracks_active_preset() {
        let mut rules = RuleSet::CONWAY;
        assert_eq!(active_preset(&rules).map(|p| p.name), Some("Conway"));
        rules.birth.toggle(6);
        assert_eq!(active_preset(&rules).map(|p| p.name), Some("HighLife"));
        rules.survival.toggle(7);
        assert!(active_preset(&rules).is_none());
        assert_eq!(next_preset(&rules).name, "Conway");
        assert_eq!(next_preset(&PRESETS[6].rules).name, "Conway");
    }

    #[test]
    fn next_state_follows_sets() {
        let rules = RuleSet::CONWAY;
        assert!(rules.next_state(false, 3));
        assert!(!rules.next_state(false, 2));
        assert!(rules.next_state(true, 2));
        assert!(!rules.next_state(true, 4));
        assert!(!rules.next_state(true, 9));
    }
}
