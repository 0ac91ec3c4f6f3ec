// Pattern labels and the table that picks one from the committed gesture.

use std::fmt;
use std::str::FromStr;

use crate::debounce::CommittedGesture;
use crate::error::Error;

/// Which formation the particle cloud is asked to show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Dispersed cloud.
    #[default]
    Scatter,
    /// Collapses into the rasterized message (accent color).
    Text,
    /// Swirl around the photo ring.
    Vortex,
}

impl Pattern {
    pub const ALL: [Pattern; 3] = [Pattern::Scatter, Pattern::Text, Pattern::Vortex];

    /// Next label in [`Pattern::ALL`] order, for cycling with a key.
    pub fn next(self) -> Pattern {
        let i = Pattern::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Pattern::ALL[(i + 1) % Pattern::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::Scatter => "scatter",
            Pattern::Text => "text",
            Pattern::Vortex => "vortex",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scatter" => Ok(Pattern::Scatter),
            "text" | "text_valentine" => Ok(Pattern::Text),
            "vortex" => Ok(Pattern::Vortex),
            other => Err(Error::Config(format!("unknown pattern {other:?}"))),
        }
    }
}

/// Pattern in effect for this tick.
///
/// | started | hands | committed open | result   |
/// |---------|-------|----------------|----------|
/// | no      | any   | any            | `manual` |
/// | yes     | 0     | any            | scatter  |
/// | yes     | >= 1  | no             | text     |
/// | yes     | >= 1  | yes            | scatter  |
///
/// Once started, the gesture table overrides the manual selection.
pub fn select(started: bool, manual: Pattern, gesture: CommittedGesture) -> Pattern {
    match (started, gesture.hand_count, gesture.is_open) {
        (false, _, _) => manual,
        (true, 0, _) => Pattern::Scatter,
        (true, _, false) => Pattern::Text,
        (true, _, true) => Pattern::Scatter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(hand_count: u8, is_open: bool) -> CommittedGesture {
        CommittedGesture { hand_count, is_open }
    }

    #[test]
    fn parses_external_labels() {
        assert_eq!("scatter".parse::<Pattern>().unwrap(), Pattern::Scatter);
        assert_eq!("text_valentine".parse::<Pattern>().unwrap(), Pattern::Text);
        assert_eq!(" Vortex ".parse::<Pattern>().unwrap(), Pattern::Vortex);
        assert!("spiral".parse::<Pattern>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for p in Pattern::ALL {
            assert_eq!(p.to_string().parse::<Pattern>().unwrap(), p);
        }
    }

    #[test]
    fn cycle_visits_every_label() {
        let mut p = Pattern::Scatter;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(p);
            p = p.next();
        }
        assert_eq!(p, Pattern::Scatter);
        assert_eq!(seen, Pattern::ALL);
    }

    #[test]
    fn transition_table() {
        assert_eq!(select(false, Pattern::Vortex, g(1, false)), Pattern::Vortex);
        assert_eq!(select(true, Pattern::Vortex, g(0, false)), Pattern::Scatter);
        assert_eq!(select(true, Pattern::Scatter, g(1, false)), Pattern::Text);
        assert_eq!(select(true, Pattern::Scatter, g(2, false)), Pattern::Text);
        assert_eq!(select(true, Pattern::Text, g(1, true)), Pattern::Scatter);
        assert_eq!(select(true, Pattern::Text, g(2, true)), Pattern::Scatter);
    }
}
