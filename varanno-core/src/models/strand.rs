use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::VariantError;

///
/// Strand of a gene or transcript. Coordinates are always stored
/// smallest-to-largest; the strand only changes how they are read.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Strand {
    #[serde(rename = "+")]
    #[default]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl Strand {
    pub fn is_plus(&self) -> bool {
        matches!(self, Strand::Plus)
    }

    /// Lenient conversion used by the GTF reader: anything but `-` is plus.
    pub fn from_char(c: char) -> Self {
        match c {
            '-' => Strand::Minus,
            _ => Strand::Plus,
        }
    }
}

impl FromStr for Strand {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "1" | "+1" => Ok(Strand::Plus),
            "-" | "-1" => Ok(Strand::Minus),
            _ => Err(VariantError::UnknownStrand(s.to_string())),
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("+", Strand::Plus)]
    #[case("1", Strand::Plus)]
    #[case("-", Strand::Minus)]
    #[case("-1", Strand::Minus)]
    fn test_strand_from_str(#[case] input: &str, #[case] expected: Strand) {
        assert_eq!(input.parse::<Strand>().unwrap(), expected);
    }

    #[rstest]
    fn test_strand_from_str_rejects_unknown() {
        assert_eq!("?".parse::<Strand>().is_err(), true);
    }

    #[rstest]
    fn test_strand_from_char_defaults_to_plus() {
        assert_eq!(Strand::from_char('.'), Strand::Plus);
        assert_eq!(Strand::from_char('-'), Strand::Minus);
    }
}
