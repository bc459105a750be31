//! Switches for the two compatibility quirks of the reconstruction

use polars::prelude::{col, lit, when, Expr};
use std::cmp::Ordering;

/// How a generator with several candidate regions picks one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneTieBreak {
    /// Smallest parent object id compared as text, so `"10" < "9"`.
    /// Matches existing outputs.
    #[default]
    Lexicographic,
    /// Smallest parent object id compared as an integer
    Numeric,
}

impl ZoneTieBreak {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            ZoneTieBreak::Lexicographic => a.cmp(b),
            ZoneTieBreak::Numeric => match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                // Non-numeric ids sort after numeric ones
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            },
        }
    }
}

/// Sample statistic names, by code
pub const SAMPLE_LABELS: [(&str, &str); 4] =
    [("0", "Mean"), ("1", "StDev"), ("2", "Min"), ("3", "Max")];

/// How numeric sample codes become statistic names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleLabeling {
    /// Replace each digit substring in turn, so `"10"` becomes
    /// `"StDevMean"`. Matches existing outputs.
    #[default]
    Substring,
    /// Map the whole value; unknown codes pass through unchanged
    Exact,
}

impl SampleLabeling {
    /// Expression relabelling the sample codes held in `column`
    pub fn expr(self, column: &str) -> Expr {
        match self {
            SampleLabeling::Substring => {
                SAMPLE_LABELS.iter().fold(col(column), |acc, (digit, name)| {
                    acc.str().replace_all(lit(*digit), lit(*name), true)
                })
            }
            SampleLabeling::Exact => {
                SAMPLE_LABELS.iter().fold(col(column), |acc, (digit, name)| {
                    when(col(column).eq(lit(*digit)))
                        .then(lit(*name))
                        .otherwise(acc)
                })
            }
        }
        .alias(column)
    }
}

/// Options for [`crate::model::ModelAssembler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblyOptions {
    pub zone_tie_break: ZoneTieBreak,
    pub sample_labels: SampleLabeling,
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataFrame, IntoLazy, NamedFrom, Series};

    fn labels(labeling: SampleLabeling, codes: &[&str]) -> Vec<String> {
        let frame = DataFrame::new(vec![Series::new("sample".into(), codes).into()]).unwrap();
        let out = frame
            .lazy()
            .with_column(labeling.expr("sample"))
            .collect()
            .unwrap();
        out.column("sample")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_substring_labels_single_digits() {
        assert_eq!(
            labels(SampleLabeling::Substring, &["0", "1", "2", "3"]),
            vec!["Mean", "StDev", "Min", "Max"]
        );
    }

    #[test]
    fn test_substring_labels_corrupt_multi_digit_codes() {
        assert_eq!(
            labels(SampleLabeling::Substring, &["10", "23", "4"]),
            vec!["StDevMean", "MinMax", "4"]
        );
    }

    #[test]
    fn test_exact_labels() {
        assert_eq!(labels(SampleLabeling::Exact, &["2", "10"]), vec!["Min", "10"]);
    }

    #[test]
    fn test_tie_break_orderings() {
        assert_eq!(ZoneTieBreak::Lexicographic.compare("10", "9"), Ordering::Less);
        assert_eq!(ZoneTieBreak::Numeric.compare("10", "9"), Ordering::Greater);
        assert_eq!(ZoneTieBreak::Numeric.compare("x", "9"), Ordering::Greater);
    }
}
