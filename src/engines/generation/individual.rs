//! The five-gene guessing strategy evolved by the search.
//!
//! Gene order is fixed: `[p_lower, p_upper, p_number, min_len, max_len]`.
//! The three weights are unnormalized and non-negative; the two lengths are
//! stored as whole numbers but travel through crossover and mutation as `f64`
//! genes like the weights.

use crate::config::LengthBounds;
use crate::error::{ProbevolveError, Result};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

pub const GENE_COUNT: usize = 5;

pub type Genes = [f64; GENE_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub p_lower: f64,
    pub p_upper: f64,
    pub p_number: f64,
    pub min_len: usize,
    pub max_len: usize,
    pub name: Option<String>,
}

/// An individual together with the hits it produced in one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredIndividual {
    pub individual: Individual,
    pub score: u32,
}

impl ScoredIndividual {
    pub fn new(individual: Individual, score: u32) -> Self {
        Self { individual, score }
    }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Individual {
    /// Builds an individual, clamping rather than rejecting invalid values:
    /// negative or non-finite weights become zero and `min_len` is lowered to
    /// `max_len` when the two are inverted.
    pub fn new(p_lower: f64, p_upper: f64, p_number: f64, min_len: usize, max_len: usize) -> Self {
        let mut individual = Self {
            p_lower: sanitize_weight(p_lower),
            p_upper: sanitize_weight(p_upper),
            p_number: sanitize_weight(p_number),
            min_len,
            max_len,
            name: None,
        };
        individual.validate();
        individual
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Random weights in `[0, 1)` and a random length range inside `bounds`.
    pub fn random<R: Rng>(bounds: LengthBounds, rng: &mut R) -> Self {
        let min_len = rng.gen_range(bounds.min..=bounds.max);
        let max_len = rng.gen_range(min_len..=bounds.max);
        Self::new(rng.gen(), rng.gen(), rng.gen(), min_len, max_len)
    }

    /// Rebuilds an individual from a gene vector. A vector of the wrong length
    /// means corrupted state upstream and is reported, never coerced.
    pub fn from_genes(genes: &[f64]) -> Result<Self> {
        if genes.len() != GENE_COUNT {
            return Err(ProbevolveError::InvalidGeneVector {
                expected: GENE_COUNT,
                actual: genes.len(),
            });
        }
        Ok(Self::new(
            genes[0],
            genes[1],
            genes[2],
            length_gene(genes[3]),
            length_gene(genes[4]),
        ))
    }

    pub fn genes(&self) -> Genes {
        [
            self.p_lower,
            self.p_upper,
            self.p_number,
            self.min_len as f64,
            self.max_len as f64,
        ]
    }

    /// Weights rescaled to sum to one, rounded to two decimals. All-zero
    /// weights are treated as a uniform distribution.
    pub fn normalized(&self) -> Self {
        let total = self.p_lower + self.p_upper + self.p_number;
        let (lower, upper, number) = if total > 0.0 {
            (self.p_lower / total, self.p_upper / total, self.p_number / total)
        } else {
            (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
        };
        Self {
            p_lower: round2(lower),
            p_upper: round2(upper),
            p_number: round2(number),
            ..self.clone()
        }
    }

    /// Restores `min_len <= max_len` by lowering `min_len`.
    pub fn validate(&mut self) {
        if self.min_len > self.max_len {
            self.min_len = self.max_len;
        }
    }

    /// Pulls both lengths into the configured bounds, then re-validates.
    pub fn clamp_lengths(&mut self, bounds: LengthBounds) {
        self.min_len = bounds.clamp(self.min_len);
        self.max_len = bounds.clamp(self.max_len);
        self.validate();
    }
}

/// Length genes are rounded to the nearest whole number; negative values
/// saturate at zero.
pub(crate) fn length_gene(gene: f64) -> usize {
    if gene.is_finite() {
        gene.round().max(0.0) as usize
    } else {
        0
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let genes = self.genes();
        write!(
            f,
            "[{:.2} {:.2} {:.2} {:.2} {:.2}]",
            genes[0], genes[1], genes[2], genes[3], genes[4]
        )
    }
}

impl FromStr for Individual {
    type Err = ProbevolveError;

    /// Parses the `[g0 g1 g2 g3 g4]` vector form. Brackets are optional and
    /// values written without a leading zero (`.50`) are accepted.
    fn from_str(s: &str) -> Result<Self> {
        let stripped: String = s.chars().filter(|c| *c != '[' && *c != ']').collect();
        let genes = stripped
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|e| ProbevolveError::Parse(format!("bad gene '{}': {}", token, e)))
            })
            .collect::<Result<Vec<f64>>>()?;

        if genes.len() != GENE_COUNT {
            return Err(ProbevolveError::Parse(format!(
                "expected {} genes, found {} in '{}'",
                GENE_COUNT,
                genes.len(),
                s.trim()
            )));
        }
        Self::from_genes(&genes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normalized_weights_sum_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let individual = Individual::random(LengthBounds::new(4, 8), &mut rng).normalized();
            let sum = individual.p_lower + individual.p_upper + individual.p_number;
            assert!((sum - 1.0).abs() <= 0.02, "sum was {}", sum);
            assert!(individual.min_len <= individual.max_len);
        }
    }

    #[test]
    fn test_all_zero_weights_normalize_to_uniform() {
        let individual = Individual::new(0.0, 0.0, 0.0, 4, 6).normalized();
        assert_eq!(individual.p_lower, 0.33);
        assert_eq!(individual.p_upper, 0.33);
        assert_eq!(individual.p_number, 0.33);
    }

    #[test]
    fn test_inverted_lengths_are_clamped() {
        let individual = Individual::new(0.5, 0.5, 0.5, 9, 5);
        assert_eq!(individual.min_len, 5);
        assert_eq!(individual.max_len, 5);
    }

    #[test]
    fn test_negative_and_nan_weights_become_zero() {
        let individual = Individual::new(-1.0, f64::NAN, 0.4, 4, 4);
        assert_eq!(individual.p_lower, 0.0);
        assert_eq!(individual.p_upper, 0.0);
        assert_eq!(individual.p_number, 0.4);
    }

    #[test]
    fn test_from_genes_rejects_wrong_length() {
        let err = Individual::from_genes(&[0.1, 0.2, 0.3, 4.0]).unwrap_err();
        assert!(matches!(
            err,
            ProbevolveError::InvalidGeneVector { expected: 5, actual: 4 }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_display_and_parse() {
        let individual = Individual::new(0.5, 0.25, 0.25, 4, 7);
        let text = individual.to_string();
        assert_eq!(text, "[0.50 0.25 0.25 4.00 7.00]");
        assert_eq!(text.parse::<Individual>().unwrap(), individual);
    }

    #[test]
    fn test_parse_accepts_missing_leading_zero() {
        let individual: Individual = "[.50 .30 .20 4.00 6.00 ]".parse().unwrap();
        assert_eq!(individual.p_lower, 0.5);
        assert_eq!(individual.p_upper, 0.3);
        assert_eq!(individual.min_len, 4);
        assert_eq!(individual.max_len, 6);
    }

    #[test]
    fn test_parse_failure_is_recoverable() {
        let err = "[0.1 0.2 0.3 4.0]".parse::<Individual>().unwrap_err();
        assert!(matches!(err, ProbevolveError::Parse(_)));
        assert!(!err.is_fatal());
        assert!("[a b c d e]".parse::<Individual>().is_err());
    }

    #[test]
    fn test_clamp_lengths_into_bounds() {
        let mut individual = Individual::new(0.3, 0.3, 0.4, 1, 40);
        individual.clamp_lengths(LengthBounds::new(4, 8));
        assert_eq!((individual.min_len, individual.max_len), (4, 8));
    }
}
