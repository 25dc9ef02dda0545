use crate::config::target::SPLIT_MARKER;
use crate::engines::generation::individual::Individual;
use crate::engines::probe::request::RawRequest;
use crate::error::{ProbevolveError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

const LOWER_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
// Zero is left out of the numeric alphabet.
const NUMBER_ALPHABET: &[u8] = b"123456789";

/// Character class drawn for each position of a generated piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Lower,
    Upper,
    Number,
}

impl CharClass {
    const ALL: [CharClass; 3] = [CharClass::Lower, CharClass::Upper, CharClass::Number];

    pub fn alphabet(self) -> &'static [u8] {
        match self {
            CharClass::Lower => LOWER_ALPHABET,
            CharClass::Upper => UPPER_ALPHABET,
            CharClass::Number => NUMBER_ALPHABET,
        }
    }

    fn sample<R: Rng>(self, rng: &mut R) -> char {
        let alphabet = self.alphabet();
        alphabet[rng.gen_range(0..alphabet.len())] as char
    }
}

/// Where the generated piece is spliced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTemplate {
    Url { prefix: String, suffix: String },
    /// Raw HTTP request with the piece substituted at every split marker.
    Request { raw: String },
}

impl ProbeTemplate {
    /// Splits `url` at the first marker. Without a marker the whole URL is the
    /// prefix and the piece is appended.
    pub fn from_url(url: &str) -> Self {
        match url.split_once(SPLIT_MARKER) {
            Some((prefix, suffix)) => ProbeTemplate::Url {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => ProbeTemplate::Url {
                prefix: url.to_string(),
                suffix: String::new(),
            },
        }
    }

    /// The template must carry the marker and still parse as a request once a
    /// piece is substituted.
    pub fn from_request(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if !raw.contains(SPLIT_MARKER) {
            return Err(ProbevolveError::Configuration(format!(
                "Request template has no '{}' marker to substitute",
                SPLIT_MARKER
            )));
        }
        let template = ProbeTemplate::Request { raw };
        RawRequest::parse(&template.splice("a"), false)
            .map_err(|e| ProbevolveError::Configuration(format!("Invalid request template: {}", e)))?;
        Ok(template)
    }

    pub fn is_request(&self) -> bool {
        matches!(self, ProbeTemplate::Request { .. })
    }

    pub fn splice(&self, piece: &str) -> String {
        match self {
            ProbeTemplate::Url { prefix, suffix } => format!("{}{}{}", prefix, piece, suffix),
            ProbeTemplate::Request { raw } => raw.replace(SPLIT_MARKER, piece),
        }
    }
}

/// Draws a random piece: a length uniform in `[min_len, max_len]`, then per
/// position a class from the normalized weights and a character uniform within
/// that class. All-zero weights draw classes uniformly.
pub fn generate_piece<R: Rng>(
    p_lower: f64,
    p_upper: f64,
    p_number: f64,
    min_len: usize,
    max_len: usize,
    rng: &mut R,
) -> String {
    let normalized = Individual::new(p_lower, p_upper, p_number, min_len, max_len).normalized();
    let weights = [normalized.p_lower, normalized.p_upper, normalized.p_number];

    let length = if normalized.min_len == normalized.max_len {
        normalized.min_len
    } else {
        rng.gen_range(normalized.min_len..=normalized.max_len)
    };

    // Normalization never yields all-zero weights, so this only guards
    // against float oddities.
    let classes = WeightedIndex::new(weights).ok();

    (0..length)
        .map(|_| {
            let class = match &classes {
                Some(dist) => CharClass::ALL[dist.sample(rng)],
                None => CharClass::ALL[rng.gen_range(0..CharClass::ALL.len())],
            };
            class.sample(rng)
        })
        .collect()
}

/// Turns an individual's parameters into concrete probes.
#[derive(Debug, Clone)]
pub struct ProbeGenerator {
    template: ProbeTemplate,
}

impl ProbeGenerator {
    pub fn new(template: ProbeTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &ProbeTemplate {
        &self.template
    }

    pub fn generate<R: Rng>(&self, individual: &Individual, rng: &mut R) -> String {
        let piece = generate_piece(
            individual.p_lower,
            individual.p_upper,
            individual.p_number,
            individual.min_len,
            individual.max_len,
            rng,
        );
        self.template.splice(&piece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_piece_length_within_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let piece = generate_piece(0.4, 0.4, 0.2, 3, 6, &mut rng);
            assert!((3..=6).contains(&piece.len()), "len was {}", piece.len());
        }
    }

    #[test]
    fn test_fixed_length_when_bounds_equal() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            assert_eq!(generate_piece(1.0, 1.0, 1.0, 5, 5, &mut rng).len(), 5);
        }
    }

    #[test]
    fn test_single_class_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let lower = generate_piece(1.0, 0.0, 0.0, 20, 20, &mut rng);
        assert!(lower.chars().all(|c| c.is_ascii_lowercase()));

        let upper = generate_piece(0.0, 2.5, 0.0, 20, 20, &mut rng);
        assert!(upper.chars().all(|c| c.is_ascii_uppercase()));

        let digits = generate_piece(0.0, 0.0, 0.7, 200, 200, &mut rng);
        assert!(digits.chars().all(|c| c.is_ascii_digit() && c != '0'));
    }

    #[test]
    fn test_all_zero_weights_do_not_panic() {
        let mut rng = StdRng::seed_from_u64(4);
        let piece = generate_piece(0.0, 0.0, 0.0, 300, 300, &mut rng);
        assert_eq!(piece.len(), 300);
        assert!(piece.chars().any(|c| c.is_ascii_lowercase()));
        assert!(piece.chars().any(|c| c.is_ascii_uppercase()));
        assert!(piece.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_same_seed_same_probe() {
        let generator = ProbeGenerator::new(ProbeTemplate::from_url("http://t.co/^"));
        let individual = Individual::new(0.3, 0.3, 0.4, 4, 8);
        let a = generator.generate(&individual, &mut StdRng::seed_from_u64(99));
        let b = generator.generate(&individual, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_url_template_splice() {
        let template = ProbeTemplate::from_url("https://sho.rt/^?ref=x");
        assert_eq!(template.splice("aB3"), "https://sho.rt/aB3?ref=x");

        let template = ProbeTemplate::from_url("https://sho.rt/");
        assert_eq!(template.splice("aB3"), "https://sho.rt/aB3");
    }

    #[test]
    fn test_request_template_requires_marker() {
        assert!(ProbeTemplate::from_request("GET / HTTP/1.1\nHost: x\n").is_err());

        let template = ProbeTemplate::from_request("GET /item/^ HTTP/1.1\nHost: x\n").unwrap();
        assert!(template.is_request());
        assert_eq!(template.splice("Zz9"), "GET /item/Zz9 HTTP/1.1\nHost: x\n");
    }

    #[test]
    fn test_request_template_must_parse() {
        let no_host = ProbeTemplate::from_request("GET /item/^ HTTP/1.1\nAccept: */*\n");
        assert!(matches!(no_host, Err(ProbevolveError::Configuration(_))));

        let no_resource = ProbeTemplate::from_request("^\nHost: x\n");
        assert!(matches!(no_resource, Err(ProbevolveError::Configuration(_))));
    }
}
