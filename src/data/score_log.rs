use crate::engines::generation::individual::ScoredIndividual;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only record of every generation's scores.
#[derive(Debug, Clone)]
pub struct ScoreLog {
    path: PathBuf,
}

/// Score as a share of the probes issued, `%` prefixed and rounded to two
/// decimals. Zero iterations report `%0.00`.
pub fn score_as_percentage(score: f64, iterations: usize) -> String {
    let percent = if iterations == 0 {
        0.0
    } else {
        score / iterations as f64 * 100.0
    };
    format!("%{:.2}", (percent * 100.0).round() / 100.0)
}

impl ScoreLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders one generation block: members sorted by score descending, then
    /// the average, then a blank separator line.
    pub fn render(scored: &[ScoredIndividual], iterations: usize) -> String {
        let mut sorted: Vec<&ScoredIndividual> = scored.iter().collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));

        let mut block = String::new();
        for member in &sorted {
            block.push_str(&format!(
                "{} {}\n",
                score_as_percentage(f64::from(member.score), iterations),
                member.individual
            ));
        }

        let average = if scored.is_empty() {
            0.0
        } else {
            scored.iter().map(|m| f64::from(m.score)).sum::<f64>() / scored.len() as f64
        };
        block.push_str(&format!(
            "Average score: {}\n\n",
            score_as_percentage(average, iterations)
        ));
        block
    }

    /// Appends a generation block. Write failures are logged and swallowed:
    /// the log is a tracking aid and must not stop the search.
    pub fn append(&self, scored: &[ScoredIndividual], iterations: usize) {
        let block = Self::render(scored, iterations);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(block.as_bytes()));

        if let Err(e) = written {
            log::warn!("could not write to score log {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::individual::Individual;
    use tempfile::TempDir;

    #[test]
    fn test_score_as_percentage() {
        assert_eq!(score_as_percentage(5.0, 10), "%50.00");
        assert_eq!(score_as_percentage(1.0, 3), "%33.33");
        assert_eq!(score_as_percentage(0.0, 10), "%0.00");
        assert_eq!(score_as_percentage(4.0, 0), "%0.00");
    }

    #[test]
    fn test_render_sorts_descending_with_average() {
        let scored = vec![
            ScoredIndividual::new(Individual::new(0.5, 0.3, 0.2, 4, 6), 1),
            ScoredIndividual::new(Individual::new(0.2, 0.2, 0.6, 5, 5), 3),
        ];

        let block = ScoreLog::render(&scored, 10);
        assert_eq!(
            block,
            "%30.00 [0.20 0.20 0.60 5.00 5.00]\n\
             %10.00 [0.50 0.30 0.20 4.00 6.00]\n\
             Average score: %20.00\n\n"
        );
    }

    #[test]
    fn test_append_accumulates_blocks() {
        let dir = TempDir::new().unwrap();
        let log = ScoreLog::new(dir.path().join("scores.txt"));
        let scored = vec![ScoredIndividual::new(Individual::new(1.0, 0.0, 0.0, 4, 4), 2)];

        log.append(&scored, 4);
        log.append(&scored, 4);

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("Average score: %50.00").count(), 2);
    }
}
