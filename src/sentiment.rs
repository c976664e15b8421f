use tracing::debug;

use crate::models::PolarityScores;

// --- Analyzer trait ---

pub trait SentimentAnalyzer {
    fn polarity_scores(&self, text: &str) -> PolarityScores;
    fn name(&self) -> &str;
}

/// Lexicon analyzer when the `vader` feature is compiled in, keyword
/// counting otherwise.
pub fn default_analyzer() -> Box<dyn SentimentAnalyzer> {
    #[cfg(feature = "vader")]
    {
        Box::new(VaderAnalyzer::new())
    }
    #[cfg(not(feature = "vader"))]
    {
        Box::new(KeywordAnalyzer)
    }
}

// --- Keyword fallback ---

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "love", "best", "perfect", "awesome",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "worst", "horrible", "disappointed",
];

/// Substring membership over two small word lists. `pos`/`neg` are
/// `count / 10` and are not capped at 1.0.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordAnalyzer;

impl SentimentAnalyzer for KeywordAnalyzer {
    fn polarity_scores(&self, text: &str) -> PolarityScores {
        let lower = text.to_lowercase();
        let pos_count = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
        let neg_count = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

        let compound = match pos_count.cmp(&neg_count) {
            std::cmp::Ordering::Greater => 0.5,
            std::cmp::Ordering::Less => -0.5,
            std::cmp::Ordering::Equal => 0.0,
        };

        PolarityScores {
            compound,
            pos: pos_count as f64 / 10.0,
            neu: 0.5,
            neg: neg_count as f64 / 10.0,
        }
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

// --- VADER ---

/// Built once; the lexicons it reads are loaded lazily by the crate.
#[cfg(feature = "vader")]
pub struct VaderAnalyzer {
    inner: vader_sentiment::SentimentIntensityAnalyzer<'static>,
}

#[cfg(feature = "vader")]
impl VaderAnalyzer {
    pub fn new() -> Self {
        Self {
            inner: vader_sentiment::SentimentIntensityAnalyzer::new(),
        }
    }
}

#[cfg(feature = "vader")]
impl Default for VaderAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "vader")]
impl SentimentAnalyzer for VaderAnalyzer {
    fn polarity_scores(&self, text: &str) -> PolarityScores {
        let scores = self.inner.polarity_scores(text);
        let get = |key: &str| scores.get(key).copied().unwrap_or(0.0);
        PolarityScores {
            compound: get("compound"),
            pos: get("pos"),
            neu: get("neu"),
            neg: get("neg"),
        }
    }

    fn name(&self) -> &str {
        "vader"
    }
}

// --- Scorer ---

pub struct SentimentScorer {
    analyzer: Box<dyn SentimentAnalyzer>,
}

impl SentimentScorer {
    pub fn new(analyzer: Box<dyn SentimentAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn analyzer_name(&self) -> &str {
        self.analyzer.name()
    }

    /// Empty text never reaches the analyzer.
    pub fn score(&self, text: &str) -> PolarityScores {
        if text.is_empty() {
            return PolarityScores::default();
        }
        let scores = self.analyzer.polarity_scores(text);
        debug!(
            analyzer = self.analyzer.name(),
            compound = scores.compound,
            pos = scores.pos,
            neu = scores.neu,
            neg = scores.neg,
            "Scored text"
        );
        scores
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(default_analyzer())
    }
}

/// Maps a compound score in [-1, 1] onto a 1.0-5.0 rating with one decimal.
pub fn rating(compound: f64) -> f64 {
    let compound = if compound.is_finite() { compound } else { 0.0 };
    let raw = 3.0 + compound * 2.0;
    round1(raw.clamp(1.0, 5.0))
}

/// 20..=100 companion of a rating.
pub fn score_for(rating: f64) -> i64 {
    (rating * 20.0).round() as i64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
