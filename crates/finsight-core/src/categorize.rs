//! Category assignment engine
//!
//! Categories come from, in order:
//! 1. User-defined rules (highest priority first)
//! 2. Built-in keyword lists for common Indian merchants and billers
//! 3. A locally trained text model (TF-IDF with per-category centroids)
//! 4. `other`
//!
//! The model is optional. It is trained from a user's own transactions
//! (manual corrections win over keyword labels) and persisted as JSON.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Category, CategoryRule, CategorySource, PatternType};

/// Minimum number of labelled descriptions needed to train a model
pub const MIN_TRAINING_SAMPLES: usize = 20;

/// Vocabulary cap for the TF-IDF vectorizer
pub const MAX_FEATURES: usize = 5000;

/// Fraction of samples held out to measure accuracy
const TEST_FRACTION: f64 = 0.2;

/// Seed for the train/test shuffle so retraining on the same data is stable
const SPLIT_SEED: u64 = 42;

/// Built-in keyword rules, checked in category order
const KEYWORD_RULES: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &[
            "swiggy", "zomato", "uber eats", "dominos", "pizza", "restaurant", "cafe", "coffee",
            "food", "grocery", "supermarket", "kirana", "bigbasket", "milk", "vegetable",
        ],
    ),
    (
        Category::Transportation,
        &[
            "uber", "ola", "cab", "taxi", "auto", "metro", "train", "bus", "petrol", "diesel",
            "fuel", "parking", "rapido",
        ],
    ),
    (
        Category::Shopping,
        &[
            "amazon", "flipkart", "myntra", "ajio", "nykaa", "shop", "store", "mall", "market",
            "purchase", "buy", "retail",
        ],
    ),
    (
        Category::Utilities,
        &[
            "electricity", "water", "gas", "bill", "recharge", "mobile", "phone", "internet",
            "broadband", "wifi", "postpaid", "prepaid", "dth", "utility", "jio", "airtel", "vi",
            "tata power", "bses", "mahanagar gas",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "movie", "netflix", "prime", "hotstar", "disney", "zee5", "sonyliv", "theatre",
            "cinema", "ticket", "concert", "show", "spotify", "gaana", "wynk", "music",
        ],
    ),
    (
        Category::Health,
        &[
            "hospital", "doctor", "clinic", "medical", "medicine", "pharmacy", "health",
            "dental", "eye", "apollo", "max", "medplus", "netmeds", "pharmeasy", "1mg",
        ],
    ),
    (
        Category::Education,
        &[
            "school", "college", "university", "course", "class", "tuition", "fee", "book",
            "stationery", "udemy", "coursera", "edx", "byju", "unacademy", "education",
        ],
    ),
    (
        Category::Travel,
        &[
            "flight", "air", "indigo", "spicejet", "hotel", "resort", "booking", "makemytrip",
            "goibibo", "oyo", "travel", "tour", "holiday", "vacation", "irctc", "railway",
        ],
    ),
    (
        Category::Housing,
        &[
            "rent", "maintenance", "society", "apartment", "flat", "house", "property", "loan",
            "emi", "mortgage", "realty",
        ],
    ),
    (
        Category::Income,
        &[
            "salary", "income", "payment received", "stipend", "bonus", "interest", "dividend",
            "refund", "reimbursement", "credit",
        ],
    ),
    (
        Category::Investment,
        &[
            "mutual fund", "share", "stock", "bond", "debenture", "fd", "fixed deposit", "gold",
            "zerodha", "upstox", "groww", "investment", "sip", "etf", "nps", "ppf",
        ],
    ),
    (
        Category::Bills,
        &[
            "bill payment", "due", "invoice", "subscription", "insurance", "premium", "tax",
            "gst", "emi", "installment", "payment",
        ],
    ),
];

/// English stop words dropped before vectorizing
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself",
    "just", "ll", "m", "ma", "me", "mightn", "more", "most", "mustn", "my", "myself", "needn",
    "no", "nor", "not", "now", "o", "of", "off", "on", "once", "only", "or", "other", "our",
    "ours", "ourselves", "out", "over", "own", "re", "s", "same", "shan", "she", "should",
    "shouldn", "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "ve", "very", "was", "wasn", "we", "were", "weren", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "won",
    "wouldn", "y", "you", "your", "yours", "yourself", "yourselves",
];

/// Lowercase, keep letters only, split, and drop stop words
pub fn preprocess(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Match a description against the built-in keyword lists
pub fn keyword_category(description: &str) -> Option<Category> {
    let desc_lower = description.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| desc_lower.contains(k)))
        .map(|(category, _)| *category)
}

/// Check whether a description matches a rule pattern
pub fn pattern_matches(description: &str, pattern: &str, pattern_type: PatternType) -> Result<bool> {
    let desc_upper = description.to_uppercase();

    match pattern_type {
        PatternType::Contains => {
            // Support pipe-separated OR patterns
            Ok(pattern
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .any(|p| desc_upper.contains(&p.to_uppercase())))
        }
        PatternType::Regex => {
            let re = Regex::new(&format!("(?i){}", pattern))?;
            Ok(re.is_match(description))
        }
        PatternType::Exact => Ok(desc_upper.trim() == pattern.trim().to_uppercase()),
    }
}

/// Result of categorizing one description
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAssignment {
    pub category: Category,
    pub source: CategorySource,
    /// Rule that matched, when `source` is `rule`
    pub rule_id: Option<i64>,
    /// Cosine similarity, when `source` is `model`
    pub confidence: Option<f64>,
}

impl CategoryAssignment {
    fn new(category: Category, source: CategorySource) -> Self {
        Self {
            category,
            source,
            rule_id: None,
            confidence: None,
        }
    }
}

/// Categorizes transaction descriptions
#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    model: Option<CategoryModel>,
}

impl Categorizer {
    /// Create a categorizer with rules only
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a categorizer that falls back to a trained model
    pub fn with_model(model: CategoryModel) -> Self {
        Self { model: Some(model) }
    }

    /// Load the model from disk if present
    ///
    /// A missing file means no model. A file that cannot be read is logged
    /// and ignored so the app still starts with rule-based categorization.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No categorizer model at {}", path.display());
            return Self::new();
        }

        match CategoryModel::load(path) {
            Ok(model) => {
                info!(
                    "Loaded categorizer model from {} ({} terms)",
                    path.display(),
                    model.vocabulary.len()
                );
                Self::with_model(model)
            }
            Err(e) => {
                warn!("Ignoring unreadable categorizer model {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&CategoryModel> {
        self.model.as_ref()
    }

    pub fn set_model(&mut self, model: CategoryModel) {
        self.model = Some(model);
    }

    /// Assign a category to a description
    ///
    /// `rules` are the owner's category rules; they are applied in priority
    /// order regardless of the slice order.
    pub fn categorize(&self, description: &str, rules: &[CategoryRule]) -> CategoryAssignment {
        if description.trim().is_empty() {
            return CategoryAssignment::new(Category::Other, CategorySource::Fallback);
        }

        if let Some(assignment) = self.apply_rules(description, rules) {
            return assignment;
        }

        if let Some(category) = keyword_category(description) {
            return CategoryAssignment::new(category, CategorySource::Keyword);
        }

        if let Some(model) = &self.model {
            if let Some((category, score)) = model.predict(description) {
                return CategoryAssignment {
                    category,
                    source: CategorySource::Model,
                    rule_id: None,
                    confidence: Some(score),
                };
            }
        }

        CategoryAssignment::new(Category::Other, CategorySource::Fallback)
    }

    /// Label used as training ground truth when the user has not corrected it
    pub fn rule_label(&self, description: &str, rules: &[CategoryRule]) -> Category {
        self.apply_rules(description, rules)
            .map(|a| a.category)
            .or_else(|| keyword_category(description))
            .unwrap_or(Category::Other)
    }

    fn apply_rules(&self, description: &str, rules: &[CategoryRule]) -> Option<CategoryAssignment> {
        let mut ordered: Vec<&CategoryRule> = rules.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));

        for rule in ordered {
            match pattern_matches(description, &rule.pattern, rule.pattern_type) {
                Ok(true) => {
                    return Some(CategoryAssignment {
                        category: rule.category,
                        source: CategorySource::Rule,
                        rule_id: Some(rule.id),
                        confidence: None,
                    })
                }
                Ok(false) => {}
                Err(e) => warn!("Skipping rule {} with invalid pattern: {}", rule.id, e),
            }
        }

        None
    }
}

/// Outcome of training a model
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_size: usize,
    pub test_size: usize,
    /// Fraction of held-out samples predicted correctly
    pub accuracy: f64,
    pub categories: usize,
}

/// TF-IDF text model with one centroid per category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    centroids: BTreeMap<Category, Vec<f64>>,
}

impl CategoryModel {
    /// Train on `(description, label)` pairs
    ///
    /// Holds out a seeded 20% of the samples to measure accuracy; the model
    /// is fitted on the remainder.
    pub fn train(samples: &[(String, Category)]) -> Result<(Self, TrainingReport)> {
        let samples: Vec<&(String, Category)> = samples
            .iter()
            .filter(|(desc, _)| !desc.trim().is_empty())
            .collect();

        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(Error::Model(format!(
                "Not enough data to train the model: {} descriptions, need at least {}",
                samples.len(),
                MIN_TRAINING_SAMPLES
            )));
        }

        let mut indices: Vec<usize> = (0..samples.len()).collect();
        let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
        indices.shuffle(&mut rng);

        let test_size = ((samples.len() as f64) * TEST_FRACTION).ceil() as usize;
        let (test_idx, train_idx) = indices.split_at(test_size);

        let train_docs: Vec<(Vec<String>, Category)> = train_idx
            .iter()
            .map(|&i| (preprocess(&samples[i].0), samples[i].1))
            .collect();

        let model = Self::fit(&train_docs)?;

        let correct = test_idx
            .iter()
            .filter(|&&i| {
                let predicted = model
                    .predict(&samples[i].0)
                    .map(|(c, _)| c)
                    .unwrap_or(Category::Other);
                predicted == samples[i].1
            })
            .count();
        let accuracy = correct as f64 / test_size as f64;

        let report = TrainingReport {
            samples: samples.len(),
            train_size: train_idx.len(),
            test_size,
            accuracy,
            categories: model.centroids.len(),
        };
        info!(
            "Model trained on {} samples with accuracy: {:.2}",
            report.train_size, report.accuracy
        );

        Ok((model, report))
    }

    fn fit(docs: &[(Vec<String>, Category)]) -> Result<Self> {
        // Document frequency per term
        let mut df: HashMap<&str, usize> = HashMap::new();
        for (tokens, _) in docs {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        if df.is_empty() {
            return Err(Error::Model(
                "Training descriptions contain no usable words".to_string(),
            ));
        }

        let mut terms: Vec<(&str, usize)> = df.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        terms.truncate(MAX_FEATURES);

        let n_docs = docs.len() as f64;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (index, (term, freq)) in terms.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            // Smoothed idf
            idf.push(((1.0 + n_docs) / (1.0 + freq as f64)).ln() + 1.0);
        }

        let mut model = Self {
            vocabulary,
            idf,
            centroids: BTreeMap::new(),
        };

        let mut sums: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
        for (tokens, category) in docs {
            let Some(vector) = model.vectorize(tokens) else {
                continue;
            };
            let sum = sums
                .entry(*category)
                .or_insert_with(|| vec![0.0; model.idf.len()]);
            for (acc, v) in sum.iter_mut().zip(vector) {
                *acc += v;
            }
        }

        for (category, mut centroid) in sums {
            if normalize(&mut centroid) {
                model.centroids.insert(category, centroid);
            }
        }

        Ok(model)
    }

    /// L2-normalized TF-IDF vector, or None when no term is in the vocabulary
    fn vectorize(&self, tokens: &[String]) -> Option<Vec<f64>> {
        let mut vector = vec![0.0; self.idf.len()];
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                vector[index] += self.idf[index];
            }
        }
        normalize(&mut vector).then_some(vector)
    }

    /// Predict a category and its cosine similarity
    pub fn predict(&self, description: &str) -> Option<(Category, f64)> {
        let vector = self.vectorize(&preprocess(description))?;

        self.centroids
            .iter()
            .map(|(category, centroid)| {
                let score: f64 = centroid.iter().zip(&vector).map(|(a, b)| a * b).sum();
                (*category, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Number of terms in the vocabulary
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Read a model saved with [`CategoryModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let model: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        if model.vocabulary.len() != model.idf.len()
            || model.centroids.values().any(|c| c.len() != model.idf.len())
        {
            return Err(Error::Model("Model file is inconsistent".to_string()));
        }
        Ok(model)
    }

    /// Write the model as JSON, replacing any existing file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, self)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        debug!("Saved categorizer model to {}", path.display());
        Ok(())
    }
}

/// Scale a vector to unit length; false when it is all zeros
fn normalize(vector: &mut [f64]) -> bool {
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return false;
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: i64, pattern: &str, pattern_type: PatternType, category: Category, priority: i32) -> CategoryRule {
        CategoryRule {
            id,
            user_id: 1,
            pattern: pattern.to_string(),
            pattern_type,
            category,
            priority,
            created_at: Utc::now(),
        }
    }

    fn training_set() -> Vec<(String, Category)> {
        let mut samples = Vec::new();
        for i in 0..10 {
            samples.push((format!("GREENLEAF ORGANICS ORDER {}", i), Category::Food));
            samples.push((format!("KWIKFIX GARAGE SERVICE {}", i), Category::Transportation));
            samples.push((format!("LUMEN POWER CORP {}", i), Category::Utilities));
        }
        samples
    }

    #[test]
    fn test_preprocess() {
        assert_eq!(
            preprocess("UPI/1234/Swiggy-Order to the Restaurant!"),
            vec!["upi", "swiggy", "order", "restaurant"]
        );
        assert!(preprocess("  123 456 ").is_empty());
    }

    #[test]
    fn test_keyword_order() {
        // Food is checked before transportation
        assert_eq!(keyword_category("UBER EATS ORDER"), Some(Category::Food));
        assert_eq!(keyword_category("UBER TRIP BLR"), Some(Category::Transportation));
        assert_eq!(keyword_category("ELECTRICITY BILL"), Some(Category::Utilities));
        assert_eq!(keyword_category("NETFLIX"), Some(Category::Entertainment));
        assert_eq!(keyword_category("SALARY APRIL"), Some(Category::Income));
        assert_eq!(keyword_category("ZERODHA"), Some(Category::Investment));
        assert_eq!(keyword_category("XQZ"), None);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("Swiggy Order", "zomato|SWIGGY", PatternType::Contains).unwrap());
        assert!(!pattern_matches("Swiggy Order", "zomato", PatternType::Contains).unwrap());
        assert!(pattern_matches("NEFT-ACME LTD-APR", r"^neft-acme", PatternType::Regex).unwrap());
        assert!(pattern_matches("rent", "RENT", PatternType::Exact).unwrap());
        assert!(!pattern_matches("rent april", "RENT", PatternType::Exact).unwrap());
        assert!(pattern_matches("x", "(", PatternType::Regex).is_err());
    }

    #[test]
    fn test_categorize_priority() {
        let categorizer = Categorizer::new();

        let a = categorizer.categorize("SWIGGY ORDER", &[]);
        assert_eq!(a.category, Category::Food);
        assert_eq!(a.source, CategorySource::Keyword);

        let rules = vec![
            rule(1, "swiggy", PatternType::Contains, Category::Entertainment, 0),
            rule(2, "swiggy", PatternType::Contains, Category::Bills, 10),
        ];
        let a = categorizer.categorize("SWIGGY ORDER", &rules);
        assert_eq!(a.category, Category::Bills);
        assert_eq!(a.source, CategorySource::Rule);
        assert_eq!(a.rule_id, Some(2));

        let a = categorizer.categorize("XQZ 991", &[]);
        assert_eq!(a.category, Category::Other);
        assert_eq!(a.source, CategorySource::Fallback);

        let a = categorizer.categorize("   ", &rules);
        assert_eq!(a.category, Category::Other);
    }

    #[test]
    fn test_invalid_rule_is_skipped() {
        let categorizer = Categorizer::new();
        let rules = vec![rule(1, "(", PatternType::Regex, Category::Bills, 5)];
        let a = categorizer.categorize("NETFLIX", &rules);
        assert_eq!(a.category, Category::Entertainment);
    }

    #[test]
    fn test_train_requires_enough_samples() {
        let samples: Vec<(String, Category)> = (0..19)
            .map(|i| (format!("SHOP {}", i), Category::Shopping))
            .collect();
        let err = CategoryModel::train(&samples).unwrap_err();
        assert!(err.to_string().contains("Not enough data"));
    }

    #[test]
    fn test_train_and_predict() {
        let (model, report) = CategoryModel::train(&training_set()).unwrap();
        assert_eq!(report.samples, 30);
        assert_eq!(report.test_size, 6);
        assert_eq!(report.train_size, 24);
        assert!(report.accuracy > 0.99);

        let (category, score) = model.predict("greenleaf organics").unwrap();
        assert_eq!(category, Category::Food);
        assert!(score > 0.0);
        assert_eq!(model.predict("LUMEN POWER").unwrap().0, Category::Utilities);
        assert!(model.predict("completely unseen words").is_none());
    }

    #[test]
    fn test_training_is_deterministic() {
        let (_, a) = CategoryModel::train(&training_set()).unwrap();
        let (_, b) = CategoryModel::train(&training_set()).unwrap();
        assert_eq!(a.accuracy, b.accuracy);
        assert_eq!(a.test_size, b.test_size);
    }

    #[test]
    fn test_model_fallback_in_categorizer() {
        let (model, _) = CategoryModel::train(&training_set()).unwrap();
        let categorizer = Categorizer::with_model(model);

        let a = categorizer.categorize("KWIKFIX GARAGE", &[]);
        assert_eq!(a.category, Category::Transportation);
        assert_eq!(a.source, CategorySource::Model);
        assert!(a.confidence.is_some());

        // Keywords still win over the model
        let a = categorizer.categorize("LUMEN POWER NETFLIX", &[]);
        assert_eq!(a.source, CategorySource::Keyword);
    }

    #[test]
    fn test_model_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let (model, _) = CategoryModel::train(&training_set()).unwrap();
        model.save(&path).unwrap();

        let categorizer = Categorizer::load(&path);
        assert!(categorizer.has_model());
        assert_eq!(
            categorizer.categorize("GREENLEAF ORGANICS", &[]).category,
            Category::Food
        );
    }

    #[test]
    fn test_load_missing_or_corrupt_model() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(!Categorizer::load(&missing).has_model());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(!Categorizer::load(&corrupt).has_model());
    }
}
