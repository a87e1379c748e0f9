// SPDX-License-Identifier: MIT

//! Question routing
//!
//! Two strategies, tried in order: a semantic prototype classifier (cosine
//! similarity of the question against per-class prototype embeddings), and a
//! deterministic lexical fallback on word-boundary domain terms. The
//! classifier is built once at warm-up and injected; a semantic failure is
//! absorbed locally and never surfaced.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::state::Route;
use crate::llm::{Embedder, ModelError};

static BENEFIT_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(benefit|benefits|coverage|cover|covers|covered|copay|coinsurance|deductible|eligible|eligibility|plan|network)\b",
    )
    .expect("benefit term pattern")
});

static CLAIM_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(claim|claims|eob|denied|denial|allowed|paid|adjusted|appeal|authorization|provider)\b",
    )
    .expect("claim term pattern")
});

/// Prototype phrases embedded once per class at classifier construction.
const BENEFIT_PROTOTYPES: &[&str] = &[
    "What does my plan cover for this service?",
    "What is my copay for a specialist visit?",
    "How much of my deductible is left this year?",
    "Am I covered for out-of-network care?",
];

const CLAIM_PROTOTYPES: &[&str] = &[
    "Why was my claim denied?",
    "What amount was allowed and paid on my claim?",
    "What did the explanation of benefits say about this claim?",
    "How do I appeal a denied claim?",
];

const BOTH_PROTOTYPES: &[&str] = &[
    "Does my plan cover this procedure and why was the claim for it denied?",
    "What are my benefits for imaging and what happened to my imaging claim?",
];

/// Routing outcome with its confidence and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteDecision {
    pub route: Route,
    /// In [0,1] for the semantic strategy; fixed 1.0 for the lexical one.
    pub confidence: f32,
    pub semantic: bool,
}

/// Cosine classifier over precomputed prototype embeddings.
pub struct SemanticClassifier {
    embedder: Arc<dyn Embedder>,
    benefit: Vec<Vec<f32>>,
    claim: Vec<Vec<f32>>,
    both: Vec<Vec<f32>>,
    clarify_threshold: f32,
    both_threshold: f32,
}

impl SemanticClassifier {
    /// Embeds all prototype phrases up front; fails if the embedding
    /// backend is unreachable, in which case the caller falls back to the
    /// lexical-only router.
    pub async fn new(
        embedder: Arc<dyn Embedder>,
        clarify_threshold: f32,
        both_threshold: f32,
    ) -> Result<Self, ModelError> {
        let mut classes = Vec::with_capacity(3);
        for prototypes in [BENEFIT_PROTOTYPES, CLAIM_PROTOTYPES, BOTH_PROTOTYPES] {
            let mut embedded = Vec::with_capacity(prototypes.len());
            for phrase in prototypes {
                embedded.push(embedder.embed(phrase).await?);
            }
            classes.push(embedded);
        }
        let both = classes.pop().unwrap_or_default();
        let claim = classes.pop().unwrap_or_default();
        let benefit = classes.pop().unwrap_or_default();

        Ok(Self {
            embedder,
            benefit,
            claim,
            both,
            clarify_threshold,
            both_threshold,
        })
    }

    fn class_score(prototypes: &[Vec<f32>], query: &[f32]) -> f32 {
        if prototypes.is_empty() {
            return 0.0;
        }
        let total: f32 = prototypes.iter().map(|p| dot(p, query)).sum();
        total / prototypes.len() as f32
    }

    pub async fn classify(&self, question: &str) -> Result<(Route, f32), ModelError> {
        let query = self.embedder.embed(question).await?;

        let benefit = Self::class_score(&self.benefit, &query);
        let claim = Self::class_score(&self.claim, &query);
        let both = Self::class_score(&self.both, &query);

        let (best_route, best_score) = [
            (Route::Benefit, benefit),
            (Route::Claim, claim),
            (Route::Both, both),
        ]
        .into_iter()
        .fold((Route::Clarify, f32::MIN), |acc, (route, score)| {
            if score > acc.1 {
                (route, score)
            } else {
                acc
            }
        });

        if best_score < self.clarify_threshold {
            return Ok((Route::Clarify, best_score));
        }
        if benefit > self.both_threshold && claim > self.both_threshold {
            return Ok((Route::Both, (benefit + claim) / 2.0));
        }
        Ok((best_route, best_score))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Router with semantic strategy and lexical fallback.
pub struct Router {
    semantic: Option<Arc<SemanticClassifier>>,
}

impl Router {
    pub fn new(semantic: Option<Arc<SemanticClassifier>>) -> Self {
        Self { semantic }
    }

    /// Deterministic word-boundary term matching. Confidence is fixed 1.0.
    pub fn classify_lexical(question: &str) -> RouteDecision {
        let benefit = BENEFIT_TERMS.is_match(question);
        let claim = CLAIM_TERMS.is_match(question);

        let route = match (benefit, claim) {
            (true, true) => Route::Both,
            (true, false) => Route::Benefit,
            (false, true) => Route::Claim,
            (false, false) => Route::Clarify,
        };
        RouteDecision {
            route,
            confidence: 1.0,
            semantic: false,
        }
    }

    pub async fn classify(&self, question: &str) -> RouteDecision {
        if let Some(classifier) = &self.semantic {
            match classifier.classify(question).await {
                Ok((route, confidence)) => {
                    return RouteDecision {
                        route,
                        confidence,
                        semantic: true,
                    };
                }
                Err(e) => {
                    log::warn!("semantic routing unavailable, using lexical fallback: {}", e);
                }
            }
        }
        Self::classify_lexical(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_lexical_benefit_only() {
        let d = Router::classify_lexical("What's my copay for imaging?");
        assert_eq!(d.route, Route::Benefit);
        assert_eq!(d.confidence, 1.0);
        assert!(!d.semantic);
    }

    #[test]
    fn test_lexical_claim_only() {
        let d = Router::classify_lexical("Why was my claim denied?");
        assert_eq!(d.route, Route::Claim);
    }

    #[test]
    fn test_lexical_both() {
        let d = Router::classify_lexical("Does my plan cover ER and why was this claim denied?");
        assert_eq!(d.route, Route::Both);
    }

    #[test]
    fn test_lexical_neither_clarifies() {
        let d = Router::classify_lexical("hello");
        assert_eq!(d.route, Route::Clarify);
    }

    #[test]
    fn test_lexical_word_boundaries() {
        // "planning" and "reclaim" must not trigger domain terms.
        let d = Router::classify_lexical("I am planning to reclaim my time");
        assert_eq!(d.route, Route::Clarify);
    }

    /// Embedder returning a fixed vector per known phrase.
    struct StubEmbedder {
        axis: fn(&str) -> Vec<f32>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
            Ok((self.axis)(text))
        }
    }

    /// Failing embedder used to exercise the fallback path.
    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
            Err(ModelError::api("tei-embed", "connection refused"))
        }
    }

    fn benefit_claim_axis(text: &str) -> Vec<f32> {
        // Benefit phrases on the x axis, claim phrases on the y axis,
        // "both" prototypes on the diagonal.
        let t = text.to_lowercase();
        if t.contains("denied") || t.contains("appeal") || t.contains("allowed") || t.contains("explanation") {
            if t.contains("cover") || t.contains("plan") || t.contains("benefit") {
                vec![0.707, 0.707]
            } else {
                vec![0.0, 1.0]
            }
        } else if t.contains("cover") || t.contains("copay") || t.contains("deductible") || t.contains("plan") || t.contains("benefit") {
            vec![1.0, 0.0]
        } else {
            vec![0.1, 0.1]
        }
    }

    async fn make_classifier() -> SemanticClassifier {
        let embedder = Arc::new(StubEmbedder {
            axis: benefit_claim_axis,
        });
        SemanticClassifier::new(embedder, 0.30, 0.45)
            .await
            .expect("stub classifier")
    }

    #[tokio::test]
    async fn test_semantic_benefit_route() {
        let classifier = make_classifier().await;
        let (route, score) = classifier
            .classify("What is the copay under my plan?")
            .await
            .unwrap();
        assert_eq!(route, Route::Benefit);
        assert!(score > 0.30);
    }

    #[tokio::test]
    async fn test_semantic_low_score_clarifies() {
        let classifier = make_classifier().await;
        let (route, _score) = classifier.classify("hello there").await.unwrap();
        assert_eq!(route, Route::Clarify);
    }

    #[tokio::test]
    async fn test_semantic_both_when_both_classes_high() {
        let classifier = make_classifier().await;
        let (route, score) = classifier
            .classify("Is this covered by my plan and why was the claim denied?")
            .await
            .unwrap();
        assert_eq!(route, Route::Both);
        assert!(score > 0.45);
    }

    #[tokio::test]
    async fn test_router_falls_back_when_embed_fails() {
        // Classifier whose prototypes exist but whose embedder went down
        // after warm-up.
        let classifier = SemanticClassifier {
            embedder: Arc::new(DownEmbedder),
            benefit: vec![vec![1.0, 0.0]],
            claim: vec![vec![0.0, 1.0]],
            both: vec![vec![0.707, 0.707]],
            clarify_threshold: 0.30,
            both_threshold: 0.45,
        };

        let router = Router::new(Some(Arc::new(classifier)));
        let d = router.classify("Why was my claim denied?").await;
        assert_eq!(d.route, Route::Claim);
        assert!(!d.semantic);
        assert_eq!(d.confidence, 1.0);
    }
}
