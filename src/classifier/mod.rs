// src/classifier/mod.rs

use crate::model::ScenarioCategory;

/// Assigns free-text disruption reports to a [`ScenarioCategory`].
///
/// Total: every input yields a category. A language-model backed
/// implementation can replace the keyword one without touching the executor.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> ScenarioCategory;
}

/// Ordered keyword rules; the first rule with a matching keyword wins.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(ScenarioCategory, Vec<String>)>,
    fallback: ScenarioCategory,
}

impl KeywordClassifier {
    pub fn new(fallback: ScenarioCategory) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// Rules used by the resolver out of the box.
    pub fn standard() -> Self {
        Self::new(ScenarioCategory::MerchantOverloaded)
            .with_rule(
                ScenarioCategory::Dispute,
                &[
                    "dispute", "damaged", "spilled", "spill", "broken", "blame", "argument",
                    "complain", "refund",
                ],
            )
            .with_rule(
                ScenarioCategory::RecipientUnavailable,
                &[
                    "not home",
                    "not at home",
                    "unavailable",
                    "not answering",
                    "no answer",
                    "nobody",
                    "no one",
                    "recipient",
                ],
            )
            .with_rule(
                ScenarioCategory::TrafficObstruction,
                &[
                    "traffic", "accident", "road closed", "closure", "obstruction", "jam",
                    "blocked", "flight",
                ],
            )
    }

    pub fn with_rule(mut self, category: ScenarioCategory, keywords: &[&str]) -> Self {
        self.rules.push((
            category,
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        ));
        self
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ScenarioCategory {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(category, _)| *category)
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_each_category() {
        let classifier = KeywordClassifier::standard();
        assert_eq!(
            classifier.classify("Customer and driver dispute a spilled drink"),
            ScenarioCategory::Dispute
        );
        assert_eq!(
            classifier.classify("The recipient is not answering the door"),
            ScenarioCategory::RecipientUnavailable
        );
        assert_eq!(
            classifier.classify("Major accident on the highway, heavy TRAFFIC"),
            ScenarioCategory::TrafficObstruction
        );
        assert_eq!(
            classifier.classify("The restaurant has a 40 minute backlog"),
            ScenarioCategory::MerchantOverloaded
        );
    }

    #[test]
    fn unmatched_text_falls_back_to_default() {
        let classifier = KeywordClassifier::standard();
        for text in ["", "hello", "1234 !!", "the kitchen is overwhelmed"] {
            assert_eq!(classifier.classify(text), ScenarioCategory::default());
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = KeywordClassifier::standard();
        // Mentions both a dispute and traffic; dispute comes first.
        assert_eq!(
            classifier.classify("Driver blames traffic for the damaged package"),
            ScenarioCategory::Dispute
        );
    }

    #[test]
    fn custom_rules_are_honoured() {
        let classifier = KeywordClassifier::new(ScenarioCategory::Dispute)
            .with_rule(ScenarioCategory::TrafficObstruction, &["Parade"]);
        assert_eq!(
            classifier.classify("a parade blocks Main St"),
            ScenarioCategory::TrafficObstruction
        );
        assert_eq!(classifier.classify("quiet day"), ScenarioCategory::Dispute);
    }
}
