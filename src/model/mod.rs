// src/model/mod.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ScenarioDefaults;

/// Closed set of disruption categories a scenario can fall into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    Dispute,
    RecipientUnavailable,
    TrafficObstruction,
    /// Fallback when nothing more specific matches.
    #[default]
    MerchantOverloaded,
}

impl ScenarioCategory {
    pub const ALL: [ScenarioCategory; 4] = [
        ScenarioCategory::Dispute,
        ScenarioCategory::RecipientUnavailable,
        ScenarioCategory::TrafficObstruction,
        ScenarioCategory::MerchantOverloaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioCategory::Dispute => "dispute",
            ScenarioCategory::RecipientUnavailable => "recipient_unavailable",
            ScenarioCategory::TrafficObstruction => "traffic_obstruction",
            ScenarioCategory::MerchantOverloaded => "merchant_overloaded",
        }
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a plan may read from a scenario.
pub const SCENARIO_FIELDS: &[&str] = &[
    "case_id",
    "text",
    "category",
    "order_id",
    "customer_id",
    "driver_id",
    "merchant_id",
    "destination",
    "flight_number",
];

static ORDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border[-_][a-z]*[0-9][a-z0-9]*\b").expect("order id pattern"));
static CUSTOMER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcust(?:omer)?[-_][a-z]*[0-9][a-z0-9]*\b").expect("customer id pattern")
});
static DRIVER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdriver[-_][a-z]*[0-9][a-z0-9]*\b").expect("driver id pattern"));
static MERCHANT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmerchant[-_][a-z]*[0-9][a-z0-9]*\b").expect("merchant id pattern"));
static FLIGHT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}[0-9]{2,4}\b").expect("flight number pattern"));

/// One disruption under resolution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub case_id: String,
    pub text: String,
    pub category: ScenarioCategory,
    fields: BTreeMap<String, String>,
}

impl Scenario {
    /// Builds a scenario, pulling identifiers out of `text` and falling back
    /// to `defaults` for anything it does not mention.
    pub fn from_text(
        case_id: &str,
        text: &str,
        category: ScenarioCategory,
        defaults: &ScenarioDefaults,
    ) -> Self {
        let pick = |pattern: &Regex, fallback: &str| {
            pattern
                .find(text)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_else(|| fallback.to_string())
        };

        let mut fields = BTreeMap::new();
        fields.insert("order_id".into(), pick(&ORDER_ID, &defaults.order_id));
        fields.insert("customer_id".into(), pick(&CUSTOMER_ID, &defaults.customer_id));
        fields.insert("driver_id".into(), pick(&DRIVER_ID, &defaults.driver_id));
        fields.insert("merchant_id".into(), pick(&MERCHANT_ID, &defaults.merchant_id));
        fields.insert(
            "flight_number".into(),
            FLIGHT_NUMBER
                .find(text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| defaults.flight_number.clone()),
        );
        fields.insert("destination".into(), defaults.destination.clone());

        Self {
            case_id: case_id.to_string(),
            text: text.to_string(),
            category,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "case_id" => Some(&self.case_id),
            "text" => Some(&self.text),
            "category" => Some(self.category.as_str()),
            other => self.fields.get(other).map(String::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_come_from_text() {
        let scenario = Scenario::from_text(
            "case-1",
            "Customer cust-777 says driver-42 spilled order-555 from merchant-9",
            ScenarioCategory::Dispute,
            &ScenarioDefaults::default(),
        );
        assert_eq!(scenario.field("order_id"), Some("order-555"));
        assert_eq!(scenario.field("customer_id"), Some("cust-777"));
        assert_eq!(scenario.field("driver_id"), Some("driver-42"));
        assert_eq!(scenario.field("merchant_id"), Some("merchant-9"));
    }

    #[test]
    fn hyphenated_words_are_not_identifiers() {
        let scenario = Scenario::from_text(
            "case-1",
            "Customer-service says the driver-side door crushed the order-789 bag at merchant-run stall",
            ScenarioCategory::Dispute,
            &ScenarioDefaults::default(),
        );
        assert_eq!(scenario.field("customer_id"), Some("cust-456"));
        assert_eq!(scenario.field("driver_id"), Some("driver-123"));
        assert_eq!(scenario.field("merchant_id"), Some("merchant-001"));
        assert_eq!(scenario.field("order_id"), Some("order-789"));

        let scenario = Scenario::from_text(
            "case-2",
            "driver-side mirror clipped by driver-x42",
            ScenarioCategory::Dispute,
            &ScenarioDefaults::default(),
        );
        assert_eq!(scenario.field("driver_id"), Some("driver-x42"));
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let scenario = Scenario::from_text(
            "case-1",
            "The restaurant is slammed",
            ScenarioCategory::MerchantOverloaded,
            &ScenarioDefaults::default(),
        );
        assert_eq!(scenario.field("order_id"), Some("order-789"));
        assert_eq!(scenario.field("customer_id"), Some("cust-456"));
        assert_eq!(scenario.field("driver_id"), Some("driver-123"));
        assert_eq!(scenario.field("category"), Some("merchant_overloaded"));
        assert_eq!(scenario.field("unknown"), None);
    }

    #[test]
    fn flight_number_is_detected() {
        let scenario = Scenario::from_text(
            "case-1",
            "Passenger on SQ318 is stuck in a jam",
            ScenarioCategory::TrafficObstruction,
            &ScenarioDefaults::default(),
        );
        assert_eq!(scenario.field("flight_number"), Some("SQ318"));
    }

    #[test]
    fn every_listed_field_resolves() {
        let scenario = Scenario::from_text(
            "case-1",
            "anything",
            ScenarioCategory::default(),
            &ScenarioDefaults::default(),
        );
        for field in SCENARIO_FIELDS {
            assert!(scenario.field(field).is_some(), "{field} missing");
        }
    }
}
