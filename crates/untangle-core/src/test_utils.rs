//! Test utilities for untangle-core
//!
//! Provides a builder for assembling `Fact` fixtures without repeating the
//! full struct literal in every test.

use chrono::NaiveDate;

use crate::models::{
    ClearingStatus, DateType, Direction, Fact, FactStatus, FactType, Recurrence,
};

/// Builder for `Fact` test fixtures
///
/// Defaults are deliberately bland: unknown status, unknown direction, no
/// amount, no date. Each test states only what it cares about.
#[derive(Debug, Clone)]
pub struct FactBuilder {
    fact: Fact,
}

impl FactBuilder {
    pub fn new(id: &str, fact_type: FactType) -> Self {
        Self {
            fact: Fact {
                id: id.to_string(),
                fact_type,
                entity_name: None,
                entity_raw: None,
                entity_canonical: None,
                amount_value: None,
                amount_currency: None,
                date_value: None,
                date_type: None,
                status: FactStatus::Unknown,
                recurrence: Recurrence::Unknown,
                source_reference: None,
                confidence: 0.9,
                direction: Direction::Unknown,
                clearing_status: ClearingStatus::Unknown,
            },
        }
    }

    pub fn invoice(id: &str) -> Self {
        Self::new(id, FactType::Invoice)
    }

    pub fn payment(id: &str) -> Self {
        Self::new(id, FactType::Payment)
    }

    /// A cleared outflow bank transaction, the shape most bank-mode
    /// detectors qualify on
    pub fn bank_outflow(id: &str) -> Self {
        let mut b = Self::new(id, FactType::BankTransaction);
        b.fact.direction = Direction::Outflow;
        b.fact.clearing_status = ClearingStatus::Cleared;
        b
    }

    pub fn entity(mut self, name: &str) -> Self {
        self.fact.entity_name = Some(name.to_string());
        self.fact.entity_canonical = Some(name.to_string());
        self
    }

    pub fn raw(mut self, raw: &str) -> Self {
        self.fact.entity_raw = Some(raw.to_string());
        self
    }

    pub fn amount(mut self, value: f64, currency: &str) -> Self {
        self.fact.amount_value = Some(value);
        self.fact.amount_currency = Some(currency.to_string());
        self
    }

    pub fn amount_only(mut self, value: f64) -> Self {
        self.fact.amount_value = Some(value);
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.fact.date_value = Some(date.parse::<NaiveDate>().expect("valid test date"));
        self
    }

    pub fn date_type(mut self, date_type: DateType) -> Self {
        self.fact.date_type = Some(date_type);
        self
    }

    pub fn status(mut self, status: FactStatus) -> Self {
        self.fact.status = status;
        self
    }

    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.fact.recurrence = recurrence;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.fact.direction = direction;
        self
    }

    pub fn clearing(mut self, clearing: ClearingStatus) -> Self {
        self.fact.clearing_status = clearing;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.fact.confidence = confidence;
        self
    }

    pub fn build(self) -> Fact {
        self.fact
    }
}

/// Shorthand for a run of monthly cleared outflows for one merchant
pub fn monthly_outflows(
    entity: &str,
    amount: f64,
    currency: &str,
    dates: &[&str],
) -> Vec<Fact> {
    dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            FactBuilder::bank_outflow(&format!("{}-{}", entity.to_lowercase(), i + 1))
                .entity(entity)
                .amount(amount, currency)
                .date(d)
                .build()
        })
        .collect()
}
