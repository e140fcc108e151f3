// Common types used across the signal feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Market trading period a signal was produced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Asian,
    London,
    #[serde(rename = "New York")]
    NewYork,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Asian, Session::London, Session::NewYork];

    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Asian => "Asian",
            Session::London => "London",
            Session::NewYork => "New York",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Session {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "asian" => Ok(Session::Asian),
            "london" => Ok(Session::London),
            "newyork" => Ok(Session::NewYork),
            _ => Err(format!("unknown session '{}'", s.trim())),
        }
    }
}

/// Generator-assigned certainty percentage, always within 0..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Confidence(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Confidence {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Confidence::new)
            .ok_or_else(|| format!("confidence {} outside 0..=100", value))
    }
}

impl From<Confidence> for u8 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A single trading recommendation record. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub pair: String,
    pub action: Action,
    pub confidence: Confidence,
    pub session: Session,
    pub created_at: DateTime<Utc>,
    /// Price levels, rationale text and anything else the generator attaches.
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A signal that has not been stored yet; the record store assigns `id`
/// and, when absent, `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub pair: String,
    pub action: Action,
    pub confidence: Confidence,
    pub session: Session,
    pub created_at: Option<DateTime<Utc>>,
    pub details: serde_json::Value,
}

impl NewSignal {
    pub fn new(pair: impl Into<String>, action: Action, confidence: Confidence, session: Session) -> Self {
        NewSignal {
            pair: pair.into(),
            action,
            confidence,
            session,
            created_at: None,
            details: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Assign identity and timestamp, producing the stored record.
    pub fn into_signal(self, id: Uuid, now: DateTime<Utc>) -> Signal {
        Signal {
            id,
            pair: self.pair,
            action: self.action,
            confidence: self.confidence,
            session: self.session,
            created_at: self.created_at.unwrap_or(now),
            details: self.details,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionFilter {
    #[default]
    All,
    Only(Action),
}

impl FromStr for ActionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ActionFilter::All)
        } else {
            s.parse().map(ActionFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionFilter {
    #[default]
    All,
    Only(Session),
}

impl FromStr for SessionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(SessionFilter::All)
        } else {
            s.parse().map(SessionFilter::Only)
        }
    }
}

/// User-chosen predicates narrowing the displayed signal set. Replaced
/// wholesale, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCriteria {
    pub search_term: String,
    pub action: ActionFilter,
    pub session: SessionFilter,
}

impl FilterCriteria {
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn action(mut self, action: ActionFilter) -> Self {
        self.action = action;
        self
    }

    pub fn session(mut self, session: SessionFilter) -> Self {
        self.session = session;
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.search_term.is_empty()
            && self.action == ActionFilter::All
            && self.session == SessionFilter::All
    }
}

/// Summary statistics over a signal set. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub avg_confidence: u8,
}
