//! Decision Types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pollution category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Plastic,
    OilSpill,
    Undetected,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Plastic, Label::OilSpill, Label::Undetected];

    /// Wire name (`plastic`, `oil_spill`, `undetected`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Plastic => "plastic",
            Label::OilSpill => "oil_spill",
            Label::Undetected => "undetected",
        }
    }

    /// Category shown to dashboard users
    pub fn category(&self) -> &'static str {
        match self {
            Label::Plastic => "Plastic",
            Label::OilSpill => "Oil Spill",
            Label::Undetected => "No Detection",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    /// Accepts wire names and every policy's display names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plastic" | "plastic waste" => Ok(Label::Plastic),
            "oil_spill" | "oil spill" | "oil" => Ok(Label::OilSpill),
            "undetected" | "none" | "no detection" => Ok(Label::Undetected),
            _ => Err(s.to_string()),
        }
    }
}

/// Named decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyName {
    /// Policy A: sequential thresholds with water override
    #[default]
    Sequential,
    /// Policy B: one confidence gate ahead of the sequential checks
    ConfidenceGated,
    /// Policy C: both-above-threshold ties resolved by margin
    MarginBalanced,
}

impl PolicyName {
    pub const ALL: [PolicyName; 3] = [
        PolicyName::Sequential,
        PolicyName::ConfidenceGated,
        PolicyName::MarginBalanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Sequential => "sequential",
            PolicyName::ConfidenceGated => "confidence_gated",
            PolicyName::MarginBalanced => "margin_balanced",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "sequential" | "a" => Some(PolicyName::Sequential),
            "confidence_gated" | "confidence" | "b" => Some(PolicyName::ConfidenceGated),
            "margin_balanced" | "margin" | "balanced" | "c" => Some(PolicyName::MarginBalanced),
            _ => None,
        }
    }

    /// Label name as this policy reports it
    pub fn label_name(&self, label: Label) -> &'static str {
        match (self, label) {
            (PolicyName::MarginBalanced, Label::Plastic) => "Plastic Waste",
            (PolicyName::MarginBalanced, Label::OilSpill) => "Oil Spill",
            (PolicyName::MarginBalanced, Label::Undetected) => "None",
            (_, label) => label.as_str(),
        }
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
