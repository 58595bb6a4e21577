//! Human-readable password strength derived from a `PasswordCheck`

use crate::forms::validate::Requirement;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrengthLabel {
    VeryWeak,
    Weak,
    Fair,
    Good,
    Strong,
    VeryStrong,
}

const LABELS: [StrengthLabel; 6] = [
    StrengthLabel::VeryWeak,
    StrengthLabel::Weak,
    StrengthLabel::Fair,
    StrengthLabel::Good,
    StrengthLabel::Strong,
    StrengthLabel::VeryStrong,
];

impl StrengthLabel {
    /// Out-of-range scores fall back to the lowest tier.
    pub fn from_strength(strength: usize) -> Self {
        LABELS.get(strength).copied().unwrap_or(StrengthLabel::VeryWeak)
    }

    pub fn text(&self) -> &'static str {
        match self {
            StrengthLabel::VeryWeak => "Very Weak",
            StrengthLabel::Weak => "Weak",
            StrengthLabel::Fair => "Fair",
            StrengthLabel::Good => "Good",
            StrengthLabel::Strong => "Strong",
            StrengthLabel::VeryStrong => "Very Strong",
        }
    }
}

impl fmt::Display for StrengthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementRow {
    pub met: bool,
    pub indicator: char,
    pub text: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrengthReport {
    pub label: StrengthLabel,
    pub rows: Vec<RequirementRow>,
}

pub fn present(strength: usize, requirements: &[Requirement]) -> StrengthReport {
    let rows = requirements
        .iter()
        .map(|r| RequirementRow {
            met: r.met,
            indicator: if r.met { '✓' } else { '○' },
            text: r.description,
        })
        .collect();

    StrengthReport {
        label: StrengthLabel::from_strength(strength),
        rows,
    }
}

impl fmt::Display for StrengthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strength: {}", self.label)?;
        if !self.rows.is_empty() {
            writeln!(f, "Requirements:")?;
        }
        for row in &self.rows {
            writeln!(f, "  {} {}", row.indicator, row.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::validate::check_password;

    #[test]
    fn test_labels_index_directly() {
        assert_eq!(StrengthLabel::from_strength(0), StrengthLabel::VeryWeak);
        assert_eq!(StrengthLabel::from_strength(3), StrengthLabel::Good);
        assert_eq!(StrengthLabel::from_strength(5), StrengthLabel::VeryStrong);
        assert_eq!(StrengthLabel::from_strength(42), StrengthLabel::VeryWeak);
    }

    #[test]
    fn test_rows_follow_requirements() {
        let check = check_password("abcdefgh");
        let report = present(check.strength, &check.requirements);

        assert_eq!(report.label, StrengthLabel::Fair);
        assert_eq!(report.rows.len(), 5);
        assert!(report.rows[0].met);
        assert_eq!(report.rows[2].indicator, '○');
        assert!(report.to_string().contains("Uppercase letter (A-Z)"));
    }
}
