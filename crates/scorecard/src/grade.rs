use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GradeThresholds;

/// Five-level grade shared by bookkeeping quality and the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grade {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

impl Grade {
    pub const ALL: [Grade; 5] = [
        Self::Excellent,
        Self::Good,
        Self::Average,
        Self::Poor,
        Self::VeryPoor,
    ];

    /// Map a 0-100 score to a grade. Each threshold is an inclusive lower
    /// bound; anything under `poor` is very-poor.
    pub fn from_score(score: f64, thresholds: &GradeThresholds) -> Self {
        if score >= thresholds.excellent {
            Self::Excellent
        } else if score >= thresholds.good {
            Self::Good
        } else if score >= thresholds.average {
            Self::Average
        } else if score >= thresholds.poor {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    /// 4 for excellent down to 0 for very-poor.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Excellent => 4,
            Self::Good => 3,
            Self::Average => 2,
            Self::Poor => 1,
            Self::VeryPoor => 0,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Average => write!(f, "average"),
            Self::Poor => write!(f, "poor"),
            Self::VeryPoor => write!(f, "very-poor"),
        }
    }
}
