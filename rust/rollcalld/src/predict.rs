//! Exam-score extrapolation.
//!
//! The late-term estimate continues the early→mid delta (or carries a single
//! known term forward). The final-term estimate is a fixed 0.2/0.5/0.3 blend of
//! early, mid and the late estimate. Pure arithmetic; no storage access.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

pub const EARLY_WEIGHT: f64 = 0.20;
pub const MID_WEIGHT: f64 = 0.50;
pub const LATE_WEIGHT: f64 = 0.30;
pub const MIN_CONFIDENCE: f64 = 0.25;
pub const NO_TREND_CONFIDENCE: f64 = 0.6;

pub const DEFAULT_LATE_MAX: f64 = 25.0;
pub const DEFAULT_FINAL_MAX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermScore {
    pub score: f64,
    pub max: f64,
}

impl TermScore {
    pub fn new(score: f64, max: f64) -> Self {
        Self { score, max }
    }

    /// Fraction of the maximum; `None` when the maximum is not positive.
    pub fn fraction(&self) -> Option<f64> {
        (self.max > 0.0).then(|| self.score / self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_late_score: i64,
    pub predicted_final_score: i64,
    pub predicted_late_pct: f64,
    pub predicted_final_pct: f64,
    pub slope: Option<f64>,
    pub confidence: f64,
    pub explanation_trace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Prediction {
    Predicted(PredictionResult),
    InsufficientData,
}

impl Prediction {
    pub fn into_result(self) -> CoreResult<PredictionResult> {
        match self {
            Prediction::Predicted(r) => Ok(r),
            Prediction::InsufficientData => Err(CoreError::InsufficientData),
        }
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn pct(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}

pub fn predict(
    early: Option<TermScore>,
    mid: Option<TermScore>,
    late_max: f64,
    final_max: f64,
) -> Prediction {
    let early_pct = early.and_then(|t| t.fraction());
    let mid_pct = mid.and_then(|t| t.fraction());

    let (late_pct, slope, basis) = match (early_pct, mid_pct) {
        (None, None) => return Prediction::InsufficientData,
        (Some(e), Some(m)) => {
            let slope = m - e;
            let late = clamp01(m + slope);
            (
                late,
                Some(slope),
                format!(
                    "early {} -> mid {}, slope {:+.4}; late = clamp(mid + slope) = {}",
                    pct(e),
                    pct(m),
                    slope,
                    pct(late)
                ),
            )
        }
        (None, Some(m)) => (m, None, format!("mid {} only; late assumed stable at {}", pct(m), pct(m))),
        (Some(e), None) => (e, None, format!("early {} only; late assumed stable at {}", pct(e), pct(e))),
    };

    let early_term = early_pct.unwrap_or(late_pct);
    let mid_term = mid_pct.unwrap_or(late_pct);
    let final_pct = clamp01(EARLY_WEIGHT * early_term + MID_WEIGHT * mid_term + LATE_WEIGHT * late_pct);

    let predicted_late_score = (late_pct * late_max).round() as i64;
    let predicted_final_score = (final_pct * final_max).round() as i64;

    let confidence = match slope {
        Some(s) => (1.0 - s.abs()).max(MIN_CONFIDENCE),
        None => NO_TREND_CONFIDENCE,
    };

    let explanation_trace = format!(
        "{basis}; late score = round({late:.4} * {late_max}) = {predicted_late_score}; \
         final = clamp({EARLY_WEIGHT}*{et:.4} + {MID_WEIGHT}*{mt:.4} + {LATE_WEIGHT}*{late:.4}) = {fp:.4}, \
         score = round({fp:.4} * {final_max}) = {predicted_final_score}; confidence {confidence:.2}",
        late = late_pct,
        et = early_term,
        mt = mid_term,
        fp = final_pct,
    );

    Prediction::Predicted(PredictionResult {
        predicted_late_score,
        predicted_final_score,
        predicted_late_pct: late_pct,
        predicted_final_pct: final_pct,
        slope,
        confidence,
        explanation_trace,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StudyCategory {
    Topper,
    Average,
    Failer,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyEstimate {
    pub hours: f64,
    pub score: i64,
    pub out_of: i64,
    pub category: StudyCategory,
}

/// Rough score out of 100 from weekly study hours: seven points per hour.
pub fn study_hours_estimate(hours: f64) -> CoreResult<StudyEstimate> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(CoreError::validation("hours must be a positive number"));
    }
    let score = ((hours * 7.0).round() as i64).min(100);
    let category = if score > 85 {
        StudyCategory::Topper
    } else if score < 40 {
        StudyCategory::Failer
    } else {
        StudyCategory::Average
    };
    Ok(StudyEstimate {
        hours,
        score,
        out_of: 100,
        category,
    })
}
