//! Point rule for a single prediction

use crate::domain::{Award, Score};

/// Forecast matches the final score exactly
pub const EXACT_SCORE_POINTS: i32 = 3;
/// Forecast gets the outcome category (home win / draw / away win) right
pub const CORRECT_OUTCOME_POINTS: i32 = 1;

/// Award for `forecast` given the `actual` final score.
///
/// Always one of 0, 1 or 3 points; `exact` is set iff 3 points are awarded.
pub fn score_prediction(forecast: Score, actual: Score) -> Award {
    if forecast == actual {
        Award {
            points: EXACT_SCORE_POINTS,
            exact: true,
        }
    } else if forecast.outcome() == actual.outcome() {
        Award {
            points: CORRECT_OUTCOME_POINTS,
            exact: false,
        }
    } else {
        Award {
            points: 0,
            exact: false,
        }
    }
}
