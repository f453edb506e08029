//! Evaluation metrics for the direction classifier

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Held-out evaluation of one trained classifier. Stored alongside the
/// artifact and surfaced in API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub f1: f64,
    pub roc_auc: f64,
    /// Plain-text per-class report.
    pub report: String,
}

impl EvalMetrics {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Score probabilities against true labels, thresholding at 0.5.
pub fn evaluate(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> EvalMetrics {
    let y_pred = y_proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });

    let (tp, tn, fp, fn_) = confusion(y_true, &y_pred);
    let total = (tp + tn + fp + fn_) as f64;

    let accuracy = if total > 0.0 {
        (tp + tn) as f64 / total
    } else {
        0.0
    };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let roc_auc = roc_auc(y_true, y_proba);

    let neg_precision = ratio(tn, tn + fn_);
    let neg_recall = ratio(tn, tn + fp);
    let report = format!(
        "class  precision  recall\n\
         down   {:9.3}  {:6.3}\n\
         up     {:9.3}  {:6.3}\n\
         accuracy {:.3} on {} rows",
        neg_precision, neg_recall, precision, recall, accuracy, total as usize
    );

    EvalMetrics {
        accuracy,
        f1,
        roc_auc,
        report,
    }
}

fn confusion(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut tn = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t >= 0.5, p >= 0.5) {
            (true, true) => tp += 1,
            (false, false) => tn += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
        }
    }
    (tp, tn, fp, fn_)
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// Area under the ROC curve by the trapezoid rule, handling tied scores.
/// A single-class label vector has no curve; 0.5 is returned so the value
/// stays defined for degenerate held-out sets.
pub fn roc_auc(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> f64 {
    let n = y_true.len();
    let mut pairs: Vec<(f64, bool)> = y_proba
        .iter()
        .zip(y_true.iter())
        .map(|(&p, &t)| (p, t >= 0.5))
        .collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let n_pos = pairs.iter().filter(|(_, t)| *t).count() as f64;
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return 0.5;
    }

    let mut auc = 0.0;
    let (mut tp, mut fp) = (0.0, 0.0);
    let (mut tpr_prev, mut fpr_prev) = (0.0, 0.0);

    let mut i = 0;
    while i < n {
        let score = pairs[i].0;
        let mut j = i;
        while j < n && (pairs[j].0 - score).abs() < 1e-12 {
            if pairs[j].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            j += 1;
        }

        let tpr = tp / n_pos;
        let fpr = fp / n_neg;
        auc += (fpr - fpr_prev) * (tpr + tpr_prev) / 2.0;
        tpr_prev = tpr;
        fpr_prev = fpr;
        i = j;
    }

    auc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_classifier() {
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        let p = Array1::from_vec(vec![0.1, 0.2, 0.8, 0.9]);
        let m = evaluate(&y, &p);

        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
        assert!((m.roc_auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_classifier() {
        let y = Array1::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
        let p = Array1::from_vec(vec![0.9, 0.8, 0.2, 0.1]);
        let m = evaluate(&y, &p);

        assert_eq!(m.accuracy, 0.0);
        assert!((m.roc_auc - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_auc_is_defined() {
        let y = Array1::from_vec(vec![1.0, 1.0, 1.0]);
        let p = Array1::from_vec(vec![0.6, 0.7, 0.8]);
        let m = evaluate(&y, &p);

        assert_eq!(m.roc_auc, 0.5);
        assert!(m.roc_auc.is_finite());
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn test_f1_zero_when_no_positive_predictions() {
        let y = Array1::from_vec(vec![1.0, 0.0, 1.0, 0.0]);
        let p = Array1::from_vec(vec![0.1, 0.2, 0.3, 0.4]);
        let m = evaluate(&y, &p);

        assert_eq!(m.f1, 0.0);
        assert_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn test_tied_scores() {
        let y = Array1::from_vec(vec![1.0, 0.0, 1.0, 0.0]);
        let p = Array1::from_vec(vec![0.5, 0.5, 0.5, 0.5]);
        // All scores tied: one diagonal trapezoid, AUC 0.5.
        assert!((roc_auc(&y, &p) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_report_mentions_accuracy() {
        let y = Array1::from_vec(vec![0.0, 1.0]);
        let p = Array1::from_vec(vec![0.3, 0.7]);
        let m = evaluate(&y, &p);
        assert!(m.report.contains("accuracy"));
        assert!(m.to_json()["accuracy"].as_f64().unwrap() > 0.99);
    }
}
