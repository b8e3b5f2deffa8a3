//! 结果写回
//!
//! 把解析结果写回就诊记录，并为就诊生成一张AI处方。两次写入相互独立，
//! 任一失败都会以 `Persistence` 错误返回，并附带本次的原始响应。

use crate::parser::{DiagnosisResult, AI_ANALYSIS_RESULT, NOT_PROVIDED};
use std::sync::Arc;
use tcm_core::{NewPrescription, Prescription, Result, TcmError, Visit};
use tcm_database::{PrescriptionRepository, VisitRepository};
use tracing::{debug, error, info};

/// 写回结果
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub visit_updated: bool,
    pub prescription: Option<Prescription>,
}

/// 结果写回器
#[derive(Clone)]
pub struct ResultWriter {
    visits: Arc<dyn VisitRepository>,
    prescriptions: Arc<dyn PrescriptionRepository>,
}

impl ResultWriter {
    pub fn new(visits: Arc<dyn VisitRepository>, prescriptions: Arc<dyn PrescriptionRepository>) -> Self {
        Self {
            visits,
            prescriptions,
        }
    }

    pub async fn write(
        &self,
        visit_id: i64,
        raw_response: &str,
        result: &DiagnosisResult,
    ) -> Result<WriteOutcome> {
        let mut visit = self
            .visits
            .get_visit(visit_id)
            .await?
            .ok_or_else(|| TcmError::visit_not_found(visit_id))?;

        let changed = apply_diagnosis(&mut visit, raw_response, result);

        let visit_result = if changed {
            self.visits.update_visit(&visit).await.map(|_| true)
        } else {
            Ok(false)
        };

        let prescription_result = match ai_prescription(&visit, result) {
            Some(prescription) => self
                .prescriptions
                .create_prescription(prescription)
                .await
                .map(Some),
            None => Ok(None),
        };

        match (visit_result, prescription_result) {
            (Ok(visit_updated), Ok(prescription)) => {
                info!(
                    "Wrote analysis result for visit {} (visit updated: {}, prescription created: {})",
                    visit_id,
                    visit_updated,
                    prescription.is_some()
                );
                Ok(WriteOutcome {
                    visit_updated,
                    prescription,
                })
            }
            (Err(visit_error), Ok(_)) => {
                error!("Failed to update visit {}: {}", visit_id, visit_error);
                Err(TcmError::persistence(
                    format!("visit update failed: {}", visit_error),
                    Some(raw_response.to_string()),
                ))
            }
            (Ok(_), Err(prescription_error)) => {
                error!("Failed to save prescription for visit {}: {}", visit_id, prescription_error);
                Err(TcmError::persistence(
                    format!("prescription save failed: {}", prescription_error),
                    Some(raw_response.to_string()),
                ))
            }
            (Err(visit_error), Err(prescription_error)) => {
                error!(
                    "Failed to persist analysis result for visit {}: {}; {}",
                    visit_id, visit_error, prescription_error
                );
                Err(TcmError::persistence(
                    format!(
                        "visit update failed: {}; prescription save failed: {}",
                        visit_error, prescription_error
                    ),
                    Some(raw_response.to_string()),
                ))
            }
        }
    }
}

/// 把诊断结果写入就诊记录，返回是否有字段变化
fn apply_diagnosis(visit: &mut Visit, raw_response: &str, result: &DiagnosisResult) -> bool {
    let mut changed = false;

    if visit.ai_analysis_raw_response.as_deref() != Some(raw_response) {
        visit.ai_analysis_raw_response = Some(raw_response.to_string());
        changed = true;
    }

    changed |= assign(&mut visit.tcm_diagnosis, &result.tcm_disease_name);
    changed |= assign(&mut visit.western_diagnosis, &result.western_diagnosis);
    changed |= assign(&mut visit.pattern_differentiation, &result.pattern_reasoning);
    changed |= assign(&mut visit.treatment_plan, &result.treatment_method);

    debug!("Visit {} changed by analysis: {}", visit.id, changed);
    changed
}

fn assign(column: &mut Option<String>, value: &str) -> bool {
    if value == NOT_PROVIDED || value == AI_ANALYSIS_RESULT {
        return false;
    }
    if column.as_deref() == Some(value) {
        return false;
    }
    *column = Some(value.to_string());
    true
}

/// 由诊断结果构造处方，没有可用字段时返回 `None`
fn ai_prescription(visit: &Visit, result: &DiagnosisResult) -> Option<NewPrescription> {
    let provided = |value: &str| (value != NOT_PROVIDED).then(|| value.to_string());

    let prescription_name = provided(&result.final_result.prescription_name);
    let doctor_advice = provided(&result.final_result.prescription_composition);
    if prescription_name.is_none() && doctor_advice.is_none() {
        return None;
    }

    Some(NewPrescription {
        visit_id: Some(visit.id),
        doctor_id: visit.doctor_id,
        prescription_name,
        doctor_advice,
        ..Default::default()
    })
}
