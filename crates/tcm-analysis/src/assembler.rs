//! 数据整合
//!
//! 把一次就诊涉及的患者、临床表现和处方数据整合为统一的文档，供构造提示词使用。
//! 整合过程只读，不修改任何数据。

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tcm_core::{Patient, Prescription, PrescriptionDetail, Result, TcmError, Visit};
use tcm_database::{PatientRepository, PrescriptionRepository, VisitRepository};
use tracing::debug;

pub const NO_RECORD: &str = "无记录";
pub const NOT_RECORDED: &str = "未记录";
pub const UNDIAGNOSED: &str = "未诊断";
pub const UNNAMED_PRESCRIPTION: &str = "未命名处方";
pub const PENDING_ANALYSIS: &str = "待AI分析确定或医生录入";
pub const UNKNOWN: &str = "未知";

/// 患者信息部分
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientInfo {
    #[serde(rename = "姓名")]
    pub name: String,
    #[serde(rename = "性别")]
    pub gender: String,
    #[serde(rename = "年龄")]
    pub age: String,
}

/// 临床表现部分
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClinicalInfo {
    #[serde(rename = "症状体征")]
    pub chief_complaint: String,
    #[serde(rename = "舌象")]
    pub tongue: String,
    #[serde(rename = "脉象")]
    pub pulse: String,
    #[serde(rename = "西医检查")]
    pub western_examination: String,
    #[serde(rename = "西医诊断")]
    pub western_diagnosis: String,
}

/// 已有处方的摘要
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PrescriptionSummary {
    #[serde(rename = "处方名称")]
    pub name: String,
    #[serde(rename = "处方组成")]
    pub composition: String,
}

/// 整合后的就诊文档
///
/// 没有关联患者时 `患者信息` 输出为空对象，没有处方时 `最终结果` 输出为空对象。
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IntegratedDocument {
    #[serde(rename = "患者信息", serialize_with = "section_or_empty")]
    pub patient_info: Option<PatientInfo>,
    #[serde(rename = "临床表现")]
    pub clinical_info: ClinicalInfo,
    #[serde(rename = "最终结果", serialize_with = "section_or_empty")]
    pub final_result: Option<PrescriptionSummary>,
    #[serde(rename = "中医病名")]
    pub tcm_disease_name: String,
    #[serde(rename = "证型推理")]
    pub pattern_reasoning: String,
    #[serde(rename = "治则治法")]
    pub treatment_method: String,
    #[serde(rename = "编号", with = "tcm_core::models::id_string")]
    pub record_id: i64,
}

fn section_or_empty<T, S>(section: &Option<T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match section {
        Some(value) => value.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// 数据整合器
#[derive(Clone)]
pub struct DataAssembler {
    visits: Arc<dyn VisitRepository>,
    patients: Arc<dyn PatientRepository>,
    prescriptions: Arc<dyn PrescriptionRepository>,
}

impl DataAssembler {
    pub fn new(
        visits: Arc<dyn VisitRepository>,
        patients: Arc<dyn PatientRepository>,
        prescriptions: Arc<dyn PrescriptionRepository>,
    ) -> Self {
        Self {
            visits,
            patients,
            prescriptions,
        }
    }

    /// 按就诊记录ID整合数据，就诊记录不存在时返回 `NotFound`
    pub async fn integrate(&self, visit_id: i64) -> Result<IntegratedDocument> {
        let visit = self
            .visits
            .get_visit(visit_id)
            .await?
            .ok_or_else(|| TcmError::visit_not_found(visit_id))?;

        // 关联的患者已被删除时按无患者处理
        let patient = match visit.patient_id {
            Some(patient_id) => self.patients.get_patient(patient_id).await?,
            None => None,
        };

        let mut prescriptions = Vec::new();
        for prescription in self.prescriptions.list_prescriptions_by_visit(visit_id).await? {
            let details = self
                .prescriptions
                .list_prescription_details(prescription.id)
                .await?;
            prescriptions.push((prescription, details));
        }

        debug!(
            "Integrating visit {} with {} prescriptions",
            visit_id,
            prescriptions.len()
        );
        Ok(assemble(&visit, patient.as_ref(), &prescriptions))
    }
}

/// 由已加载的数据构造整合文档
pub fn assemble(
    visit: &Visit,
    patient: Option<&Patient>,
    prescriptions: &[(Prescription, Vec<PrescriptionDetail>)],
) -> IntegratedDocument {
    IntegratedDocument {
        patient_info: patient.map(patient_info),
        clinical_info: clinical_info(visit),
        final_result: prescription_summary(prescriptions),
        tcm_disease_name: PENDING_ANALYSIS.to_string(),
        pattern_reasoning: PENDING_ANALYSIS.to_string(),
        treatment_method: PENDING_ANALYSIS.to_string(),
        record_id: visit.id,
    }
}

fn patient_info(patient: &Patient) -> PatientInfo {
    PatientInfo {
        name: patient.name.clone(),
        gender: patient
            .gender
            .map(|g| g.label())
            .unwrap_or(UNKNOWN)
            .to_string(),
        age: patient
            .age
            .map(|age| format!("{}岁", age))
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn clinical_info(visit: &Visit) -> ClinicalInfo {
    ClinicalInfo {
        chief_complaint: text_or(&visit.chief_complaint, NO_RECORD),
        tongue: text_or(&visit.tongue_diagnosis, NOT_RECORDED),
        pulse: text_or(&visit.pulse_diagnosis, NOT_RECORDED),
        western_examination: western_examination(
            &visit.initial_visit_clinical_manifestation,
            &visit.follow_up_clinical_manifestation,
        ),
        western_diagnosis: text_or(&visit.western_diagnosis, UNDIAGNOSED),
    }
}

/// 合并初诊和复诊的临床表现，只有一项时不出现分隔符
pub fn western_examination(initial: &Option<String>, follow_up: &Option<String>) -> String {
    let parts: Vec<String> = [("初诊", initial), ("复诊", follow_up)]
        .into_iter()
        .filter_map(|(label, text)| non_empty(text).map(|t| format!("{}: {}", label, t)))
        .collect();

    if parts.is_empty() {
        NOT_RECORDED.to_string()
    } else {
        parts.join("; ")
    }
}

/// 处方名称取第一张处方，处方组成为所有处方全部药材名称的拼接
fn prescription_summary(
    prescriptions: &[(Prescription, Vec<PrescriptionDetail>)],
) -> Option<PrescriptionSummary> {
    let (first, _) = prescriptions.first()?;

    let herbs: Vec<&str> = prescriptions
        .iter()
        .flat_map(|(_, details)| details.iter().map(|d| d.herb_name.as_str()))
        .collect();

    Some(PrescriptionSummary {
        name: text_or(&first.prescription_name, UNNAMED_PRESCRIPTION),
        composition: herbs.join(", "),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn text_or(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}
