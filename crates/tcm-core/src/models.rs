//! 核心数据模型定义
//!
//! 所有实体主键均为雪花算法生成的64位ID，JSON中以字符串形式输出，
//! 避免前端丢失精度；反序列化时同时接受字符串和数字。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 患者信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(with = "id_string")]
    pub id: i64,
    pub name: String,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub id_card: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub marital_status: Option<i32>, // 0-未婚，1-已婚，2-离异，3-丧偶
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 性别，数据库和JSON中以整数编码: 0-女，1-男，2-其他
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "i32", into = "i32")]
pub enum Gender {
    Female,
    Male,
    Other,
}

impl Gender {
    pub fn code(self) -> i32 {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
            Gender::Other => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Gender::Female),
            1 => Some(Gender::Male),
            2 => Some(Gender::Other),
            _ => None,
        }
    }

    /// 中文显示名称
    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "女",
            Gender::Male => "男",
            Gender::Other => "其他",
        }
    }
}

impl TryFrom<i32> for Gender {
    type Error = String;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        Gender::from_code(code).ok_or_else(|| format!("invalid gender code: {}", code))
    }
}

impl From<Gender> for i32 {
    fn from(gender: Gender) -> Self {
        gender.code()
    }
}

/// 医生信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(with = "id_string")]
    pub id: i64,
    pub name: String,
    pub department: Option<String>,
    pub title: Option<String>,          // 职称
    pub license_number: Option<String>, // 执业资格证号
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<i32>, // 0-离职，1-在职
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 就诊类型: 0-初诊，1-复诊
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "i32", into = "i32")]
pub enum VisitType {
    #[default]
    Initial,
    FollowUp,
}

impl VisitType {
    pub fn code(self) -> i32 {
        match self {
            VisitType::Initial => 0,
            VisitType::FollowUp => 1,
        }
    }
}

impl TryFrom<i32> for VisitType {
    type Error = String;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(VisitType::Initial),
            1 => Ok(VisitType::FollowUp),
            _ => Err(format!("invalid visit type: {}", code)),
        }
    }
}

impl From<VisitType> for i32 {
    fn from(visit_type: VisitType) -> Self {
        visit_type.code()
    }
}

/// AI分析状态，供异步提交后轮询
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    None,
    Pending,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::None => "none",
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// 数据库中的未知取值按 `None` 处理
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => AnalysisStatus::Pending,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            _ => AnalysisStatus::None,
        }
    }
}

/// 就诊记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    #[serde(with = "id_string")]
    pub id: i64,
    #[serde(default, with = "opt_id_string")]
    pub patient_id: Option<i64>,
    #[serde(default, with = "opt_id_string")]
    pub doctor_id: Option<i64>,
    pub visit_type: VisitType,
    pub medical_record_number: Option<String>,
    pub chief_complaint: Option<String>,                     // 主诉
    pub symptoms: Option<String>,                            // 症状
    pub initial_visit_clinical_manifestation: Option<String>, // 初诊临床表现
    pub follow_up_clinical_manifestation: Option<String>,    // 复诊临床表现
    pub tongue_diagnosis: Option<String>,                    // 舌诊
    pub pulse_diagnosis: Option<String>,                     // 脉诊
    pub tcm_diagnosis: Option<String>,                       // 中医诊断
    pub western_diagnosis: Option<String>,                   // 西医诊断
    pub pattern_differentiation: Option<String>,             // 证型
    pub treatment_plan: Option<String>,                      // 治疗方案
    pub visit_date: Option<DateTime<Utc>>,
    pub tongue_image_path: Option<String>,
    pub ai_analysis_raw_response: Option<String>,
    pub ai_analysis_status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// 用请求数据整体替换可编辑字段，AI相关字段和图片路径保持不变
    pub fn apply(&mut self, changes: NewVisit) {
        self.patient_id = changes.patient_id;
        self.doctor_id = changes.doctor_id;
        self.visit_type = changes.visit_type.unwrap_or_default();
        self.medical_record_number = changes.medical_record_number;
        self.chief_complaint = changes.chief_complaint;
        self.symptoms = changes.symptoms;
        self.initial_visit_clinical_manifestation = changes.initial_visit_clinical_manifestation;
        self.follow_up_clinical_manifestation = changes.follow_up_clinical_manifestation;
        self.tongue_diagnosis = changes.tongue_diagnosis;
        self.pulse_diagnosis = changes.pulse_diagnosis;
        self.tcm_diagnosis = changes.tcm_diagnosis;
        self.western_diagnosis = changes.western_diagnosis;
        self.pattern_differentiation = changes.pattern_differentiation;
        self.treatment_plan = changes.treatment_plan;
        self.visit_date = changes.visit_date;
    }
}

/// 处方
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(with = "id_string")]
    pub id: i64,
    #[serde(default, with = "opt_id_string")]
    pub visit_id: Option<i64>,
    #[serde(default, with = "opt_id_string")]
    pub doctor_id: Option<i64>,
    pub prescription_name: Option<String>,
    pub decoction_method: Option<String>, // 煎药方法
    pub treatment_duration: Option<i32>,  // 治疗天数
    pub doctor_advice: Option<String>,    // 医嘱
    pub status: Option<i32>,              // 0-未取药，1-已取药，2-已完成
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 处方明细
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDetail {
    #[serde(with = "id_string")]
    pub id: i64,
    #[serde(with = "id_string")]
    pub prescription_id: i64,
    pub herb_name: String,
    pub dosage: Option<f64>,
    pub unit: Option<String>, // 如"g", "ml", "片"
    pub properties: Option<String>,
    pub usage_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 舌象图片类型
pub const TONGUE_IMAGE_TYPE: &str = "tongue";

/// 诊断图片，按类型区分舌象 (tongue)、面象 (face) 等
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticImage {
    #[serde(with = "id_string")]
    pub id: i64,
    #[serde(with = "id_string")]
    pub visit_id: i64,
    pub image_type: String,
    pub image_path: String,
    pub image_name: Option<String>, // 原始文件名
    pub image_size: i64,
    pub original_format: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// 插入模型 - 用于创建新记录，ID和时间戳由存储层生成

/// 新患者
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPatient {
    pub name: String,
    pub gender: Option<Gender>,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub id_card: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub marital_status: Option<i32>,
}

/// 新医生
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewDoctor {
    pub name: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<i32>,
}

/// 新就诊记录，同时用作就诊记录更新的请求体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewVisit {
    #[serde(default, with = "opt_id_string")]
    pub patient_id: Option<i64>,
    #[serde(default, with = "opt_id_string")]
    pub doctor_id: Option<i64>,
    pub visit_type: Option<VisitType>,
    pub medical_record_number: Option<String>,
    pub chief_complaint: Option<String>,
    pub symptoms: Option<String>,
    pub initial_visit_clinical_manifestation: Option<String>,
    pub follow_up_clinical_manifestation: Option<String>,
    pub tongue_diagnosis: Option<String>,
    pub pulse_diagnosis: Option<String>,
    pub tcm_diagnosis: Option<String>,
    pub western_diagnosis: Option<String>,
    pub pattern_differentiation: Option<String>,
    pub treatment_plan: Option<String>,
    pub visit_date: Option<DateTime<Utc>>,
}

/// 新处方
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPrescription {
    #[serde(default, with = "opt_id_string")]
    pub visit_id: Option<i64>,
    #[serde(default, with = "opt_id_string")]
    pub doctor_id: Option<i64>,
    pub prescription_name: Option<String>,
    pub decoction_method: Option<String>,
    pub treatment_duration: Option<i32>,
    pub doctor_advice: Option<String>,
    pub status: Option<i32>,
}

/// 新处方明细，所属处方由调用方单独指定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPrescriptionDetail {
    pub herb_name: String,
    pub dosage: Option<f64>,
    pub unit: Option<String>,
    pub properties: Option<String>,
    pub usage_instructions: Option<String>,
}

/// 新诊断图片，文件已写入存储后登记
#[derive(Debug, Clone, Default)]
pub struct NewDiagnosticImage {
    pub visit_id: i64,
    pub image_type: String,
    pub image_path: String,
    pub image_name: Option<String>,
    pub image_size: i64,
    pub original_format: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(i64),
    Text(String),
}

impl IdRepr {
    fn into_id<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            IdRepr::Number(id) => Ok(id),
            IdRepr::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id: {}", text))),
        }
    }
}

/// 64位ID以字符串形式序列化
pub mod id_string {
    use super::IdRepr;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        IdRepr::deserialize(deserializer)?.into_id()
    }
}

/// 可选的64位ID以字符串形式序列化
pub mod opt_id_string {
    use super::IdRepr;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_str(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<IdRepr>::deserialize(deserializer)?
            .map(IdRepr::into_id)
            .transpose()
    }
}
