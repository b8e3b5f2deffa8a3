//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use tcm_core::models::*;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: i64,
    pub name: String,
    pub gender: Option<i32>, // 存储为整数，转换为Gender枚举
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub id_card: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub marital_status: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            name: db_patient.name,
            gender: db_patient.gender.and_then(Gender::from_code),
            age: db_patient.age,
            birth_date: db_patient.birth_date,
            id_card: db_patient.id_card,
            phone: db_patient.phone,
            address: db_patient.address,
            occupation: db_patient.occupation,
            marital_status: db_patient.marital_status,
            created_at: db_patient.created_at,
            updated_at: db_patient.updated_at,
        }
    }
}

/// 数据库医生表
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: i64,
    pub name: String,
    pub department: Option<String>,
    pub title: Option<String>,
    pub license_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbDoctor> for Doctor {
    fn from(db_doctor: DbDoctor) -> Self {
        Doctor {
            id: db_doctor.id,
            name: db_doctor.name,
            department: db_doctor.department,
            title: db_doctor.title,
            license_number: db_doctor.license_number,
            phone: db_doctor.phone,
            email: db_doctor.email,
            status: db_doctor.status,
            created_at: db_doctor.created_at,
            updated_at: db_doctor.updated_at,
        }
    }
}

/// 数据库就诊记录表
#[derive(Debug, FromRow)]
pub struct DbVisit {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub visit_type: i32,
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
    pub tongue_image_path: Option<String>,
    pub ai_analysis_raw_response: Option<String>,
    pub ai_analysis_status: String, // 存储为字符串，转换为AnalysisStatus枚举
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbVisit> for Visit {
    fn from(db_visit: DbVisit) -> Self {
        Visit {
            id: db_visit.id,
            patient_id: db_visit.patient_id,
            doctor_id: db_visit.doctor_id,
            visit_type: VisitType::try_from(db_visit.visit_type).unwrap_or_default(),
            medical_record_number: db_visit.medical_record_number,
            chief_complaint: db_visit.chief_complaint,
            symptoms: db_visit.symptoms,
            initial_visit_clinical_manifestation: db_visit.initial_visit_clinical_manifestation,
            follow_up_clinical_manifestation: db_visit.follow_up_clinical_manifestation,
            tongue_diagnosis: db_visit.tongue_diagnosis,
            pulse_diagnosis: db_visit.pulse_diagnosis,
            tcm_diagnosis: db_visit.tcm_diagnosis,
            western_diagnosis: db_visit.western_diagnosis,
            pattern_differentiation: db_visit.pattern_differentiation,
            treatment_plan: db_visit.treatment_plan,
            visit_date: db_visit.visit_date,
            tongue_image_path: db_visit.tongue_image_path,
            ai_analysis_raw_response: db_visit.ai_analysis_raw_response,
            ai_analysis_status: AnalysisStatus::parse(&db_visit.ai_analysis_status),
            created_at: db_visit.created_at,
            updated_at: db_visit.updated_at,
        }
    }
}

/// 数据库处方表
#[derive(Debug, FromRow)]
pub struct DbPrescription {
    pub id: i64,
    pub visit_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub prescription_name: Option<String>,
    pub decoction_method: Option<String>,
    pub treatment_duration: Option<i32>,
    pub doctor_advice: Option<String>,
    pub status: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPrescription> for Prescription {
    fn from(db_prescription: DbPrescription) -> Self {
        Prescription {
            id: db_prescription.id,
            visit_id: db_prescription.visit_id,
            doctor_id: db_prescription.doctor_id,
            prescription_name: db_prescription.prescription_name,
            decoction_method: db_prescription.decoction_method,
            treatment_duration: db_prescription.treatment_duration,
            doctor_advice: db_prescription.doctor_advice,
            status: db_prescription.status,
            created_at: db_prescription.created_at,
            updated_at: db_prescription.updated_at,
        }
    }
}

/// 数据库处方明细表
#[derive(Debug, FromRow)]
pub struct DbPrescriptionDetail {
    pub id: i64,
    pub prescription_id: i64,
    pub herb_name: String,
    pub dosage: Option<f64>,
    pub unit: Option<String>,
    pub properties: Option<String>,
    pub usage_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPrescriptionDetail> for PrescriptionDetail {
    fn from(db_detail: DbPrescriptionDetail) -> Self {
        PrescriptionDetail {
            id: db_detail.id,
            prescription_id: db_detail.prescription_id,
            herb_name: db_detail.herb_name,
            dosage: db_detail.dosage,
            unit: db_detail.unit,
            properties: db_detail.properties,
            usage_instructions: db_detail.usage_instructions,
            created_at: db_detail.created_at,
            updated_at: db_detail.updated_at,
        }
    }
}

/// 数据库诊断图片表
#[derive(Debug, FromRow)]
pub struct DbDiagnosticImage {
    pub id: i64,
    pub visit_id: i64,
    pub image_type: String,
    pub image_path: String,
    pub image_name: Option<String>,
    pub image_size: i64,
    pub original_format: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbDiagnosticImage> for DiagnosticImage {
    fn from(db_image: DbDiagnosticImage) -> Self {
        DiagnosticImage {
            id: db_image.id,
            visit_id: db_image.visit_id,
            image_type: db_image.image_type,
            image_path: db_image.image_path,
            image_name: db_image.image_name,
            image_size: db_image.image_size,
            original_format: db_image.original_format,
            description: db_image.description,
            created_at: db_image.created_at,
            updated_at: db_image.updated_at,
        }
    }
}
