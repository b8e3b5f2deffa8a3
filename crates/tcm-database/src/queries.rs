//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use crate::repository::{
    DiagnosticImageRepository, DoctorRepository, PatientRepository, PrescriptionRepository,
    VisitRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tcm_core::{
    AnalysisStatus, DiagnosticImage, Doctor, NewDiagnosticImage, NewDoctor, NewPatient,
    NewPrescription, NewPrescriptionDetail, NewVisit, Patient, Prescription, PrescriptionDetail,
    Result, SnowflakeIdGenerator, TcmError, Visit,
};

/// PostgreSQL上的仓储实现
#[derive(Debug, Clone)]
pub struct DatabaseQueries {
    pool: DatabasePool,
    ids: Arc<SnowflakeIdGenerator>,
}

impl DatabaseQueries {
    pub fn new(pool: DatabasePool, ids: Arc<SnowflakeIdGenerator>) -> Self {
        Self { pool, ids }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id BIGINT PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                gender INTEGER,
                age INTEGER,
                birth_date DATE,
                id_card VARCHAR(50),
                phone VARCHAR(20),
                address VARCHAR(255),
                occupation VARCHAR(100),
                marital_status INTEGER,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建医生表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id BIGINT PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                department VARCHAR(100),
                title VARCHAR(100),
                license_number VARCHAR(50) UNIQUE,
                phone VARCHAR(20),
                email VARCHAR(100),
                status INTEGER,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建就诊记录表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGINT PRIMARY KEY,
                patient_id BIGINT REFERENCES patients(id) ON DELETE SET NULL,
                doctor_id BIGINT REFERENCES doctors(id) ON DELETE SET NULL,
                visit_type INTEGER NOT NULL DEFAULT 0,
                medical_record_number VARCHAR(50) UNIQUE,
                chief_complaint VARCHAR(500),
                symptoms VARCHAR(1000),
                initial_visit_clinical_manifestation VARCHAR(1000),
                follow_up_clinical_manifestation VARCHAR(1000),
                tongue_diagnosis VARCHAR(500),
                pulse_diagnosis VARCHAR(500),
                tcm_diagnosis VARCHAR(500),
                western_diagnosis VARCHAR(500),
                pattern_differentiation VARCHAR(500),
                treatment_plan VARCHAR(1000),
                visit_date TIMESTAMP WITH TIME ZONE,
                tongue_image_path VARCHAR(500),
                ai_analysis_raw_response TEXT,
                ai_analysis_status VARCHAR(16) NOT NULL DEFAULT 'none',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建处方表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                id BIGINT PRIMARY KEY,
                visit_id BIGINT REFERENCES visits(id) ON DELETE CASCADE,
                doctor_id BIGINT REFERENCES doctors(id) ON DELETE SET NULL,
                prescription_name VARCHAR(200),
                decoction_method VARCHAR(500),
                treatment_duration INTEGER,
                doctor_advice TEXT,
                status INTEGER,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建处方明细表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS prescription_details (
                id BIGINT PRIMARY KEY,
                prescription_id BIGINT NOT NULL REFERENCES prescriptions(id) ON DELETE CASCADE,
                herb_name VARCHAR(200) NOT NULL,
                dosage DOUBLE PRECISION,
                unit VARCHAR(20),
                properties VARCHAR(500),
                usage_instructions VARCHAR(500),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建诊断图片表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS diagnostic_images (
                id BIGINT PRIMARY KEY,
                visit_id BIGINT NOT NULL REFERENCES visits(id) ON DELETE CASCADE,
                image_type VARCHAR(50) NOT NULL,
                image_path VARCHAR(500) NOT NULL,
                image_name VARCHAR(200),
                image_size BIGINT NOT NULL DEFAULT 0,
                original_format VARCHAR(10),
                description VARCHAR(500),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name)",
            "CREATE INDEX IF NOT EXISTS idx_visits_patient_id ON visits(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_visits_doctor_id ON visits(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_visit_id ON prescriptions(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_doctor_id ON prescriptions(doctor_id)",
            "CREATE INDEX IF NOT EXISTS idx_prescription_details_prescription_id ON prescription_details(prescription_id)",
            "CREATE INDEX IF NOT EXISTS idx_diagnostic_images_visit_id ON diagnostic_images(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_diagnostic_images_image_type ON diagnostic_images(image_type)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl PatientRepository for DatabaseQueries {
    async fn create_patient(&self, patient: NewPatient) -> Result<Patient> {
        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbPatient>(r#"
            INSERT INTO patients (id, name, gender, age, birth_date, id_card, phone, address, occupation, marital_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
        "#)
        .bind(id)
        .bind(&patient.name)
        .bind(patient.gender.map(|g| g.code()))
        .bind(patient.age)
        .bind(patient.birth_date)
        .bind(&patient.id_card)
        .bind(&patient.phone)
        .bind(&patient.address)
        .bind(&patient.occupation)
        .bind(patient.marital_status)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(Patient::from(row))
    }

    async fn get_patient(&self, id: i64) -> Result<Option<Patient>> {
        let result = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Patient::from))
    }

    async fn list_patients(&self) -> Result<Vec<Patient>> {
        let results = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients ORDER BY id")
            .fetch_all(self.pool.pool())
            .await?;

        Ok(results.into_iter().map(Patient::from).collect())
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient> {
        let row = sqlx::query_as::<_, DbPatient>(r#"
            UPDATE patients
            SET name = $2, gender = $3, age = $4, birth_date = $5, id_card = $6, phone = $7,
                address = $8, occupation = $9, marital_status = $10, updated_at = $11
            WHERE id = $1
            RETURNING *
        "#)
        .bind(patient.id)
        .bind(&patient.name)
        .bind(patient.gender.map(|g| g.code()))
        .bind(patient.age)
        .bind(patient.birth_date)
        .bind(&patient.id_card)
        .bind(&patient.phone)
        .bind(&patient.address)
        .bind(&patient.occupation)
        .bind(patient.marital_status)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Patient::from)
            .ok_or_else(|| TcmError::NotFound(format!("Patient not found with id: {}", patient.id)))
    }

    async fn delete_patient(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DoctorRepository for DatabaseQueries {
    async fn create_doctor(&self, doctor: NewDoctor) -> Result<Doctor> {
        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbDoctor>(r#"
            INSERT INTO doctors (id, name, department, title, license_number, phone, email, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(id)
        .bind(&doctor.name)
        .bind(&doctor.department)
        .bind(&doctor.title)
        .bind(&doctor.license_number)
        .bind(&doctor.phone)
        .bind(&doctor.email)
        .bind(doctor.status)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(Doctor::from(row))
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>> {
        let result = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Doctor::from))
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        let results = sqlx::query_as::<_, DbDoctor>("SELECT * FROM doctors ORDER BY id")
            .fetch_all(self.pool.pool())
            .await?;

        Ok(results.into_iter().map(Doctor::from).collect())
    }

    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor> {
        let row = sqlx::query_as::<_, DbDoctor>(r#"
            UPDATE doctors
            SET name = $2, department = $3, title = $4, license_number = $5, phone = $6,
                email = $7, status = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
        "#)
        .bind(doctor.id)
        .bind(&doctor.name)
        .bind(&doctor.department)
        .bind(&doctor.title)
        .bind(&doctor.license_number)
        .bind(&doctor.phone)
        .bind(&doctor.email)
        .bind(doctor.status)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Doctor::from)
            .ok_or_else(|| TcmError::NotFound(format!("Doctor not found with id: {}", doctor.id)))
    }

    async fn delete_doctor(&self, id: i64) -> Result<()> {
        // 外键 ON DELETE SET NULL 负责清理就诊记录和处方上的引用
        sqlx::query("DELETE FROM doctors WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VisitRepository for DatabaseQueries {
    async fn create_visit(&self, visit: NewVisit) -> Result<Visit> {
        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbVisit>(r#"
            INSERT INTO visits (
                id, patient_id, doctor_id, visit_type, medical_record_number, chief_complaint, symptoms,
                initial_visit_clinical_manifestation, follow_up_clinical_manifestation, tongue_diagnosis,
                pulse_diagnosis, tcm_diagnosis, western_diagnosis, pattern_differentiation, treatment_plan,
                visit_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
        "#)
        .bind(id)
        .bind(visit.patient_id)
        .bind(visit.doctor_id)
        .bind(visit.visit_type.unwrap_or_default().code())
        .bind(&visit.medical_record_number)
        .bind(&visit.chief_complaint)
        .bind(&visit.symptoms)
        .bind(&visit.initial_visit_clinical_manifestation)
        .bind(&visit.follow_up_clinical_manifestation)
        .bind(&visit.tongue_diagnosis)
        .bind(&visit.pulse_diagnosis)
        .bind(&visit.tcm_diagnosis)
        .bind(&visit.western_diagnosis)
        .bind(&visit.pattern_differentiation)
        .bind(&visit.treatment_plan)
        .bind(visit.visit_date)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(Visit::from(row))
    }

    async fn get_visit(&self, id: i64) -> Result<Option<Visit>> {
        let result = sqlx::query_as::<_, DbVisit>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Visit::from))
    }

    async fn list_visits_by_patient(&self, patient_id: i64) -> Result<Vec<Visit>> {
        let results = sqlx::query_as::<_, DbVisit>(
            "SELECT * FROM visits WHERE patient_id = $1 ORDER BY id"
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Visit::from).collect())
    }

    async fn list_visits_by_doctor(&self, doctor_id: i64) -> Result<Vec<Visit>> {
        let results = sqlx::query_as::<_, DbVisit>(
            "SELECT * FROM visits WHERE doctor_id = $1 ORDER BY id"
        )
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Visit::from).collect())
    }

    async fn update_visit(&self, visit: &Visit) -> Result<Visit> {
        let row = sqlx::query_as::<_, DbVisit>(r#"
            UPDATE visits
            SET patient_id = $2, doctor_id = $3, visit_type = $4, medical_record_number = $5,
                chief_complaint = $6, symptoms = $7, initial_visit_clinical_manifestation = $8,
                follow_up_clinical_manifestation = $9, tongue_diagnosis = $10, pulse_diagnosis = $11,
                tcm_diagnosis = $12, western_diagnosis = $13, pattern_differentiation = $14,
                treatment_plan = $15, visit_date = $16, tongue_image_path = $17,
                ai_analysis_raw_response = $18, ai_analysis_status = $19, updated_at = $20
            WHERE id = $1
            RETURNING *
        "#)
        .bind(visit.id)
        .bind(visit.patient_id)
        .bind(visit.doctor_id)
        .bind(visit.visit_type.code())
        .bind(&visit.medical_record_number)
        .bind(&visit.chief_complaint)
        .bind(&visit.symptoms)
        .bind(&visit.initial_visit_clinical_manifestation)
        .bind(&visit.follow_up_clinical_manifestation)
        .bind(&visit.tongue_diagnosis)
        .bind(&visit.pulse_diagnosis)
        .bind(&visit.tcm_diagnosis)
        .bind(&visit.western_diagnosis)
        .bind(&visit.pattern_differentiation)
        .bind(&visit.treatment_plan)
        .bind(visit.visit_date)
        .bind(&visit.tongue_image_path)
        .bind(&visit.ai_analysis_raw_response)
        .bind(visit.ai_analysis_status.as_str())
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Visit::from)
            .ok_or_else(|| TcmError::visit_not_found(visit.id))
    }

    async fn delete_visit(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM visits WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    async fn set_analysis_status(&self, id: i64, status: AnalysisStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE visits SET ai_analysis_status = $2, updated_at = $3 WHERE id = $1"
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(TcmError::visit_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for DatabaseQueries {
    async fn create_prescription(&self, prescription: NewPrescription) -> Result<Prescription> {
        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbPrescription>(r#"
            INSERT INTO prescriptions (id, visit_id, doctor_id, prescription_name, decoction_method, treatment_duration, doctor_advice, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(id)
        .bind(prescription.visit_id)
        .bind(prescription.doctor_id)
        .bind(&prescription.prescription_name)
        .bind(&prescription.decoction_method)
        .bind(prescription.treatment_duration)
        .bind(&prescription.doctor_advice)
        .bind(prescription.status)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(Prescription::from(row))
    }

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>> {
        let result = sqlx::query_as::<_, DbPrescription>("SELECT * FROM prescriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(Prescription::from))
    }

    async fn list_prescriptions(&self) -> Result<Vec<Prescription>> {
        let results = sqlx::query_as::<_, DbPrescription>("SELECT * FROM prescriptions ORDER BY id")
            .fetch_all(self.pool.pool())
            .await?;

        Ok(results.into_iter().map(Prescription::from).collect())
    }

    async fn list_prescriptions_by_visit(&self, visit_id: i64) -> Result<Vec<Prescription>> {
        let results = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE visit_id = $1 ORDER BY id"
        )
        .bind(visit_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Prescription::from).collect())
    }

    async fn list_prescriptions_by_doctor(&self, doctor_id: i64) -> Result<Vec<Prescription>> {
        let results = sqlx::query_as::<_, DbPrescription>(
            "SELECT * FROM prescriptions WHERE doctor_id = $1 ORDER BY id"
        )
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Prescription::from).collect())
    }

    async fn update_prescription(&self, prescription: &Prescription) -> Result<Prescription> {
        let row = sqlx::query_as::<_, DbPrescription>(r#"
            UPDATE prescriptions
            SET visit_id = $2, doctor_id = $3, prescription_name = $4, decoction_method = $5,
                treatment_duration = $6, doctor_advice = $7, status = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
        "#)
        .bind(prescription.id)
        .bind(prescription.visit_id)
        .bind(prescription.doctor_id)
        .bind(&prescription.prescription_name)
        .bind(&prescription.decoction_method)
        .bind(prescription.treatment_duration)
        .bind(&prescription.doctor_advice)
        .bind(prescription.status)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(Prescription::from).ok_or_else(|| {
            TcmError::NotFound(format!("Prescription not found with id: {}", prescription.id))
        })
    }

    async fn delete_prescription(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM prescriptions WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    async fn create_prescription_detail(
        &self,
        prescription_id: i64,
        detail: NewPrescriptionDetail,
    ) -> Result<PrescriptionDetail> {
        if self.get_prescription(prescription_id).await?.is_none() {
            return Err(TcmError::NotFound(format!(
                "Prescription not found with id: {}",
                prescription_id
            )));
        }

        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbPrescriptionDetail>(r#"
            INSERT INTO prescription_details (id, prescription_id, herb_name, dosage, unit, properties, usage_instructions)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
        "#)
        .bind(id)
        .bind(prescription_id)
        .bind(&detail.herb_name)
        .bind(detail.dosage)
        .bind(&detail.unit)
        .bind(&detail.properties)
        .bind(&detail.usage_instructions)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(PrescriptionDetail::from(row))
    }

    async fn get_prescription_detail(&self, id: i64) -> Result<Option<PrescriptionDetail>> {
        let result = sqlx::query_as::<_, DbPrescriptionDetail>(
            "SELECT * FROM prescription_details WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(result.map(PrescriptionDetail::from))
    }

    async fn list_prescription_details(&self, prescription_id: i64) -> Result<Vec<PrescriptionDetail>> {
        let results = sqlx::query_as::<_, DbPrescriptionDetail>(
            "SELECT * FROM prescription_details WHERE prescription_id = $1 ORDER BY id"
        )
        .bind(prescription_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(PrescriptionDetail::from).collect())
    }

    async fn update_prescription_detail(&self, detail: &PrescriptionDetail) -> Result<PrescriptionDetail> {
        let row = sqlx::query_as::<_, DbPrescriptionDetail>(r#"
            UPDATE prescription_details
            SET herb_name = $2, dosage = $3, unit = $4, properties = $5, usage_instructions = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING *
        "#)
        .bind(detail.id)
        .bind(&detail.herb_name)
        .bind(detail.dosage)
        .bind(&detail.unit)
        .bind(&detail.properties)
        .bind(&detail.usage_instructions)
        .bind(Utc::now())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(PrescriptionDetail::from).ok_or_else(|| {
            TcmError::NotFound(format!("Prescription detail not found with id: {}", detail.id))
        })
    }

    async fn delete_prescription_detail(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM prescription_details WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DiagnosticImageRepository for DatabaseQueries {
    async fn create_diagnostic_image(&self, image: NewDiagnosticImage) -> Result<DiagnosticImage> {
        if self.get_visit(image.visit_id).await?.is_none() {
            return Err(TcmError::visit_not_found(image.visit_id));
        }

        let id = self.ids.next_id()?;

        let row = sqlx::query_as::<_, DbDiagnosticImage>(r#"
            INSERT INTO diagnostic_images (id, visit_id, image_type, image_path, image_name, image_size, original_format, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
        "#)
        .bind(id)
        .bind(image.visit_id)
        .bind(&image.image_type)
        .bind(&image.image_path)
        .bind(&image.image_name)
        .bind(image.image_size)
        .bind(&image.original_format)
        .bind(&image.description)
        .fetch_one(self.pool.pool())
        .await?;

        Ok(DiagnosticImage::from(row))
    }

    async fn get_diagnostic_image(&self, id: i64) -> Result<Option<DiagnosticImage>> {
        let result = sqlx::query_as::<_, DbDiagnosticImage>("SELECT * FROM diagnostic_images WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(result.map(DiagnosticImage::from))
    }

    async fn list_diagnostic_images(&self, image_type: Option<&str>) -> Result<Vec<DiagnosticImage>> {
        let results = match image_type {
            Some(image_type) => {
                sqlx::query_as::<_, DbDiagnosticImage>(
                    "SELECT * FROM diagnostic_images WHERE image_type = $1 ORDER BY id"
                )
                .bind(image_type)
                .fetch_all(self.pool.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, DbDiagnosticImage>("SELECT * FROM diagnostic_images ORDER BY id")
                    .fetch_all(self.pool.pool())
                    .await?
            }
        };

        Ok(results.into_iter().map(DiagnosticImage::from).collect())
    }

    async fn list_diagnostic_images_by_visit(&self, visit_id: i64) -> Result<Vec<DiagnosticImage>> {
        let results = sqlx::query_as::<_, DbDiagnosticImage>(
            "SELECT * FROM diagnostic_images WHERE visit_id = $1 ORDER BY id"
        )
        .bind(visit_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(DiagnosticImage::from).collect())
    }

    async fn delete_diagnostic_image(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM diagnostic_images WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }
}
