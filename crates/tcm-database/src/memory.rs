//! 内存仓储实现
//!
//! 数据只保存在进程内，用于本地开发和测试。行为与PostgreSQL实现保持一致:
//! 更新不存在的记录返回 `NotFound`，列表按ID (即创建顺序) 排序。

use crate::repository::{
    DiagnosticImageRepository, DoctorRepository, PatientRepository, PrescriptionRepository,
    VisitRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tcm_core::{
    AnalysisStatus, DiagnosticImage, Doctor, NewDiagnosticImage, NewDoctor, NewPatient,
    NewPrescription, NewPrescriptionDetail, NewVisit, Patient, Prescription, PrescriptionDetail,
    Result, SnowflakeIdGenerator, TcmError, Visit,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    patients: BTreeMap<i64, Patient>,
    doctors: BTreeMap<i64, Doctor>,
    visits: BTreeMap<i64, Visit>,
    prescriptions: BTreeMap<i64, Prescription>,
    prescription_details: BTreeMap<i64, PrescriptionDetail>,
    diagnostic_images: BTreeMap<i64, DiagnosticImage>,
}

impl Tables {
    /// 删除处方及其明细
    fn remove_prescriptions(&mut self, ids: &[i64]) {
        for id in ids {
            self.prescriptions.remove(id);
        }
        self.prescription_details
            .retain(|_, d| !ids.contains(&d.prescription_id));
    }
}

/// 内存仓储
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
    ids: Arc<SnowflakeIdGenerator>,
}

impl MemoryRepository {
    pub fn new(ids: Arc<SnowflakeIdGenerator>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            ids,
        }
    }
}

#[async_trait]
impl PatientRepository for MemoryRepository {
    async fn create_patient(&self, patient: NewPatient) -> Result<Patient> {
        let now = Utc::now();
        let created = Patient {
            id: self.ids.next_id()?,
            name: patient.name,
            gender: patient.gender,
            age: patient.age,
            birth_date: patient.birth_date,
            id_card: patient.id_card,
            phone: patient.phone,
            address: patient.address,
            occupation: patient.occupation,
            marital_status: patient.marital_status,
            created_at: now,
            updated_at: now,
        };

        self.tables.write().await.patients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_patient(&self, id: i64) -> Result<Option<Patient>> {
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self) -> Result<Vec<Patient>> {
        Ok(self.tables.read().await.patients.values().cloned().collect())
    }

    async fn update_patient(&self, patient: &Patient) -> Result<Patient> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .patients
            .get_mut(&patient.id)
            .ok_or_else(|| TcmError::NotFound(format!("Patient not found with id: {}", patient.id)))?;

        let created_at = stored.created_at;
        *stored = patient.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_patient(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.patients.remove(&id);
        // 与外键 ON DELETE SET NULL 保持一致
        for visit in tables.visits.values_mut() {
            if visit.patient_id == Some(id) {
                visit.patient_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DoctorRepository for MemoryRepository {
    async fn create_doctor(&self, doctor: NewDoctor) -> Result<Doctor> {
        let now = Utc::now();
        let created = Doctor {
            id: self.ids.next_id()?,
            name: doctor.name,
            department: doctor.department,
            title: doctor.title,
            license_number: doctor.license_number,
            phone: doctor.phone,
            email: doctor.email,
            status: doctor.status,
            created_at: now,
            updated_at: now,
        };

        self.tables.write().await.doctors.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.tables.read().await.doctors.values().cloned().collect())
    }

    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .doctors
            .get_mut(&doctor.id)
            .ok_or_else(|| TcmError::NotFound(format!("Doctor not found with id: {}", doctor.id)))?;

        let created_at = stored.created_at;
        *stored = doctor.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_doctor(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.doctors.remove(&id);
        for visit in tables.visits.values_mut() {
            if visit.doctor_id == Some(id) {
                visit.doctor_id = None;
            }
        }
        for prescription in tables.prescriptions.values_mut() {
            if prescription.doctor_id == Some(id) {
                prescription.doctor_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VisitRepository for MemoryRepository {
    async fn create_visit(&self, visit: NewVisit) -> Result<Visit> {
        let now = Utc::now();
        let created = Visit {
            id: self.ids.next_id()?,
            patient_id: visit.patient_id,
            doctor_id: visit.doctor_id,
            visit_type: visit.visit_type.unwrap_or_default(),
            medical_record_number: visit.medical_record_number,
            chief_complaint: visit.chief_complaint,
            symptoms: visit.symptoms,
            initial_visit_clinical_manifestation: visit.initial_visit_clinical_manifestation,
            follow_up_clinical_manifestation: visit.follow_up_clinical_manifestation,
            tongue_diagnosis: visit.tongue_diagnosis,
            pulse_diagnosis: visit.pulse_diagnosis,
            tcm_diagnosis: visit.tcm_diagnosis,
            western_diagnosis: visit.western_diagnosis,
            pattern_differentiation: visit.pattern_differentiation,
            treatment_plan: visit.treatment_plan,
            visit_date: visit.visit_date,
            tongue_image_path: None,
            ai_analysis_raw_response: None,
            ai_analysis_status: AnalysisStatus::None,
            created_at: now,
            updated_at: now,
        };

        self.tables.write().await.visits.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_visit(&self, id: i64) -> Result<Option<Visit>> {
        Ok(self.tables.read().await.visits.get(&id).cloned())
    }

    async fn list_visits_by_patient(&self, patient_id: i64) -> Result<Vec<Visit>> {
        let tables = self.tables.read().await;
        Ok(tables
            .visits
            .values()
            .filter(|v| v.patient_id == Some(patient_id))
            .cloned()
            .collect())
    }

    async fn list_visits_by_doctor(&self, doctor_id: i64) -> Result<Vec<Visit>> {
        let tables = self.tables.read().await;
        Ok(tables
            .visits
            .values()
            .filter(|v| v.doctor_id == Some(doctor_id))
            .cloned()
            .collect())
    }

    async fn update_visit(&self, visit: &Visit) -> Result<Visit> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .visits
            .get_mut(&visit.id)
            .ok_or_else(|| TcmError::visit_not_found(visit.id))?;

        let created_at = stored.created_at;
        *stored = visit.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_visit(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.visits.remove(&id);

        // 级联删除处方、明细和诊断图片
        let removed: Vec<i64> = tables
            .prescriptions
            .values()
            .filter(|p| p.visit_id == Some(id))
            .map(|p| p.id)
            .collect();
        tables.remove_prescriptions(&removed);
        tables.diagnostic_images.retain(|_, image| image.visit_id != id);
        Ok(())
    }

    async fn set_analysis_status(&self, id: i64, status: AnalysisStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .visits
            .get_mut(&id)
            .ok_or_else(|| TcmError::visit_not_found(id))?;

        stored.ai_analysis_status = status;
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PrescriptionRepository for MemoryRepository {
    async fn create_prescription(&self, prescription: NewPrescription) -> Result<Prescription> {
        let now = Utc::now();
        let created = Prescription {
            id: self.ids.next_id()?,
            visit_id: prescription.visit_id,
            doctor_id: prescription.doctor_id,
            prescription_name: prescription.prescription_name,
            decoction_method: prescription.decoction_method,
            treatment_duration: prescription.treatment_duration,
            doctor_advice: prescription.doctor_advice,
            status: prescription.status,
            created_at: now,
            updated_at: now,
        };

        self.tables.write().await.prescriptions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>> {
        Ok(self.tables.read().await.prescriptions.get(&id).cloned())
    }

    async fn list_prescriptions(&self) -> Result<Vec<Prescription>> {
        Ok(self.tables.read().await.prescriptions.values().cloned().collect())
    }

    async fn list_prescriptions_by_visit(&self, visit_id: i64) -> Result<Vec<Prescription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .prescriptions
            .values()
            .filter(|p| p.visit_id == Some(visit_id))
            .cloned()
            .collect())
    }

    async fn list_prescriptions_by_doctor(&self, doctor_id: i64) -> Result<Vec<Prescription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .prescriptions
            .values()
            .filter(|p| p.doctor_id == Some(doctor_id))
            .cloned()
            .collect())
    }

    async fn update_prescription(&self, prescription: &Prescription) -> Result<Prescription> {
        let mut tables = self.tables.write().await;
        let stored = tables.prescriptions.get_mut(&prescription.id).ok_or_else(|| {
            TcmError::NotFound(format!("Prescription not found with id: {}", prescription.id))
        })?;

        let created_at = stored.created_at;
        *stored = prescription.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_prescription(&self, id: i64) -> Result<()> {
        self.tables.write().await.remove_prescriptions(&[id]);
        Ok(())
    }

    async fn create_prescription_detail(
        &self,
        prescription_id: i64,
        detail: NewPrescriptionDetail,
    ) -> Result<PrescriptionDetail> {
        let mut tables = self.tables.write().await;
        if !tables.prescriptions.contains_key(&prescription_id) {
            return Err(TcmError::NotFound(format!(
                "Prescription not found with id: {}",
                prescription_id
            )));
        }

        let now = Utc::now();
        let created = PrescriptionDetail {
            id: self.ids.next_id()?,
            prescription_id,
            herb_name: detail.herb_name,
            dosage: detail.dosage,
            unit: detail.unit,
            properties: detail.properties,
            usage_instructions: detail.usage_instructions,
            created_at: now,
            updated_at: now,
        };

        tables.prescription_details.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_prescription_detail(&self, id: i64) -> Result<Option<PrescriptionDetail>> {
        Ok(self.tables.read().await.prescription_details.get(&id).cloned())
    }

    async fn list_prescription_details(&self, prescription_id: i64) -> Result<Vec<PrescriptionDetail>> {
        let tables = self.tables.read().await;
        Ok(tables
            .prescription_details
            .values()
            .filter(|d| d.prescription_id == prescription_id)
            .cloned()
            .collect())
    }

    async fn update_prescription_detail(&self, detail: &PrescriptionDetail) -> Result<PrescriptionDetail> {
        let mut tables = self.tables.write().await;
        let stored = tables.prescription_details.get_mut(&detail.id).ok_or_else(|| {
            TcmError::NotFound(format!("Prescription detail not found with id: {}", detail.id))
        })?;

        let prescription_id = stored.prescription_id;
        let created_at = stored.created_at;
        *stored = detail.clone();
        stored.prescription_id = prescription_id;
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_prescription_detail(&self, id: i64) -> Result<()> {
        self.tables.write().await.prescription_details.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl DiagnosticImageRepository for MemoryRepository {
    async fn create_diagnostic_image(&self, image: NewDiagnosticImage) -> Result<DiagnosticImage> {
        let mut tables = self.tables.write().await;
        if !tables.visits.contains_key(&image.visit_id) {
            return Err(TcmError::visit_not_found(image.visit_id));
        }

        let now = Utc::now();
        let created = DiagnosticImage {
            id: self.ids.next_id()?,
            visit_id: image.visit_id,
            image_type: image.image_type,
            image_path: image.image_path,
            image_name: image.image_name,
            image_size: image.image_size,
            original_format: image.original_format,
            description: image.description,
            created_at: now,
            updated_at: now,
        };

        tables.diagnostic_images.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_diagnostic_image(&self, id: i64) -> Result<Option<DiagnosticImage>> {
        Ok(self.tables.read().await.diagnostic_images.get(&id).cloned())
    }

    async fn list_diagnostic_images(&self, image_type: Option<&str>) -> Result<Vec<DiagnosticImage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .diagnostic_images
            .values()
            .filter(|image| image_type.map_or(true, |t| image.image_type == t))
            .cloned()
            .collect())
    }

    async fn list_diagnostic_images_by_visit(&self, visit_id: i64) -> Result<Vec<DiagnosticImage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .diagnostic_images
            .values()
            .filter(|image| image.visit_id == visit_id)
            .cloned()
            .collect())
    }

    async fn delete_diagnostic_image(&self, id: i64) -> Result<()> {
        self.tables.write().await.diagnostic_images.remove(&id);
        Ok(())
    }
}
