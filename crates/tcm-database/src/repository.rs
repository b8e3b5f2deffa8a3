//! 仓储接口
//!
//! 按实体拆分的仓储trait，便于业务层只依赖所需的部分，也便于在测试中替换单个实现。

use async_trait::async_trait;
use tcm_core::{
    AnalysisStatus, DiagnosticImage, Doctor, NewDiagnosticImage, NewDoctor, NewPatient,
    NewPrescription, NewPrescriptionDetail, NewVisit, Patient, Prescription, PrescriptionDetail,
    Result, Visit,
};

/// 患者仓储
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create_patient(&self, patient: NewPatient) -> Result<Patient>;

    async fn get_patient(&self, id: i64) -> Result<Option<Patient>>;

    async fn list_patients(&self) -> Result<Vec<Patient>>;

    /// 更新患者，不存在时返回 `NotFound`
    async fn update_patient(&self, patient: &Patient) -> Result<Patient>;

    async fn delete_patient(&self, id: i64) -> Result<()>;
}

/// 医生仓储
#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn create_doctor(&self, doctor: NewDoctor) -> Result<Doctor>;

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>>;

    async fn list_doctors(&self) -> Result<Vec<Doctor>>;

    /// 更新医生，不存在时返回 `NotFound`
    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor>;

    /// 删除医生，就诊记录和处方上的医生引用置空
    async fn delete_doctor(&self, id: i64) -> Result<()>;
}

/// 就诊记录仓储
#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn create_visit(&self, visit: NewVisit) -> Result<Visit>;

    async fn get_visit(&self, id: i64) -> Result<Option<Visit>>;

    async fn list_visits_by_patient(&self, patient_id: i64) -> Result<Vec<Visit>>;

    async fn list_visits_by_doctor(&self, doctor_id: i64) -> Result<Vec<Visit>>;

    /// 整行写回就诊记录，不存在时返回 `NotFound`
    async fn update_visit(&self, visit: &Visit) -> Result<Visit>;

    async fn delete_visit(&self, id: i64) -> Result<()>;

    /// 只更新AI分析状态，不存在时返回 `NotFound`
    async fn set_analysis_status(&self, id: i64, status: AnalysisStatus) -> Result<()>;
}

/// 处方及处方明细仓储
#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    async fn create_prescription(&self, prescription: NewPrescription) -> Result<Prescription>;

    async fn get_prescription(&self, id: i64) -> Result<Option<Prescription>>;

    async fn list_prescriptions(&self) -> Result<Vec<Prescription>>;

    /// 按创建顺序返回就诊记录下的处方
    async fn list_prescriptions_by_visit(&self, visit_id: i64) -> Result<Vec<Prescription>>;

    async fn list_prescriptions_by_doctor(&self, doctor_id: i64) -> Result<Vec<Prescription>>;

    /// 更新处方，不存在时返回 `NotFound`
    async fn update_prescription(&self, prescription: &Prescription) -> Result<Prescription>;

    /// 删除处方及其明细
    async fn delete_prescription(&self, id: i64) -> Result<()>;

    /// 为处方添加明细，处方不存在时返回 `NotFound`
    async fn create_prescription_detail(
        &self,
        prescription_id: i64,
        detail: NewPrescriptionDetail,
    ) -> Result<PrescriptionDetail>;

    async fn get_prescription_detail(&self, id: i64) -> Result<Option<PrescriptionDetail>>;

    /// 按创建顺序返回处方明细
    async fn list_prescription_details(&self, prescription_id: i64) -> Result<Vec<PrescriptionDetail>>;

    /// 更新处方明细，所属处方不变；不存在时返回 `NotFound`
    async fn update_prescription_detail(&self, detail: &PrescriptionDetail) -> Result<PrescriptionDetail>;

    async fn delete_prescription_detail(&self, id: i64) -> Result<()>;
}

/// 诊断图片仓储
#[async_trait]
pub trait DiagnosticImageRepository: Send + Sync {
    /// 登记诊断图片，就诊记录不存在时返回 `NotFound`
    async fn create_diagnostic_image(&self, image: NewDiagnosticImage) -> Result<DiagnosticImage>;

    async fn get_diagnostic_image(&self, id: i64) -> Result<Option<DiagnosticImage>>;

    /// 列出全部图片，指定类型时只返回该类型
    async fn list_diagnostic_images(&self, image_type: Option<&str>) -> Result<Vec<DiagnosticImage>>;

    async fn list_diagnostic_images_by_visit(&self, visit_id: i64) -> Result<Vec<DiagnosticImage>>;

    async fn delete_diagnostic_image(&self, id: i64) -> Result<()>;
}

/// 诊所全部仓储的组合
pub trait ClinicRepository:
    PatientRepository
    + DoctorRepository
    + VisitRepository
    + PrescriptionRepository
    + DiagnosticImageRepository
{
}

impl<T> ClinicRepository for T where
    T: PatientRepository
        + DoctorRepository
        + VisitRepository
        + PrescriptionRepository
        + DiagnosticImageRepository
{
}
