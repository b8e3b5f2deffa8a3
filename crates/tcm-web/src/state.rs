//! 共享的应用状态

use std::sync::Arc;
use tcm_analysis::AnalysisService;
use tcm_database::{
    ClinicRepository, DiagnosticImageRepository, DoctorRepository, PatientRepository,
    PrescriptionRepository, VisitRepository,
};
use tcm_storage::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub patients: Arc<dyn PatientRepository>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub visits: Arc<dyn VisitRepository>,
    pub prescriptions: Arc<dyn PrescriptionRepository>,
    pub diagnostic_images: Arc<dyn DiagnosticImageRepository>,
    pub analysis: AnalysisService,
    pub images: ImageStore,
}

impl AppState {
    pub fn new<R>(repository: Arc<R>, analysis: AnalysisService, images: ImageStore) -> Self
    where
        R: ClinicRepository + 'static,
    {
        Self {
            patients: repository.clone(),
            doctors: repository.clone(),
            visits: repository.clone(),
            prescriptions: repository.clone(),
            diagnostic_images: repository,
            analysis,
            images,
        }
    }
}
