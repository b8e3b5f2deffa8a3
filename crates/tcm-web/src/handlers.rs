//! HTTP处理器

use crate::error::{ApiError, ApiResult};
use crate::extract::IdPath;
use crate::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tcm_analysis::StoredResult;
use tcm_core::{
    DiagnosticImage, Doctor, NewDiagnosticImage, NewDoctor, NewPatient, NewPrescription,
    NewPrescriptionDetail, NewVisit, Patient, Prescription, PrescriptionDetail, TcmError,
    TONGUE_IMAGE_TYPE,
};
use tcm_storage::DEFAULT_TONGUE_IMAGE_DESCRIPTION;
use tracing::{debug, info, warn};

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "TCM Clinic API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "patients": "/api/patients",
            "doctors": "/api/doctors",
            "visits": "/api/visits",
            "prescriptions": "/api/prescriptions",
            "diagnostic_images": "/api/diagnostic-images",
            "integration": "/api/integration/data-by-visit/:visit_id",
            "analysis": "/api/ai/analyze-and-process/:visit_id",
            "self_diagnosis": "/api/self-diagnosis"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ---- 患者 ----

pub async fn list_patients(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.patients.list_patients().await?))
}

pub async fn get_patient(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    let patient = state
        .patients
        .get_patient(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Patient not found with id: {}", id)))?;
    Ok(Json(patient))
}

pub async fn create_patient(
    State(state): State<AppState>,
    Json(request): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.name, "患者姓名")?;
    let patient = state.patients.create_patient(request).await?;
    info!("Created patient {}", patient.id);
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn update_patient(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.name, "患者姓名")?;
    let existing = state
        .patients
        .get_patient(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Patient not found with id: {}", id)))?;

    let patient = Patient {
        id,
        name: request.name,
        gender: request.gender,
        age: request.age,
        birth_date: request.birth_date,
        id_card: request.id_card,
        phone: request.phone,
        address: request.address,
        occupation: request.occupation,
        marital_status: request.marital_status,
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };
    Ok(Json(state.patients.update_patient(&patient).await?))
}

pub async fn delete_patient(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    if state.patients.get_patient(id).await?.is_none() {
        return Err(TcmError::NotFound(format!("Patient not found with id: {}", id)).into());
    }
    state.patients.delete_patient(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_patient_visits(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.visits.list_visits_by_patient(id).await?))
}

// ---- 医生 ----

pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.doctors.list_doctors().await?))
}

pub async fn get_doctor(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    let doctor = state
        .doctors
        .get_doctor(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Doctor not found with id: {}", id)))?;
    Ok(Json(doctor))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    Json(request): Json<NewDoctor>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.name, "医生姓名")?;
    let doctor = state.doctors.create_doctor(request).await?;
    info!("Created doctor {}", doctor.id);
    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewDoctor>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.name, "医生姓名")?;
    let existing = state
        .doctors
        .get_doctor(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Doctor not found with id: {}", id)))?;

    let doctor = Doctor {
        id,
        name: request.name,
        department: request.department,
        title: request.title,
        license_number: request.license_number,
        phone: request.phone,
        email: request.email,
        status: request.status,
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };
    Ok(Json(state.doctors.update_doctor(&doctor).await?))
}

/// 删除医生，其就诊记录和处方保留但不再关联医生
pub async fn delete_doctor(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    if state.doctors.get_doctor(id).await?.is_none() {
        return Err(TcmError::NotFound(format!("Doctor not found with id: {}", id)).into());
    }
    state.doctors.delete_doctor(id).await?;
    info!("Deleted doctor {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_doctor_prescriptions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.prescriptions.list_prescriptions_by_doctor(id).await?))
}

pub async fn list_doctor_visits(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.visits.list_visits_by_doctor(id).await?))
}

// ---- 就诊记录 ----

pub async fn create_visit(
    State(state): State<AppState>,
    Json(request): Json<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    let visit = state.visits.create_visit(request).await?;
    info!("Created visit {}", visit.id);
    Ok((StatusCode::CREATED, Json(visit)))
}

pub async fn get_visit(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    let visit = state
        .visits
        .get_visit(id)
        .await?
        .ok_or_else(|| TcmError::visit_not_found(id))?;
    Ok(Json(visit))
}

pub async fn update_visit(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    let mut visit = state
        .visits
        .get_visit(id)
        .await?
        .ok_or_else(|| TcmError::visit_not_found(id))?;
    visit.apply(request);
    Ok(Json(state.visits.update_visit(&visit).await?))
}

pub async fn delete_visit(State(state): State<AppState>, IdPath(id): IdPath) -> ApiResult<impl IntoResponse> {
    if state.visits.get_visit(id).await?.is_none() {
        return Err(TcmError::visit_not_found(id).into());
    }
    state.visits.delete_visit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_visit_prescriptions(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.prescriptions.list_prescriptions_by_visit(id).await?))
}

/// 上传舌象图片，表单字段 `file` 为图片，`description` 可选
///
/// 图片同时登记为 `tongue` 类型的诊断图片，就诊记录指向最新一张。
pub async fn upload_tongue_image(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut visit = state
        .visits
        .get_visit(id)
        .await?
        .ok_or_else(|| TcmError::visit_not_found(id))?;

    let form = ImageForm::read(multipart).await?;
    let description = form
        .description
        .clone()
        .unwrap_or_else(|| DEFAULT_TONGUE_IMAGE_DESCRIPTION.to_string());
    let image = store_diagnostic_image(&state, id, TONGUE_IMAGE_TYPE, form, Some(description)).await?;

    visit.tongue_image_path = Some(image.image_path.clone());
    state.visits.update_visit(&visit).await?;

    Ok(Json(json!({
        "visitId": id.to_string(),
        "imageId": image.id.to_string(),
        "path": image.image_path,
        "size": image.image_size,
        "description": image.description
    })))
}

// ---- 诊断图片 ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilter {
    pub image_type: Option<String>,
}

/// 上传诊断图片，表单字段: `visitId`、`file`，`imageType` 默认为舌象
pub async fn upload_diagnostic_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form = ImageForm::read(multipart).await?;

    let visit_id = form
        .visit_id
        .take()
        .ok_or_else(|| TcmError::Validation("缺少就诊记录ID".to_string()))?;
    let visit_id: i64 = visit_id
        .trim()
        .parse()
        .map_err(|_| TcmError::Validation(format!("无效的ID: {}", visit_id)))?;
    if state.visits.get_visit(visit_id).await?.is_none() {
        return Err(TcmError::visit_not_found(visit_id).into());
    }

    let image_type = form
        .image_type
        .take()
        .unwrap_or_else(|| TONGUE_IMAGE_TYPE.to_string());
    let description = form.description.clone();
    let image = store_diagnostic_image(&state, visit_id, &image_type, form, description).await?;

    Ok((StatusCode::CREATED, Json(image)))
}

pub async fn list_diagnostic_images(
    State(state): State<AppState>,
    Query(filter): Query<ImageFilter>,
) -> ApiResult<impl IntoResponse> {
    let image_type = filter.image_type.as_deref().filter(|t| !t.trim().is_empty());
    Ok(Json(state.diagnostic_images.list_diagnostic_images(image_type).await?))
}

pub async fn get_diagnostic_image(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let image = state
        .diagnostic_images
        .get_diagnostic_image(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Diagnostic image not found with id: {}", id)))?;
    Ok(Json(image))
}

/// 删除诊断图片及其文件，就诊记录指向该图片时一并清除
pub async fn delete_diagnostic_image(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let image = state
        .diagnostic_images
        .get_diagnostic_image(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Diagnostic image not found with id: {}", id)))?;

    state.diagnostic_images.delete_diagnostic_image(id).await?;

    if let Some(mut visit) = state.visits.get_visit(image.visit_id).await? {
        if visit.tongue_image_path.as_deref() == Some(image.image_path.as_str()) {
            visit.tongue_image_path = None;
            state.visits.update_visit(&visit).await?;
        }
    }

    // 记录已删除，文件清理失败只记日志
    if let Err(e) = state.images.remove_image(&image.image_path).await {
        warn!("Failed to remove image file for {}: {}", id, e);
    }

    info!("Deleted diagnostic image {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_visit_diagnostic_images(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.visits.get_visit(id).await?.is_none() {
        return Err(TcmError::visit_not_found(id).into());
    }
    Ok(Json(state.diagnostic_images.list_diagnostic_images_by_visit(id).await?))
}

/// 上传表单中识别的字段
#[derive(Debug, Default)]
struct ImageForm {
    file: Option<UploadedFile>,
    visit_id: Option<String>,
    image_type: Option<String>,
    description: Option<String>,
}

#[derive(Debug)]
struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl ImageForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ImageForm::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(invalid_form)?;
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        data: bytes.to_vec(),
                    });
                }
                "visitId" => form.visit_id = non_blank(field.text().await.map_err(invalid_form)?),
                "imageType" => form.image_type = non_blank(field.text().await.map_err(invalid_form)?),
                "description" => form.description = non_blank(field.text().await.map_err(invalid_form)?),
                other => debug!("Ignoring form field {}", other),
            }
        }

        Ok(form)
    }
}

/// 写入图片文件并登记诊断图片记录，登记失败时删除已写入的文件
async fn store_diagnostic_image(
    state: &AppState,
    visit_id: i64,
    image_type: &str,
    form: ImageForm,
    description: Option<String>,
) -> Result<DiagnosticImage, ApiError> {
    let file = form
        .file
        .ok_or_else(|| TcmError::Validation("缺少上传文件".to_string()))?;
    let stored = state
        .images
        .store_image(
            visit_id,
            image_type,
            file.file_name.as_deref(),
            file.content_type.as_deref(),
            &file.data,
        )
        .await?;

    let record = NewDiagnosticImage {
        visit_id,
        image_type: image_type.to_string(),
        image_path: stored.path.clone(),
        image_name: Some(stored.original_name),
        image_size: i64::try_from(stored.size).unwrap_or(i64::MAX),
        original_format: Some(stored.format),
        description,
    };

    match state.diagnostic_images.create_diagnostic_image(record).await {
        Ok(image) => {
            info!("Registered {} image {} for visit {}", image_type, image.id, visit_id);
            Ok(image)
        }
        Err(e) => {
            if let Err(cleanup) = state.images.remove_image(&stored.path).await {
                warn!("Failed to remove orphaned image {}: {}", stored.path, cleanup);
            }
            Err(e.into())
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// ---- 处方 ----

pub async fn create_prescription(
    State(state): State<AppState>,
    Json(request): Json<NewPrescription>,
) -> ApiResult<impl IntoResponse> {
    if let Some(visit_id) = request.visit_id {
        if state.visits.get_visit(visit_id).await?.is_none() {
            return Err(TcmError::visit_not_found(visit_id).into());
        }
    }
    let prescription = state.prescriptions.create_prescription(request).await?;
    info!("Created prescription {}", prescription.id);
    Ok((StatusCode::CREATED, Json(prescription)))
}

pub async fn list_prescriptions(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.prescriptions.list_prescriptions().await?))
}

pub async fn get_prescription(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let prescription = state
        .prescriptions
        .get_prescription(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Prescription not found with id: {}", id)))?;
    Ok(Json(prescription))
}

pub async fn update_prescription(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewPrescription>,
) -> ApiResult<impl IntoResponse> {
    let existing = state
        .prescriptions
        .get_prescription(id)
        .await?
        .ok_or_else(|| TcmError::NotFound(format!("Prescription not found with id: {}", id)))?;
    if let Some(visit_id) = request.visit_id {
        if state.visits.get_visit(visit_id).await?.is_none() {
            return Err(TcmError::visit_not_found(visit_id).into());
        }
    }

    let prescription = Prescription {
        id,
        visit_id: request.visit_id,
        doctor_id: request.doctor_id,
        prescription_name: request.prescription_name,
        decoction_method: request.decoction_method,
        treatment_duration: request.treatment_duration,
        doctor_advice: request.doctor_advice,
        status: request.status,
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };
    Ok(Json(state.prescriptions.update_prescription(&prescription).await?))
}

/// 删除处方及其明细
pub async fn delete_prescription(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.prescriptions.get_prescription(id).await?.is_none() {
        return Err(TcmError::NotFound(format!("Prescription not found with id: {}", id)).into());
    }
    state.prescriptions.delete_prescription(id).await?;
    info!("Deleted prescription {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_prescription_details(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.prescriptions.get_prescription(id).await?.is_none() {
        return Err(TcmError::NotFound(format!("Prescription not found with id: {}", id)).into());
    }
    Ok(Json(state.prescriptions.list_prescription_details(id).await?))
}

pub async fn create_prescription_detail(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewPrescriptionDetail>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.herb_name, "药材名称")?;
    let detail = state.prescriptions.create_prescription_detail(id, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_prescription_detail(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let detail = state
        .prescriptions
        .get_prescription_detail(id)
        .await?
        .ok_or_else(|| detail_not_found(id))?;
    Ok(Json(detail))
}

/// 更新处方明细，所属处方不变
pub async fn update_prescription_detail(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    Json(request): Json<NewPrescriptionDetail>,
) -> ApiResult<impl IntoResponse> {
    require_name(&request.herb_name, "药材名称")?;
    let existing = state
        .prescriptions
        .get_prescription_detail(id)
        .await?
        .ok_or_else(|| detail_not_found(id))?;

    let detail = PrescriptionDetail {
        id,
        prescription_id: existing.prescription_id,
        herb_name: request.herb_name,
        dosage: request.dosage,
        unit: request.unit,
        properties: request.properties,
        usage_instructions: request.usage_instructions,
        created_at: existing.created_at,
        updated_at: existing.updated_at,
    };
    Ok(Json(state.prescriptions.update_prescription_detail(&detail).await?))
}

pub async fn delete_prescription_detail(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.prescriptions.get_prescription_detail(id).await?.is_none() {
        return Err(detail_not_found(id).into());
    }
    state.prescriptions.delete_prescription_detail(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn detail_not_found(id: i64) -> TcmError {
    TcmError::NotFound(format!("Prescription detail not found with id: {}", id))
}

// ---- 数据整合与AI分析 ----

/// 整合就诊数据，就诊记录不存在时按请求错误处理
pub async fn integrate_visit(
    State(state): State<AppState>,
    IdPath(visit_id): IdPath,
) -> ApiResult<impl IntoResponse> {
    match state.analysis.integrate(visit_id).await {
        Ok(document) => Ok(Json(document)),
        Err(TcmError::NotFound(message)) => Err(TcmError::Validation(message).into()),
        Err(e) => Err(e.into()),
    }
}

/// 同步执行AI分析并写回结果
pub async fn analyze_and_process(
    State(state): State<AppState>,
    IdPath(visit_id): IdPath,
) -> ApiResult<impl IntoResponse> {
    info!("AI analysis requested for visit {}", visit_id);
    let result = state.analysis.analyze(visit_id).await?;
    Ok(Json(result))
}

/// 创建自诊就诊记录
pub async fn create_self_diagnosis_visit(
    State(state): State<AppState>,
    IdPath(patient_id): IdPath,
    Json(mut request): Json<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    if state.patients.get_patient(patient_id).await?.is_none() {
        return Err(TcmError::NotFound(format!("Patient not found with id: {}", patient_id)).into());
    }

    request.patient_id = Some(patient_id);
    if request
        .medical_record_number
        .as_deref()
        .map_or(true, |n| n.trim().is_empty())
    {
        request.medical_record_number = Some(format!("SD-{}", Utc::now().timestamp_millis()));
    }
    if request.visit_date.is_none() {
        request.visit_date = Some(Utc::now());
    }

    let visit = state.visits.create_visit(request).await?;
    info!("Created self-diagnosis visit {} for patient {}", visit.id, patient_id);
    Ok(Json(visit))
}

/// 提交自诊，AI分析在后台进行
pub async fn complete_self_diagnosis(
    State(state): State<AppState>,
    IdPath(visit_id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let task = state.analysis.submit(visit_id).await?;
    // 不等待后台任务，结果通过轮询获取
    drop(task.handle);
    Ok(Json(task.ack))
}

/// 自诊就诊记录的诊断图片
pub async fn self_diagnosis_images(
    State(state): State<AppState>,
    IdPath(visit_id): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.visits.get_visit(visit_id).await?.is_none() {
        return Err(TcmError::visit_not_found(visit_id).into());
    }
    let images = state
        .diagnostic_images
        .list_diagnostic_images_by_visit(visit_id)
        .await?;
    Ok(Json(json!({
        "visitId": visit_id.to_string(),
        "images": images
    })))
}

/// 轮询自诊分析结果
pub async fn self_diagnosis_result(
    State(state): State<AppState>,
    IdPath(visit_id): IdPath,
) -> ApiResult<impl IntoResponse> {
    let body = match state.analysis.stored_result(visit_id).await? {
        StoredResult::Pending => json!({
            "status": "pending",
            "message": "AI analysis not completed yet"
        }),
        StoredResult::Failed => json!({
            "status": "failed",
            "message": "AI analysis failed, please submit again"
        }),
        StoredResult::Analysis(result) => json!({
            "status": "success",
            "result": result
        }),
        StoredResult::Recorded(recorded) => json!({
            "status": "success",
            "result": recorded
        }),
    };
    Ok(Json(body))
}

fn require_name(name: &str, field: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(TcmError::Validation(format!("{}不能为空", field)).into());
    }
    Ok(())
}

fn invalid_form(e: axum::extract::multipart::MultipartError) -> ApiError {
    TcmError::Validation(format!("无效的上传表单: {}", e)).into()
}
