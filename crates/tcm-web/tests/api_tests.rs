use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tcm_analysis::{AnalysisService, GatewaySettings, HttpModelGateway, ModelGateway, StaticGateway};
use tcm_core::SnowflakeIdGenerator;
use tcm_database::MemoryRepository;
use tcm_storage::ImageStore;
use tcm_web::{create_app, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

const MODEL_CONTENT: &str = r#"{"中医病名":"感冒","证型推理":"风寒束表证","治则治法":"疏风散寒","最终结果":{"处方名称":"荆防败毒散","处方组成":"荆芥10g，防风10g"}}"#;

struct TestApp {
    app: Router,
    _upload_dir: TempDir,
}

fn envelope() -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": MODEL_CONTENT}}]}).to_string()
}

fn test_app() -> TestApp {
    test_app_with(Arc::new(StaticGateway::new(envelope())))
}

/// 模型服务地址不可达的应用
fn unreachable_model_app() -> TestApp {
    let settings = GatewaySettings {
        endpoint: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    test_app_with(Arc::new(HttpModelGateway::new(&settings).unwrap()))
}

fn test_app_with(gateway: Arc<dyn ModelGateway>) -> TestApp {
    let repository = Arc::new(MemoryRepository::new(Arc::new(
        SnowflakeIdGenerator::new(1, 1).unwrap(),
    )));
    let analysis = AnalysisService::new(repository.clone(), gateway, GatewaySettings::default());
    let upload_dir = tempfile::tempdir().unwrap();
    let images = ImageStore::new(upload_dir.path(), 1024 * 1024);

    TestApp {
        app: create_app(AppState::new(repository, analysis, images)),
        _upload_dir: upload_dir,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    send_request(app, builder.body(body).unwrap()).await
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_patient(app: &Router) -> String {
    let (status, patient) = send(
        app,
        "POST",
        "/api/patients",
        Some(json!({"name": "Zhang San", "gender": 1, "age": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    patient["id"].as_str().unwrap().to_string()
}

async fn create_visit(app: &Router, patient_id: &str) -> String {
    let (status, visit) = send(
        app,
        "POST",
        "/api/visits",
        Some(json!({"patientId": patient_id, "chiefComplaint": "headache"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    visit["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let test = test_app();
    let (status, body) = send(&test.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_patient_crud() {
    let test = test_app();
    let id = create_patient(&test.app).await;

    let (status, patient) = send(&test.app, "GET", &format!("/api/patients/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patient["name"], "Zhang San");
    assert_eq!(patient["gender"], 1);

    let (status, updated) = send(
        &test.app,
        "PUT",
        &format!("/api/patients/{}", id),
        Some(json!({"name": "张三", "age": 31})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["age"], 31);

    let (status, list) = send(&test.app, "GET", "/api/patients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&test.app, "DELETE", &format!("/api/patients/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&test.app, "GET", &format!("/api/patients/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_create_patient_requires_name() {
    let test = test_app();
    let (status, body) = send(&test.app, "POST", "/api/patients", Some(json!({"name": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_doctor_and_visit_crud() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;

    let (status, doctor) = send(
        &test.app,
        "POST",
        "/api/doctors",
        Some(json!({"name": "李医生", "department": "中医内科"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let doctor_id = doctor["id"].as_str().unwrap().to_string();

    let (status, visit) = send(
        &test.app,
        "POST",
        "/api/visits",
        Some(json!({"patientId": patient_id, "doctorId": doctor_id, "chiefComplaint": "咳嗽"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let visit_id = visit["id"].as_str().unwrap().to_string();

    let (status, visits) = send(&test.app, "GET", &format!("/api/doctors/{}/visits", doctor_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visits[0]["id"], visit_id.as_str());

    let (status, visits) = send(&test.app, "GET", &format!("/api/patients/{}/visits", patient_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visits.as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &test.app,
        "PUT",
        &format!("/api/visits/{}", visit_id),
        Some(json!({"patientId": patient_id, "visitType": 1, "chiefComplaint": "咳嗽三日"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["visitType"], 1);
    assert_eq!(updated["chiefComplaint"], "咳嗽三日");
    assert_eq!(updated["doctorId"], Value::Null);

    let (status, _) = send(&test.app, "DELETE", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&test.app, "GET", "/api/doctors/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_integrate_visit() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;

    let (status, document) = send(
        &test.app,
        "GET",
        &format!("/api/integration/data-by-visit/{}", visit_id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        document["患者信息"],
        json!({"姓名": "Zhang San", "性别": "男", "年龄": "30岁"})
    );
    assert_eq!(document["临床表现"]["症状体征"], "headache");
    assert_eq!(document["最终结果"], json!({}));
    assert_eq!(document["编号"], json!(visit_id));
}

#[tokio::test]
async fn test_integrate_missing_visit_is_bad_request() {
    let test = test_app();
    let (status, body) = send(&test.app, "GET", "/api/integration/data-by-visit/999", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_analyze_and_process() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;

    let (status, result) = send(
        &test.app,
        "POST",
        &format!("/api/ai/analyze-and-process/{}", visit_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["中医病名"], "感冒");
    assert_eq!(result["临床表现"], "未提供");
    assert_eq!(result["最终结果"]["处方名称"], "荆防败毒散");

    let (_, visit) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(visit["tcmDiagnosis"], "感冒");
    assert_eq!(visit["aiAnalysisRawResponse"], json!(envelope()));

    let (_, prescriptions) = send(
        &test.app,
        "GET",
        &format!("/api/visits/{}/prescriptions", visit_id),
        None,
    )
    .await;
    assert_eq!(prescriptions[0]["doctorAdvice"], "荆芥10g，防风10g");
}

#[tokio::test]
async fn test_analyze_missing_visit() {
    let test = test_app();
    let (status, _) = send(&test.app, "POST", "/api/ai/analyze-and-process/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_self_diagnosis_flow() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;

    let (status, visit) = send(
        &test.app,
        "POST",
        &format!("/api/self-diagnosis/create-visit/{}", patient_id),
        Some(json!({"chiefComplaint": "失眠多梦"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(visit["medicalRecordNumber"].as_str().unwrap().starts_with("SD-"));
    assert_eq!(visit["patientId"], json!(patient_id));
    let visit_id = visit["id"].as_str().unwrap().to_string();

    let (status, ack) = send(
        &test.app,
        "POST",
        &format!("/api/self-diagnosis/complete-self-diagnosis/{}", visit_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "submitted");
    assert_eq!(ack["visitId"], json!(visit_id));

    // 后台任务很快完成，轮询直到拿到结果
    let uri = format!("/api/self-diagnosis/analysis-result/{}", visit_id);
    let mut body = Value::Null;
    for _ in 0..50 {
        let (status, polled) = send(&test.app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        body = polled;
        if body["status"] == "success" && body["result"]["中医病名"] == "感冒" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(body["status"], "success");
    assert_eq!(body["result"]["治则治法"], "疏风散寒");
}

#[tokio::test]
async fn test_create_self_diagnosis_visit_for_missing_patient() {
    let test = test_app();
    let (status, _) = send(
        &test.app,
        "POST",
        "/api/self-diagnosis/create-visit/12345",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prescription_details() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;

    let (status, prescription) = send(
        &test.app,
        "POST",
        "/api/prescriptions",
        Some(json!({"visitId": visit_id, "prescriptionName": "桂枝汤"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let prescription_id = prescription["id"].as_str().unwrap().to_string();
    let details_uri = format!("/api/prescriptions/{}/details", prescription_id);

    let (status, detail) = send(
        &test.app,
        "POST",
        &details_uri,
        Some(json!({"herbName": "桂枝", "dosage": 9.0, "unit": "g"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(detail["prescriptionId"], json!(prescription_id));

    let (status, details) = send(&test.app, "GET", &details_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details[0]["herbName"], "桂枝");

    let (_, document) = send(
        &test.app,
        "GET",
        &format!("/api/integration/data-by-visit/{}", visit_id),
        None,
    )
    .await;
    assert_eq!(
        document["最终结果"],
        json!({"处方名称": "桂枝汤", "处方组成": "桂枝"})
    );

    let (status, _) = send(&test.app, "GET", "/api/prescriptions/1/details", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// 上传文件: (文件名, 类型, 内容)
type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

fn multipart(uri: &str, fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Request<Body> {
    let boundary = "tcm-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
                 Content-Type: {c}\r\n\r\n",
                b = boundary,
                f = file_name,
                c = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

fn multipart_request(uri: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    multipart(uri, &[("description", "舌红苔黄")], Some((file_name, content_type, data)))
}

#[tokio::test]
async fn test_upload_tongue_image() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;
    let uri = format!("/api/visits/{}/tongue-image", visit_id);

    let request = multipart_request(&uri, "tongue.png", "image/png", b"\x89PNG fake image");
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["description"], "舌红苔黄");
    assert_eq!(body["size"], 15);
    assert!(body["imageId"].is_string());

    let (_, visit) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(visit["tongueImagePath"], body["path"]);

    let request = multipart_request(&uri, "notes.txt", "text/plain", b"hello");
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = multipart_request("/api/visits/999/tongue-image", "tongue.png", "image/png", b"png");
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_self_diagnosis_reports_failed_analysis() {
    let test = unreachable_model_app();
    let patient_id = create_patient(&test.app).await;
    let (_, visit) = send(
        &test.app,
        "POST",
        &format!("/api/self-diagnosis/create-visit/{}", patient_id),
        Some(json!({"chiefComplaint": "胃脘胀痛"})),
    )
    .await;
    let visit_id = visit["id"].as_str().unwrap().to_string();

    let (status, ack) = send(
        &test.app,
        "POST",
        &format!("/api/self-diagnosis/complete-self-diagnosis/{}", visit_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "submitted");

    let uri = format!("/api/self-diagnosis/analysis-result/{}", visit_id);
    let mut body = Value::Null;
    for _ in 0..150 {
        let (status, polled) = send(&test.app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        body = polled;
        if body["status"] == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body["status"], "failed");
    assert!(body.get("result").is_none());

    let (_, visit) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(visit["aiAnalysisStatus"], "failed");
}

#[tokio::test]
async fn test_doctor_and_prescription_management() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;

    let (_, doctor) = send(&test.app, "POST", "/api/doctors", Some(json!({"name": "李医生"}))).await;
    let doctor_id = doctor["id"].as_str().unwrap().to_string();
    let doctor_uri = format!("/api/doctors/{}", doctor_id);

    let (status, updated) = send(
        &test.app,
        "PUT",
        &doctor_uri,
        Some(json!({"name": "王医生", "title": "主任医师"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "王医生");
    assert_eq!(updated["title"], "主任医师");
    assert_eq!(updated["createdAt"], doctor["createdAt"]);

    let (status, _) = send(&test.app, "PUT", &doctor_uri, Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, visit) = send(
        &test.app,
        "POST",
        "/api/visits",
        Some(json!({"patientId": patient_id, "doctorId": doctor_id})),
    )
    .await;
    let visit_id = visit["id"].as_str().unwrap().to_string();

    let (status, prescription) = send(
        &test.app,
        "POST",
        "/api/prescriptions",
        Some(json!({"visitId": visit_id, "doctorId": doctor_id, "prescriptionName": "桂枝汤"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let prescription_id = prescription["id"].as_str().unwrap().to_string();
    let prescription_uri = format!("/api/prescriptions/{}", prescription_id);

    let (_, all) = send(&test.app, "GET", "/api/prescriptions", None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    let (_, by_doctor) = send(&test.app, "GET", &format!("{}/prescriptions", doctor_uri), None).await;
    assert_eq!(by_doctor[0]["id"], json!(prescription_id));

    let (status, updated) = send(
        &test.app,
        "PUT",
        &prescription_uri,
        Some(json!({"visitId": visit_id, "doctorId": doctor_id, "prescriptionName": "麻黄汤", "status": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["prescriptionName"], "麻黄汤");
    assert_eq!(updated["status"], 1);

    let (status, _) = send(
        &test.app,
        "PUT",
        &prescription_uri,
        Some(json!({"visitId": "999", "prescriptionName": "麻黄汤"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 处方明细按ID维护
    let (_, detail) = send(
        &test.app,
        "POST",
        &format!("{}/details", prescription_uri),
        Some(json!({"herbName": "桂枝", "dosage": 9.0, "unit": "g"})),
    )
    .await;
    let detail_uri = format!("/api/prescription-details/{}", detail["id"].as_str().unwrap());

    let (status, fetched) = send(&test.app, "GET", &detail_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["herbName"], "桂枝");

    let (status, changed) = send(
        &test.app,
        "PUT",
        &detail_uri,
        Some(json!({"herbName": "麻黄", "dosage": 6.0, "unit": "g"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["herbName"], "麻黄");
    assert_eq!(changed["dosage"], 6.0);
    assert_eq!(changed["prescriptionId"], json!(prescription_id));

    let (status, _) = send(&test.app, "PUT", &detail_uri, Some(json!({"herbName": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, "DELETE", &detail_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&test.app, "GET", &detail_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 删除医生后处方和就诊记录保留
    let (status, _) = send(&test.app, "DELETE", &doctor_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&test.app, "GET", &doctor_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, kept) = send(&test.app, "GET", &prescription_uri, None).await;
    assert_eq!(kept["doctorId"], Value::Null);
    let (_, kept) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(kept["doctorId"], Value::Null);

    let (status, _) = send(&test.app, "DELETE", &prescription_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&test.app, "GET", &format!("{}/details", prescription_uri), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, all) = send(&test.app, "GET", "/api/prescriptions", None).await;
    assert!(all.as_array().unwrap().is_empty());

    let (status, _) = send(&test.app, "DELETE", &prescription_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_diagnostic_images() {
    let test = test_app();
    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;

    let request = multipart(
        "/api/diagnostic-images",
        &[("visitId", visit_id.as_str()), ("imageType", "face"), ("description", "面色萎黄")],
        Some(("face.jpg", "image/jpeg", &b"fake jpeg"[..])),
    );
    let (status, face) = send_request(&test.app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(face["visitId"], json!(visit_id));
    assert_eq!(face["imageType"], "face");
    assert_eq!(face["imageName"], "face.jpg");
    assert_eq!(face["originalFormat"], "jpg");
    assert_eq!(face["imageSize"], 9);
    assert_eq!(face["description"], "面色萎黄");

    let request = multipart_request(
        &format!("/api/visits/{}/tongue-image", visit_id),
        "tongue.png",
        "image/png",
        b"\x89PNG fake image",
    );
    let (status, tongue) = send_request(&test.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let tongue_id = tongue["imageId"].as_str().unwrap().to_string();

    let (status, by_visit) = send(
        &test.app,
        "GET",
        &format!("/api/visits/{}/diagnostic-images", visit_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_visit.as_array().unwrap().len(), 2);

    let (_, faces) = send(&test.app, "GET", "/api/diagnostic-images?imageType=face", None).await;
    assert_eq!(faces.as_array().unwrap().len(), 1);
    assert_eq!(faces[0]["id"], face["id"]);
    let (_, all) = send(&test.app, "GET", "/api/diagnostic-images", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, listing) = send(
        &test.app,
        "GET",
        &format!("/api/self-diagnosis/images/{}", visit_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["visitId"], json!(visit_id));
    assert_eq!(listing["images"].as_array().unwrap().len(), 2);

    let image_uri = format!("/api/diagnostic-images/{}", tongue_id);
    let (status, fetched) = send(&test.app, "GET", &image_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["imageType"], "tongue");
    assert_eq!(fetched["description"], "舌红苔黄");
    let image_path = fetched["imagePath"].as_str().unwrap().to_string();
    assert!(Path::new(&image_path).exists());

    let (status, _) = send(&test.app, "DELETE", &image_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!Path::new(&image_path).exists());
    let (status, _) = send(&test.app, "GET", &image_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, visit) = send(&test.app, "GET", &format!("/api/visits/{}", visit_id), None).await;
    assert_eq!(visit["tongueImagePath"], Value::Null);
}

#[tokio::test]
async fn test_diagnostic_image_upload_errors() {
    let test = test_app();

    let request = multipart(
        "/api/diagnostic-images",
        &[("imageType", "face")],
        Some(("face.png", "image/png", &b"png"[..])),
    );
    let (status, body) = send_request(&test.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    let request = multipart(
        "/api/diagnostic-images",
        &[("visitId", "999")],
        Some(("face.png", "image/png", &b"png"[..])),
    );
    let (status, _) = send_request(&test.app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let patient_id = create_patient(&test.app).await;
    let visit_id = create_visit(&test.app, &patient_id).await;
    let request = multipart(
        "/api/diagnostic-images",
        &[("visitId", visit_id.as_str()), ("imageType", "../etc")],
        Some(("face.png", "image/png", &b"png"[..])),
    );
    let (status, _) = send_request(&test.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&test.app, "GET", "/api/self-diagnosis/images/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let test = test_app();

    for (method, uri) in [
        ("GET", "/api/patients/abc"),
        ("DELETE", "/api/visits/1x"),
        ("GET", "/api/prescription-details/abc"),
        ("GET", "/api/self-diagnosis/analysis-result/not-a-number"),
    ] {
        let (status, body) = send(&test.app, method, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert_eq!(body["error"], true);
        assert_eq!(body["status"], 400);
        assert!(body["message"].as_str().unwrap().contains("无效的ID"));
    }
}
