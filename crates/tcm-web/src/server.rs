//! Web服务器

use crate::handlers::*;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tcm_core::Result;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// 表单中除文件外其他内容的预留空间
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: create_app(state),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 构造完整的路由
pub fn create_app(state: AppState) -> Router {
    let body_limit = usize::try_from(state.images.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        // 根路径
        .route("/", get(api_root))

        // 健康检查
        .route("/health", get(health))

        // API路由
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)

        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// API 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/:id", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/patients/:id/visits", get(list_patient_visits))

        .route("/doctors", get(list_doctors).post(create_doctor))
        .route("/doctors/:id", get(get_doctor).put(update_doctor).delete(delete_doctor))
        .route("/doctors/:id/visits", get(list_doctor_visits))
        .route("/doctors/:id/prescriptions", get(list_doctor_prescriptions))

        .route("/visits", post(create_visit))
        .route("/visits/:id", get(get_visit).put(update_visit).delete(delete_visit))
        .route("/visits/:id/prescriptions", get(list_visit_prescriptions))
        .route("/visits/:id/tongue-image", post(upload_tongue_image))
        .route("/visits/:id/diagnostic-images", get(list_visit_diagnostic_images))

        .route("/prescriptions", get(list_prescriptions).post(create_prescription))
        .route(
            "/prescriptions/:id",
            get(get_prescription).put(update_prescription).delete(delete_prescription),
        )
        .route(
            "/prescriptions/:id/details",
            get(list_prescription_details).post(create_prescription_detail),
        )
        .route(
            "/prescription-details/:id",
            get(get_prescription_detail)
                .put(update_prescription_detail)
                .delete(delete_prescription_detail),
        )

        // 诊断图片
        .route("/diagnostic-images", get(list_diagnostic_images).post(upload_diagnostic_image))
        .route(
            "/diagnostic-images/:id",
            get(get_diagnostic_image).delete(delete_diagnostic_image),
        )

        // 数据整合与AI分析
        .route("/integration/data-by-visit/:visit_id", get(integrate_visit))
        .route("/ai/analyze-and-process/:visit_id", post(analyze_and_process))

        // 患者自诊
        .route("/self-diagnosis/create-visit/:patient_id", post(create_self_diagnosis_visit))
        .route("/self-diagnosis/complete-self-diagnosis/:visit_id", post(complete_self_diagnosis))
        .route("/self-diagnosis/analysis-result/:visit_id", get(self_diagnosis_result))
        .route("/self-diagnosis/images/:visit_id", get(self_diagnosis_images))
}
