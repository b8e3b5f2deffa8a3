//! AI分析服务
//!
//! 串联数据整合、模型调用、响应解析和结果写回。`analyze` 同步等待整个流程，
//! `submit` 在后台任务中运行并把状态记录在就诊记录上，供调用方轮询。

use crate::assembler::{DataAssembler, IntegratedDocument};
use crate::gateway::{build_request, GatewaySettings, ModelGateway};
use crate::parser::{content_object, extract_content, parse_model_response, DiagnosisResult};
use crate::state_machine::{AnalysisEvent, AnalysisRun, AnalysisStateMachine};
use crate::writer::ResultWriter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tcm_core::{AnalysisStatus, Result, TcmError};
use tcm_database::{ClinicRepository, VisitRepository};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const SUBMITTED_MESSAGE: &str = "自诊数据已提交，AI分析正在进行中";

/// 提交确认
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    #[serde(with = "tcm_core::models::id_string")]
    pub visit_id: i64,
    pub task_id: Uuid,
    pub status: String,
    pub message: String,
}

/// 已提交的分析任务，HTTP调用方丢弃 `handle` 即可
#[derive(Debug)]
pub struct AnalysisTask {
    pub ack: Acknowledgement,
    pub handle: JoinHandle<Result<DiagnosisResult>>,
}

/// 就诊记录上已有的诊断字段
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordedDiagnosis {
    #[serde(rename = "中医病名")]
    pub tcm_diagnosis: Option<String>,
    #[serde(rename = "西医诊断")]
    pub western_diagnosis: Option<String>,
    #[serde(rename = "证型推理")]
    pub pattern_differentiation: Option<String>,
    #[serde(rename = "治则治法")]
    pub treatment_plan: Option<String>,
}

/// 轮询得到的分析结果
#[derive(Debug, Clone, PartialEq)]
pub enum StoredResult {
    /// 分析仍在进行
    Pending,
    /// 最近一次后台分析失败，不返回更早的结果
    Failed,
    /// 保存的原始响应中解析出的模型输出
    Analysis(Map<String, Value>),
    /// 没有可解析的模型输出时，返回就诊记录上的诊断字段
    Recorded(RecordedDiagnosis),
}

/// AI分析服务
#[derive(Clone)]
pub struct AnalysisService {
    assembler: DataAssembler,
    writer: ResultWriter,
    visits: Arc<dyn VisitRepository>,
    gateway: Arc<dyn ModelGateway>,
    settings: Arc<GatewaySettings>,
    machine: Arc<AnalysisStateMachine>,
}

impl AnalysisService {
    pub fn new<R>(repository: Arc<R>, gateway: Arc<dyn ModelGateway>, settings: GatewaySettings) -> Self
    where
        R: ClinicRepository + 'static,
    {
        Self {
            assembler: DataAssembler::new(repository.clone(), repository.clone(), repository.clone()),
            writer: ResultWriter::new(repository.clone(), repository.clone()),
            visits: repository,
            gateway,
            settings: Arc::new(settings),
            machine: Arc::new(AnalysisStateMachine::new()),
        }
    }

    /// 整合就诊数据
    pub async fn integrate(&self, visit_id: i64) -> Result<IntegratedDocument> {
        self.assembler.integrate(visit_id).await
    }

    /// 执行一次完整的AI分析
    pub async fn analyze(&self, visit_id: i64) -> Result<DiagnosisResult> {
        let mut run = AnalysisRun::new(visit_id);
        let span = info_span!("analysis_run", run_id = %run.run_id, visit_id);

        async move {
            info!("Starting AI analysis");
            match self.run(&mut run).await {
                Ok(result) => {
                    info!("AI analysis completed ({:?})", result.tier);
                    Ok(result)
                }
                Err(e) => {
                    error!("AI analysis failed in stage {:?}: {}", run.stage(), e);
                    if let Err(transition_error) = run.advance(&self.machine, AnalysisEvent::Fail) {
                        warn!("Could not mark run as failed: {}", transition_error);
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, run: &mut AnalysisRun) -> Result<DiagnosisResult> {
        run.advance(&self.machine, AnalysisEvent::Start)?;
        let document = self.assembler.integrate(run.visit_id).await?;

        run.advance(&self.machine, AnalysisEvent::DocumentAssembled)?;
        let request = build_request(&document, &self.settings);
        let raw_response = self.gateway.complete(&request).await?;

        run.advance(&self.machine, AnalysisEvent::ResponseReceived)?;
        let result = parse_model_response(&raw_response);

        run.advance(&self.machine, AnalysisEvent::ResponseParsed)?;
        self.writer.write(run.visit_id, &raw_response, &result).await?;

        run.advance(&self.machine, AnalysisEvent::ResultWritten)?;
        Ok(result)
    }

    /// 提交后台分析，立即返回确认
    pub async fn submit(&self, visit_id: i64) -> Result<AnalysisTask> {
        if self.visits.get_visit(visit_id).await?.is_none() {
            return Err(TcmError::visit_not_found(visit_id));
        }
        self.visits
            .set_analysis_status(visit_id, AnalysisStatus::Pending)
            .await?;

        let service = self.clone();
        let handle = tokio::spawn(async move {
            let result = service.analyze(visit_id).await;
            let status = if result.is_ok() {
                AnalysisStatus::Completed
            } else {
                AnalysisStatus::Failed
            };
            if let Err(e) = service.visits.set_analysis_status(visit_id, status).await {
                error!("Failed to record analysis status for visit {}: {}", visit_id, e);
            }
            result
        });

        info!("Submitted background analysis for visit {}", visit_id);
        Ok(AnalysisTask {
            ack: Acknowledgement {
                visit_id,
                task_id: Uuid::new_v4(),
                status: "submitted".to_string(),
                message: SUBMITTED_MESSAGE.to_string(),
            },
            handle,
        })
    }

    /// 读取已保存的分析结果
    pub async fn stored_result(&self, visit_id: i64) -> Result<StoredResult> {
        let visit = self
            .visits
            .get_visit(visit_id)
            .await?
            .ok_or_else(|| TcmError::visit_not_found(visit_id))?;

        match visit.ai_analysis_status {
            AnalysisStatus::Pending => return Ok(StoredResult::Pending),
            AnalysisStatus::Failed => return Ok(StoredResult::Failed),
            AnalysisStatus::None | AnalysisStatus::Completed => {}
        }

        let stored = visit
            .ai_analysis_raw_response
            .as_deref()
            .and_then(extract_content)
            .and_then(|content| content_object(&content));
        if let Some(object) = stored {
            return Ok(StoredResult::Analysis(object));
        }

        Ok(StoredResult::Recorded(RecordedDiagnosis {
            tcm_diagnosis: visit.tcm_diagnosis,
            western_diagnosis: visit.western_diagnosis,
            pattern_differentiation: visit.pattern_differentiation,
            treatment_plan: visit.treatment_plan,
        }))
    }
}
