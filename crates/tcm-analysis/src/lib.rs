//! # TCM AI分析模块
//!
//! 将一次就诊的数据整合为文档，调用外部大模型服务，解析模型回复并写回就诊记录和处方。
//!
//! 流程: 数据整合 -> 模型调用 -> 响应解析 -> 结果写回，每次运行由状态机跟踪。

pub mod assembler;
pub mod gateway;
pub mod parser;
pub mod service;
pub mod state_machine;
pub mod writer;

pub use assembler::{ClinicalInfo, DataAssembler, IntegratedDocument, PatientInfo, PrescriptionSummary};
pub use gateway::{
    build_request, ChatCompletionRequest, ChatMessage, FallbackGateway, GatewaySettings,
    HttpModelGateway, ModelGateway, StaticGateway,
};
pub use parser::{parse_model_response, DiagnosisResult, FinalResult, ParseTier};
pub use service::{Acknowledgement, AnalysisService, AnalysisTask, RecordedDiagnosis, StoredResult};
pub use state_machine::{AnalysisEvent, AnalysisRun, AnalysisStage, AnalysisStateMachine};
pub use writer::{ResultWriter, WriteOutcome};
