//! AI模型网关
//!
//! 构造OpenAI兼容的对话请求，并通过 `ModelGateway` 发送到模型服务。
//! 网关只负责取回原始响应文本，响应结构的校验由解析器完成。

use crate::assembler::{IntegratedDocument, PatientInfo, UNKNOWN};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tcm_core::{Result, TcmError};
use tracing::{debug, error, info};

pub const DEFAULT_MODEL: &str = "qwen3-8b-union";
pub const SELF_DIAGNOSIS_PATIENT: &str = "自诊患者";

const SYSTEM_PROMPT: &str = "你是一个专业的中医诊断助手。请根据患者信息、临床表现等数据，提供中医诊断、证型分析、治则治法和处方建议。\
输出格式必须为标准JSON格式的中医诊断数据，包含以下字段：中医病名、证型推理、治则治法、最终结果（包含处方名称和处方组成）。\
请确保返回的JSON格式正确且完整。";

const USER_PROMPT_SUFFIX: &str = "请根据以上信息提供中医诊断：包括中医病名、证型推理、治则治法，以及最终的处方建议。";

/// 对话消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// OpenAI兼容的对话补全请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// 模型服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    /// 服务根地址，不含 `/v1/chat/completions`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7578".to_string(),
            api_key: "EMPTY".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// 由整合文档构造对话请求
pub fn build_request(document: &IntegratedDocument, settings: &GatewaySettings) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt(document)),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

fn user_prompt(document: &IntegratedDocument) -> String {
    // 自诊场景下没有关联患者
    let patient = document.patient_info.clone().unwrap_or_else(|| PatientInfo {
        name: SELF_DIAGNOSIS_PATIENT.to_string(),
        gender: UNKNOWN.to_string(),
        age: UNKNOWN.to_string(),
    });
    let clinical = &document.clinical_info;

    format!(
        "患者信息：姓名: {}, 性别: {}, 年龄: {}. \
         临床表现：主诉: {}, 舌象: {}, 脉象: {}, 西医检查: {}, 西医诊断: {}. {}",
        patient.name,
        patient.gender,
        patient.age,
        clinical.chief_complaint,
        clinical.tongue,
        clinical.pulse,
        clinical.western_examination,
        clinical.western_diagnosis,
        USER_PROMPT_SUFFIX
    )
}

/// 模型网关
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// 发送请求，返回未经处理的响应体
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String>;
}

/// 基于HTTP的模型网关
#[derive(Debug, Clone)]
pub struct HttpModelGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpModelGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TcmError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, settings))
    }

    /// 使用已有的客户端，便于多个组件共享连接池
    pub fn with_client(client: reqwest::Client, settings: &GatewaySettings) -> Self {
        Self {
            client,
            url: completions_url(&settings.endpoint),
            api_key: settings.api_key.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn completions_url(endpoint: &str) -> String {
    format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'))
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
        debug!("Sending chat completion request to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| TcmError::UpstreamUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TcmError::UpstreamUnavailable(format!(
                "model service returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TcmError::UpstreamUnavailable(format!("failed to read response: {}", e)))?;

        String::from_utf8(body.to_vec())
            .map_err(|_| TcmError::UpstreamUnavailable("response body is not valid UTF-8".to_string()))
    }
}

/// 返回固定响应的网关
#[derive(Debug, Clone)]
pub struct StaticGateway {
    body: String,
}

impl StaticGateway {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// 从文件加载固定响应
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let body = tokio::fs::read_to_string(path).await?;
        info!("Loaded fallback model response from {}", path.display());
        Ok(Self::new(body))
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[async_trait]
impl ModelGateway for StaticGateway {
    async fn complete(&self, _request: &ChatCompletionRequest) -> Result<String> {
        Ok(self.body.clone())
    }
}

/// 主网关失败时改用备用网关，不做重试
#[derive(Clone)]
pub struct FallbackGateway {
    primary: Arc<dyn ModelGateway>,
    fallback: Arc<dyn ModelGateway>,
}

impl FallbackGateway {
    pub fn new(primary: Arc<dyn ModelGateway>, fallback: Arc<dyn ModelGateway>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ModelGateway for FallbackGateway {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String> {
        match self.primary.complete(request).await {
            Ok(body) => Ok(body),
            Err(e) => {
                error!("Model service unavailable, using fallback response: {}", e);
                self.fallback.complete(request).await
            }
        }
    }
}
