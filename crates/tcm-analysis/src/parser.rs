//! AI响应解析
//!
//! 模型输出不可信，解析永远不会失败。按三级回退处理:
//!
//! 1. 外层响应不是JSON，或取不到 `choices[0].message.content` 字符串: 整个响应原文作为处方组成保存。
//! 2. 内容 (去掉Markdown代码块标记后) 是JSON对象: 逐个字段读取，缺失或为空的字段记为 `未提供`。
//! 3. 内容不是JSON对象: 内容原文作为处方组成保存。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const NOT_PROVIDED: &str = "未提供";
pub const AI_ANALYSIS_RESULT: &str = "AI分析结果";
pub const AI_RECOMMENDED_PRESCRIPTION: &str = "AI推荐方剂";

const KEY_DISEASE_NAME: &str = "中医病名";
const KEY_PATTERN_REASONING: &str = "证型推理";
const KEY_TREATMENT_METHOD: &str = "治则治法";
const KEY_CLINICAL_MANIFESTATION: &str = "临床表现";
const KEY_WESTERN_DIAGNOSIS: &str = "西医诊断";
const KEY_FINAL_RESULT: &str = "最终结果";
const KEY_PRESCRIPTION_NAME: &str = "处方名称";
const KEY_PRESCRIPTION_COMPOSITION: &str = "处方组成";

/// 结果由哪一级解析得到
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    #[default]
    Structured,
    ContentAsText,
    EnvelopeAsText,
}

/// 处方建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    #[serde(rename = "处方名称")]
    pub prescription_name: String,
    #[serde(rename = "处方组成")]
    pub prescription_composition: String,
}

/// 解析后的诊断结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    #[serde(rename = "中医病名")]
    pub tcm_disease_name: String,
    #[serde(rename = "证型推理")]
    pub pattern_reasoning: String,
    #[serde(rename = "治则治法")]
    pub treatment_method: String,
    #[serde(rename = "临床表现")]
    pub clinical_manifestation: String,
    #[serde(rename = "西医诊断")]
    pub western_diagnosis: String,
    #[serde(rename = "最终结果")]
    pub final_result: FinalResult,
    #[serde(skip)]
    pub tier: ParseTier,
}

impl DiagnosisResult {
    /// 无法结构化解析时的结果，原文保存在处方组成中
    fn unstructured(raw_text: &str, tier: ParseTier) -> Self {
        Self {
            tcm_disease_name: AI_ANALYSIS_RESULT.to_string(),
            pattern_reasoning: AI_ANALYSIS_RESULT.to_string(),
            treatment_method: AI_ANALYSIS_RESULT.to_string(),
            clinical_manifestation: AI_ANALYSIS_RESULT.to_string(),
            western_diagnosis: AI_ANALYSIS_RESULT.to_string(),
            final_result: FinalResult {
                prescription_name: AI_RECOMMENDED_PRESCRIPTION.to_string(),
                prescription_composition: raw_text.to_string(),
            },
            tier,
        }
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        // 部分模型会把处方字段直接放在顶层
        let prescription = object
            .get(KEY_FINAL_RESULT)
            .and_then(Value::as_object)
            .unwrap_or(object);

        Self {
            tcm_disease_name: text_field(object, KEY_DISEASE_NAME),
            pattern_reasoning: text_field(object, KEY_PATTERN_REASONING),
            treatment_method: text_field(object, KEY_TREATMENT_METHOD),
            clinical_manifestation: text_field(object, KEY_CLINICAL_MANIFESTATION),
            western_diagnosis: text_field(object, KEY_WESTERN_DIAGNOSIS),
            final_result: FinalResult {
                prescription_name: text_field(prescription, KEY_PRESCRIPTION_NAME),
                prescription_composition: text_field(prescription, KEY_PRESCRIPTION_COMPOSITION),
            },
            tier: ParseTier::Structured,
        }
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or(NOT_PROVIDED)
        .to_string()
}

/// 解析模型服务返回的原始响应
pub fn parse_model_response(raw: &str) -> DiagnosisResult {
    let Some(content) = extract_content(raw) else {
        warn!("Model response envelope is not a chat completion, keeping raw text");
        return DiagnosisResult::unstructured(raw, ParseTier::EnvelopeAsText);
    };

    match content_object(&content) {
        Some(object) => {
            debug!("Parsed structured model content with {} keys", object.len());
            DiagnosisResult::from_object(&object)
        }
        None => {
            warn!("Model content is not a JSON object, keeping content as text");
            DiagnosisResult::unstructured(&content, ParseTier::ContentAsText)
        }
    }
}

/// 取出 `choices[0].message.content`
pub fn extract_content(raw: &str) -> Option<String> {
    let envelope: Value = serde_json::from_str(raw).ok()?;
    envelope
        .get("choices")?
        .as_array()?
        .first()?
        .pointer("/message/content")?
        .as_str()
        .map(str::to_string)
}

/// 内容解析为JSON对象，不是对象时返回 `None`
pub fn content_object(content: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(strip_code_fence(content)) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// 去掉包裹内容的Markdown代码块标记
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // 语言标签不区分大小写，如 json、JSON
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "model": "qwen3-8b-union",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    #[test]
    fn test_single_key_content() {
        let result = parse_model_response(&envelope(r#"{"中医病名":"感冒"}"#));

        assert_eq!(result.tier, ParseTier::Structured);
        assert_eq!(result.tcm_disease_name, "感冒");
        assert_eq!(result.pattern_reasoning, NOT_PROVIDED);
        assert_eq!(result.treatment_method, NOT_PROVIDED);
        assert_eq!(result.clinical_manifestation, NOT_PROVIDED);
        assert_eq!(result.western_diagnosis, NOT_PROVIDED);
        assert_eq!(result.final_result.prescription_name, NOT_PROVIDED);
        assert_eq!(result.final_result.prescription_composition, NOT_PROVIDED);
    }

    #[test]
    fn test_full_content() {
        let content = json!({
            "中医病名": "感冒",
            "证型推理": "风寒束表证",
            "治则治法": "疏风散寒，宣肺解表",
            "临床表现": "恶寒重，发热轻",
            "西医诊断": "上呼吸道感染",
            "最终结果": {"处方名称": "荆防败毒散加减", "处方组成": "荆芥10g，防风10g"}
        })
        .to_string();

        let result = parse_model_response(&envelope(&content));
        assert_eq!(result.pattern_reasoning, "风寒束表证");
        assert_eq!(result.western_diagnosis, "上呼吸道感染");
        assert_eq!(result.final_result.prescription_name, "荆防败毒散加减");
        assert_eq!(result.final_result.prescription_composition, "荆芥10g，防风10g");
    }

    #[test]
    fn test_missing_key_isolated() {
        let content = json!({
            "中医病名": "咳嗽",
            "证型推理": "风热犯肺",
            "治则治法": "疏风清热",
            "西医诊断": "支气管炎"
        })
        .to_string();

        let result = parse_model_response(&envelope(&content));
        assert_eq!(result.tcm_disease_name, "咳嗽");
        assert_eq!(result.pattern_reasoning, "风热犯肺");
        assert_eq!(result.treatment_method, "疏风清热");
        assert_eq!(result.western_diagnosis, "支气管炎");
        assert_eq!(result.clinical_manifestation, NOT_PROVIDED);
    }

    #[test]
    fn test_empty_and_non_string_values() {
        let content = json!({"中医病名": "", "证型推理": 3, "治则治法": null}).to_string();
        let result = parse_model_response(&envelope(&content));

        assert_eq!(result.tcm_disease_name, NOT_PROVIDED);
        assert_eq!(result.pattern_reasoning, NOT_PROVIDED);
        assert_eq!(result.treatment_method, NOT_PROVIDED);
    }

    #[test]
    fn test_top_level_prescription_fallback() {
        let content = json!({"处方名称": "银翘散", "处方组成": "金银花, 连翘"}).to_string();
        let result = parse_model_response(&envelope(&content));

        assert_eq!(result.final_result.prescription_name, "银翘散");
        assert_eq!(result.final_result.prescription_composition, "金银花, 连翘");
    }

    #[test]
    fn test_fenced_content() {
        let content = "```json\n{\"中医病名\": \"不寐\"}\n```";
        let result = parse_model_response(&envelope(content));
        assert_eq!(result.tier, ParseTier::Structured);
        assert_eq!(result.tcm_disease_name, "不寐");

        let content = "```\n{\"中医病名\": \"眩晕\"}\n```";
        assert_eq!(parse_model_response(&envelope(content)).tcm_disease_name, "眩晕");
    }

    #[test]
    fn test_fenced_content_tag_is_case_insensitive() {
        for content in [
            "```JSON\n{\"中医病名\": \"胃痛\"}\n```",
            "```Json\r\n{\"中医病名\": \"胃痛\"}\r\n```\n",
            "```json {\"中医病名\": \"胃痛\"}```",
        ] {
            let result = parse_model_response(&envelope(content));
            assert_eq!(result.tier, ParseTier::Structured);
            assert_eq!(result.tcm_disease_name, "胃痛");
        }
    }

    #[test]
    fn test_plain_text_content_is_preserved() {
        let content = "  建议服用桂枝汤，注意休息。  ";
        let result = parse_model_response(&envelope(content));

        assert_eq!(result.tier, ParseTier::ContentAsText);
        assert_eq!(result.tcm_disease_name, AI_ANALYSIS_RESULT);
        assert_eq!(result.western_diagnosis, AI_ANALYSIS_RESULT);
        assert_eq!(result.final_result.prescription_name, AI_RECOMMENDED_PRESCRIPTION);
        assert_eq!(result.final_result.prescription_composition, content);
    }

    #[test]
    fn test_non_object_json_content() {
        let result = parse_model_response(&envelope("[1, 2, 3]"));
        assert_eq!(result.tier, ParseTier::ContentAsText);
        assert_eq!(result.final_result.prescription_composition, "[1, 2, 3]");
    }

    #[test]
    fn test_malformed_envelope_is_preserved() {
        for raw in [
            "not json at all",
            r#"{"choices": []}"#,
            r#"{"object": "error"}"#,
            r#"{"choices": [{"message": {"content": 42}}]}"#,
        ] {
            let result = parse_model_response(raw);
            assert_eq!(result.tier, ParseTier::EnvelopeAsText);
            assert_eq!(result.tcm_disease_name, AI_ANALYSIS_RESULT);
            assert_eq!(result.pattern_reasoning, AI_ANALYSIS_RESULT);
            assert_eq!(result.treatment_method, AI_ANALYSIS_RESULT);
            assert_eq!(result.clinical_manifestation, AI_ANALYSIS_RESULT);
            assert_eq!(result.final_result.prescription_name, AI_RECOMMENDED_PRESCRIPTION);
            assert_eq!(result.final_result.prescription_composition, raw);
        }
    }

    #[test]
    fn test_result_serializes_with_chinese_keys() {
        let result = parse_model_response(&envelope(r#"{"中医病名":"感冒"}"#));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["中医病名"], "感冒");
        assert_eq!(value["最终结果"]["处方名称"], NOT_PROVIDED);
        assert!(value.get("tier").is_none());
    }
}
