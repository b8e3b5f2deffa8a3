//! 分析运行状态机
//!
//! 跟踪单次AI分析的阶段: 请求 -> 数据整合 -> 等待模型 -> 解析 -> 写回 -> 完成。
//! 任何未结束的阶段都可以转入失败。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tcm_core::{Result, TcmError};
use tracing::debug;
use uuid::Uuid;

/// 运行阶段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalysisStage {
    Requested,
    Assembling,
    AwaitingModel,
    Parsing,
    Writing,
    Completed,
    Failed,
}

impl AnalysisStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStage::Completed | AnalysisStage::Failed)
    }
}

/// 阶段转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalysisEvent {
    Start,
    DocumentAssembled,
    ResponseReceived,
    ResponseParsed,
    ResultWritten,
    Fail,
}

/// 分析状态机
#[derive(Debug)]
pub struct AnalysisStateMachine {
    transitions: HashMap<(AnalysisStage, AnalysisEvent), AnalysisStage>,
}

impl AnalysisStateMachine {
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((AnalysisStage::Requested, AnalysisEvent::Start), AnalysisStage::Assembling);
        transitions.insert((AnalysisStage::Assembling, AnalysisEvent::DocumentAssembled), AnalysisStage::AwaitingModel);
        transitions.insert((AnalysisStage::AwaitingModel, AnalysisEvent::ResponseReceived), AnalysisStage::Parsing);
        transitions.insert((AnalysisStage::Parsing, AnalysisEvent::ResponseParsed), AnalysisStage::Writing);
        transitions.insert((AnalysisStage::Writing, AnalysisEvent::ResultWritten), AnalysisStage::Completed);

        for stage in Self::get_all_stages() {
            if !stage.is_terminal() {
                transitions.insert((stage, AnalysisEvent::Fail), AnalysisStage::Failed);
            }
        }

        Self { transitions }
    }

    pub fn can_transition(&self, from: AnalysisStage, event: AnalysisEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    pub fn transition(&self, from: AnalysisStage, event: AnalysisEvent) -> Result<AnalysisStage> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| TcmError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            })
    }

    pub fn get_all_stages() -> Vec<AnalysisStage> {
        vec![
            AnalysisStage::Requested,
            AnalysisStage::Assembling,
            AnalysisStage::AwaitingModel,
            AnalysisStage::Parsing,
            AnalysisStage::Writing,
            AnalysisStage::Completed,
            AnalysisStage::Failed,
        ]
    }
}

impl Default for AnalysisStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 单次分析运行
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub visit_id: i64,
    stage: AnalysisStage,
}

impl AnalysisRun {
    pub fn new(visit_id: i64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            visit_id,
            stage: AnalysisStage::Requested,
        }
    }

    pub fn stage(&self) -> AnalysisStage {
        self.stage
    }

    pub fn advance(&mut self, machine: &AnalysisStateMachine, event: AnalysisEvent) -> Result<AnalysisStage> {
        let next = machine.transition(self.stage, event)?;
        debug!("Analysis run {} moved from {:?} to {:?}", self.run_id, self.stage, next);
        self.stage = next;
        Ok(next)
    }
}
