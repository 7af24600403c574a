//! # 导入结果报告

use super::policy::EntityKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// 单个实体的导入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "camelCase")]
pub enum StepOutcome {
    Created,
    Updated,
    /// 子集合被整体替换，携带新建行数
    Replaced(usize),
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    /// 写入的行数
    #[must_use]
    pub const fn rows_touched(&self) -> usize {
        match self {
            Self::Created | Self::Updated => 1,
            Self::Replaced(n) => *n,
            Self::Skipped(_) | Self::Failed(_) => 0,
        }
    }
}

/// 某类实体的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl StepSummary {
    fn record(&mut self, key: &str, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Created => self.created += 1,
            StepOutcome::Updated => self.updated += 1,
            StepOutcome::Replaced(n) => self.replaced += n,
            StepOutcome::Skipped(_) => self.skipped += 1,
            StepOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(format!("{key}: {reason}"));
            }
        }
    }

    #[must_use]
    pub const fn changes(&self) -> usize {
        self.created + self.updated + self.replaced
    }
}

/// 一次导入的完整报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub steps: BTreeMap<EntityKind, StepSummary>,
    /// 实际执行的步骤，按执行顺序
    pub order: Vec<EntityKind>,
}

impl ChangeReport {
    /// 标记某一步开始执行
    pub fn begin(&mut self, kind: EntityKind) {
        self.order.push(kind);
    }

    pub fn record(&mut self, kind: EntityKind, key: &str, outcome: &StepOutcome) {
        self.steps.entry(kind).or_default().record(key, outcome);
    }

    #[must_use]
    pub fn summary(&self, kind: EntityKind) -> StepSummary {
        self.steps.get(&kind).cloned().unwrap_or_default()
    }

    /// 所有实体写入的行数之和
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.steps.values().map(StepSummary::changes).sum()
    }

    /// 全部失败项
    #[must_use]
    pub fn failures(&self) -> Vec<(EntityKind, String)> {
        self.steps
            .iter()
            .flat_map(|(kind, summary)| {
                summary
                    .failures
                    .iter()
                    .map(move |reason| (*kind, reason.clone()))
            })
            .collect()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.steps.values().any(|s| s.failed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_aggregates_outcomes() {
        let mut report = ChangeReport::default();
        report.record(EntityKind::Domain, "a.com", &StepOutcome::Created);
        report.record(EntityKind::Domain, "b.com", &StepOutcome::Skipped("unchanged".into()));
        report.record(EntityKind::Upstream, "a.com", &StepOutcome::Replaced(3));
        report.record(EntityKind::AclRule, "block", &StepOutcome::Failed("disk full".into()));

        assert_eq!(report.total_changes(), 4);
        assert_eq!(report.summary(EntityKind::Domain).skipped, 1);
        assert_eq!(
            report.failures(),
            vec![(EntityKind::AclRule, "block: disk full".to_string())]
        );
        assert!(report.has_failures());
    }

    #[test]
    fn test_report_serializes_kind_keys() {
        let mut report = ChangeReport::default();
        report.record(EntityKind::SslCertificate, "a.com", &StepOutcome::Updated);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["steps"]["sslCertificate"]["updated"], 1);
    }
}
