//! 시나리오 러너 -- 독립 시나리오 동시 실행과 결과 집계
//!
//! 시나리오마다 tokio 태스크 하나를 띄우고, 결과는 선언 순서대로 모읍니다.
//! 한 시나리오의 실패(태스크 panic 포함)는 다른 시나리오를 취소하거나 오염시키지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::engine::ProvisioningEngine;
use crate::lifecycle::{LifecycleManager, Scenario};
use crate::query::CloudQuery;
use crate::result::{RunReport, ScenarioResult};

/// 동시 시나리오 러너
pub struct ScenarioRunner<E: ProvisioningEngine, Q: CloudQuery> {
    manager: Arc<LifecycleManager<E, Q>>,
    /// 동시에 실행할 최대 시나리오 수 (0 = 제한 없음)
    max_parallel: usize,
}

impl<E: ProvisioningEngine, Q: CloudQuery> ScenarioRunner<E, Q> {
    /// 새 러너를 생성합니다.
    pub fn new(manager: LifecycleManager<E, Q>) -> Self {
        Self {
            manager: Arc::new(manager),
            max_parallel: 0,
        }
    }

    /// 동시 실행 수를 제한합니다. 0이면 제한 없음.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// 라이프사이클 매니저
    pub fn manager(&self) -> &LifecycleManager<E, Q> {
        &self.manager
    }

    /// 모든 시나리오를 동시에 실행하고 선언 순서대로 결과를 반환합니다.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> RunReport {
        let started = Instant::now();
        let total = scenarios.len();
        let limit = (self.max_parallel > 0).then(|| Arc::new(Semaphore::new(self.max_parallel)));

        info!(
            scenarios = total,
            max_parallel = self.max_parallel,
            "starting scenario run"
        );

        let names: Vec<String> = scenarios.iter().map(|s| s.name().to_owned()).collect();
        let mut tasks = JoinSet::new();
        let mut index_of = HashMap::with_capacity(total);

        for (index, scenario) in scenarios.into_iter().enumerate() {
            let manager = Arc::clone(&self.manager);
            let limit = limit.clone();
            let handle = tasks.spawn(async move {
                // 세마포어는 닫히지 않으므로 실패하지 않음
                let _permit = match limit {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                manager.run(scenario).await
            });
            index_of.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<ScenarioResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&index) = index_of.get(&id) {
                        slots[index] = Some(result);
                    }
                }
                Err(join_err) => {
                    let Some(&index) = index_of.get(&join_err.id()) else {
                        continue;
                    };
                    let reason = if join_err.is_panic() {
                        "scenario task panicked".to_owned()
                    } else {
                        "scenario task cancelled".to_owned()
                    };
                    error!(
                        scenario = names[index].as_str(),
                        reason = reason.as_str(),
                        "scenario task lost, teardown state unknown"
                    );
                    slots[index] = Some(ScenarioResult::lost(names[index].clone(), reason));
                }
            }
        }

        let results: Vec<ScenarioResult> = slots
            .into_iter()
            .zip(names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| ScenarioResult::lost(name, "scenario task never reported"))
            })
            .collect();

        let report = RunReport {
            results,
            duration: started.elapsed(),
        };
        info!(
            passed = report.passed(),
            failed = report.failed(),
            leaked = report.leaked().count(),
            "scenario run finished"
        );
        report
    }
}
