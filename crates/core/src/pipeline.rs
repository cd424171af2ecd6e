//! 파이프라인 trait — 데몬이 관리하는 장기 실행 구성 요소의 생명주기

use std::future::Future;

use crate::error::LogcuratorError;

/// 구성 요소 상태 점검 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 시작/정지/상태 점검 생명주기를 가진 구성 요소
///
/// `logcurator-daemon`은 이 trait을 통해 스트리머를 구동하고 종료합니다.
pub trait Pipeline: Send {
    /// 구성 요소를 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogcuratorError>> + Send;

    /// 구성 요소를 정지합니다. 실행 중이 아니면 에러를 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogcuratorError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
