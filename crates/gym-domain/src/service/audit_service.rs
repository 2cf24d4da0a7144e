//! 操作日志服务

use std::sync::Arc;

use crate::error::{GymError, Result};
use crate::models::{Actor, OperationLog, Page, Pagination};
use crate::repository::{NewOperationLog, OperationLogFilter, OperationLogRepositoryTrait};

pub struct AuditService {
    log_repo: Arc<dyn OperationLogRepositoryTrait>,
}

impl AuditService {
    pub fn new(log_repo: Arc<dyn OperationLogRepositoryTrait>) -> Self {
        Self { log_repo }
    }

    /// 写入一条操作日志，由审计中间件异步调用
    pub async fn record(&self, log: NewOperationLog) -> Result<i64> {
        self.log_repo.create(&log).await
    }

    pub async fn list(
        &self,
        actor: &Actor,
        filter: OperationLogFilter,
        page: Pagination,
    ) -> Result<Page<OperationLog>> {
        if !actor.is_admin() {
            return Err(GymError::Forbidden("只有管理员可以查看操作日志".to_string()));
        }
        self.log_repo.list(actor.gym_id, &filter, page).await
    }
}
