//! 调用上下文与分页

use serde::Serialize;

use super::enums::Role;

/// 当前操作者
///
/// 由 API 层从 JWT Claims 构造，所有查询都以 `gym_id` 做租户隔离
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub account_id: i64,
    pub gym_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(account_id: i64, gym_id: i64, role: Role) -> Self {
        Self {
            account_id,
            gym_id,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// 是否为本人或员工（管理员、教练）
    pub fn is_self_or_staff(&self, account_id: i64) -> bool {
        self.account_id == account_id || self.is_staff()
    }
}

/// 页码上限，保证 `offset` 不会溢出
pub const MAX_PAGE: i64 = 1_000_000;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            page_size: page_size.clamp(1, 100),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// 分页查询结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}
