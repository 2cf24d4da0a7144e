//! 二维码与扫码记录实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::QrCodeKind;
use crate::error::{GymError, Result};

/// 二维码
///
/// `code` 即二维码内容，图片由客户端渲染
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: i64,
    pub gym_id: i64,
    pub code: String,
    pub label: String,
    pub kind: QrCodeKind,
    /// 每次扫码变动的额度
    pub quota_amount: i32,
    /// 充值码对应的售价（分）
    #[sqlx(default)]
    pub price_cents: Option<i64>,
    #[sqlx(default)]
    pub max_uses: Option<i32>,
    pub uses_count: i32,
    #[sqlx(default)]
    pub per_member_limit: Option<i32>,
    #[sqlx(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QrCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.uses_count >= max)
    }

    /// 按顺序校验二维码当前是否可被该会员扫描
    ///
    /// 额度是否充足由额度条件更新负责，这里只检查二维码本身的限制
    pub fn check_scannable(&self, member_scans: i64, now: DateTime<Utc>) -> Result<()> {
        if !self.active {
            return Err(GymError::QrCodeInactive);
        }
        if self.is_expired(now) {
            return Err(GymError::QrCodeExpired);
        }
        if self.is_exhausted() {
            return Err(GymError::QrCodeExhausted);
        }
        if let Some(limit) = self.per_member_limit {
            if member_scans >= limit as i64 {
                return Err(GymError::QrCodeLimitReached);
            }
        }
        Ok(())
    }

    /// 扫码对扫码人额度的带符号影响
    pub fn quota_delta(&self) -> i32 {
        match self.kind {
            QrCodeKind::Purchase => -self.quota_amount,
            QrCodeKind::TopUp => self.quota_amount,
        }
    }
}

/// 扫码记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QrScan {
    pub id: i64,
    pub gym_id: i64,
    pub qr_code_id: i64,
    pub member_id: i64,
    pub quota_delta: i32,
    pub balance_after: i32,
    #[sqlx(default)]
    pub idempotency_key: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// 扫码结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub scan: QrScan,
    pub kind: QrCodeKind,
    pub label: String,
    /// 幂等重放时为 true，本次请求未产生新的变动
    pub replayed: bool,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn qr_code(id: i64, kind: QrCodeKind) -> QrCode {
        let now = Utc::now();
        QrCode {
            id,
            gym_id: 1,
            code: "ABCDEFGHIJKLMNOPQRSTUVWX".to_string(),
            label: "Protein shake".to_string(),
            kind,
            quota_amount: 2,
            price_cents: None,
            max_uses: None,
            uses_count: 0,
            per_member_limit: None,
            expires_at: None,
            active: true,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
