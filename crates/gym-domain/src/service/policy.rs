//! 纯业务规则
//!
//! 不依赖数据库的校验与计算，服务层和仓储层共用

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{Rng, distr::Alphanumeric};
use regex::Regex;

use crate::error::{GymError, Result};
use crate::models::{Actor, Role};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 100;
pub const MAX_ACTIVITY_HOURS: i64 = 24;
pub const MAX_REPEAT_WEEKS: u32 = 52;
pub const MAX_QUOTA_COST: i32 = 100;
pub const MAX_MANUAL_ADJUST: i32 = 10_000;
pub const MAX_SUMMARY_DAYS: i64 = 366;
pub const QR_CODE_LEN: usize = 24;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9-]{3,50}$").unwrap());

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

pub fn validate_slug(slug: &str) -> Result<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(GymError::Validation(format!(
            "健身房标识只能包含小写字母、数字和连字符，长度 3-50: {}",
            slug
        )))
    }
}

pub fn validate_currency(currency: &str) -> Result<()> {
    if CURRENCY_RE.is_match(currency) {
        Ok(())
    } else {
        Err(GymError::Validation(format!(
            "货币代码必须为 3 位大写字母: {}",
            currency
        )))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(GymError::Validation(format!(
            "密码长度必须在 {}-{} 之间",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        )))
    }
}

/// 必填文本：去除首尾空白后长度在 1..=max 之间
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > max {
        return Err(GymError::Validation(format!(
            "{}长度必须在 1-{} 之间",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// 可选文本：去空白后为空视为未填写
pub fn optional_text(field: &str, value: Option<String>, max: usize) -> Result<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(GymError::Validation(format!("{}不能超过 {} 个字符", field, max)));
    }
    Ok(Some(trimmed.to_string()))
}

/// 邮箱统一去空白并转小写存储
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 活动时间：开始早于结束，时长不超过 24 小时
pub fn validate_schedule(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if starts_at >= ends_at {
        return Err(GymError::Validation("开始时间必须早于结束时间".to_string()));
    }
    if ends_at - starts_at > Duration::hours(MAX_ACTIVITY_HOURS) {
        return Err(GymError::Validation(format!(
            "活动时长不能超过 {} 小时",
            MAX_ACTIVITY_HOURS
        )));
    }
    Ok(())
}

pub fn validate_capacity(capacity: Option<i32>) -> Result<()> {
    match capacity {
        Some(c) if c < 1 => Err(GymError::Validation("容量至少为 1".to_string())),
        _ => Ok(()),
    }
}

pub fn validate_quota_cost(cost: i32) -> Result<()> {
    if (0..=MAX_QUOTA_COST).contains(&cost) {
        Ok(())
    } else {
        Err(GymError::Validation(format!(
            "额度消耗必须在 0-{} 之间",
            MAX_QUOTA_COST
        )))
    }
}

/// 按周展开重复活动，第一项即原始时间
pub fn weekly_occurrences(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    repeat_weeks: u32,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    if !(1..=MAX_REPEAT_WEEKS).contains(&repeat_weeks) {
        return Err(GymError::Validation(format!(
            "重复周数必须在 1-{} 之间",
            MAX_REPEAT_WEEKS
        )));
    }
    Ok((0..repeat_weeks as i64)
        .map(|week| {
            let offset = Duration::weeks(week);
            (starts_at + offset, ends_at + offset)
        })
        .collect())
}

/// 取消预约时是否退款
///
/// 会员只能在活动开始前自行取消，开始前取消全额退款；
/// 管理员任何时候取消都退款；教练在开始后取消不退款
pub fn cancellation_refund(
    role: Role,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let before_start = now < starts_at;
    match role {
        Role::Admin => Ok(true),
        Role::Trainer => Ok(before_start),
        Role::Member | Role::PendingMember => {
            if before_start {
                Ok(true)
            } else {
                Err(GymError::CancellationClosed)
            }
        }
    }
}

/// 确定预约或扫码的目标会员
///
/// 未指定或指定本人时为本人；代他人操作需要员工身份
pub fn resolve_member_target(actor: &Actor, member_id: Option<i64>) -> Result<i64> {
    match member_id {
        None => Ok(actor.account_id),
        Some(id) if id == actor.account_id => Ok(id),
        Some(id) if actor.is_staff() => Ok(id),
        Some(_) => Err(GymError::Forbidden("只能为自己操作".to_string())),
    }
}

/// 签到窗口：开始前 `open_minutes` 分钟到结束时间
pub fn check_in_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
    open_minutes: i64,
) -> Result<()> {
    let opens_at = starts_at - Duration::minutes(open_minutes);
    if now >= opens_at && now <= ends_at {
        Ok(())
    } else {
        Err(GymError::CheckInClosed)
    }
}

/// 手动调整额度的变动量校验
pub fn validate_adjust_delta(delta: i32) -> Result<()> {
    if delta == 0 {
        return Err(GymError::Validation("调整额度不能为 0".to_string()));
    }
    if delta.abs() > MAX_MANUAL_ADJUST {
        return Err(GymError::Validation(format!(
            "单次调整额度不能超过 {}",
            MAX_MANUAL_ADJUST
        )));
    }
    Ok(())
}

/// 计算变动后的余额，结果为负时返回额度不足
pub fn next_balance(current: i32, delta: i32) -> Result<i32> {
    let next = current.saturating_add(delta);
    if next < 0 {
        Err(GymError::InsufficientQuota {
            required: -delta,
            available: current,
        })
    } else {
        Ok(next)
    }
}

pub fn validate_summary_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(GymError::Validation("开始日期不能晚于结束日期".to_string()));
    }
    if (to - from).num_days() > MAX_SUMMARY_DAYS {
        return Err(GymError::Validation(format!(
            "统计区间不能超过 {} 天",
            MAX_SUMMARY_DAYS
        )));
    }
    Ok(())
}

/// 生成二维码内容：24 位随机字母数字
pub fn generate_qr_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(QR_CODE_LEN)
        .map(char::from)
        .collect()
}
