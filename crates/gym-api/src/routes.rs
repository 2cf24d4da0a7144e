//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射和中间件装配顺序

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
};
use tower_http::cors::CorsLayer;

use gym_domain::models::permission;
use gym_shared::observability::middleware as obs_middleware;

use crate::{
    handlers,
    middleware::{
        audit_middleware, auth_middleware, rate_limit_middleware, require_any_permission,
        require_permission, security_headers,
    },
    state::AppState,
};

/// 预约和取消预约：会员为自己，员工代会员
const BOOKING_PERMISSIONS: &[&str] = &[permission::ATTENDANCE_BOOK, permission::ATTENDANCE_MANAGE];

/// 认证路由
///
/// 注册和登录为公开路由，其余需要 Token
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register-gym", post(handlers::auth::register_gym))
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/password", put(handlers::auth::change_password))
}

/// 健身房设置
fn gym_routes() -> Router<AppState> {
    Router::new()
        .route("/gym", get(handlers::gym::get_gym))
        .route(
            "/gym",
            put(handlers::gym::update_gym)
                .layer(from_fn(require_permission(permission::GYM_SETTINGS_WRITE))),
        )
}

/// 账号管理与额度
///
/// 账号详情和额度账本允许本人查看，权限由服务层判断
fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts",
            get(handlers::account::list_accounts)
                .layer(from_fn(require_permission(permission::ACCOUNT_READ))),
        )
        .route(
            "/accounts",
            post(handlers::account::create_account)
                .layer(from_fn(require_permission(permission::ACCOUNT_WRITE))),
        )
        .route("/accounts/{id}", get(handlers::account::get_account))
        .route(
            "/accounts/{id}",
            put(handlers::account::update_account)
                .layer(from_fn(require_permission(permission::ACCOUNT_WRITE))),
        )
        .route(
            "/accounts/{id}",
            delete(handlers::account::delete_account)
                .layer(from_fn(require_permission(permission::ACCOUNT_WRITE))),
        )
        .route(
            "/accounts/{id}/status",
            patch(handlers::account::set_account_status)
                .layer(from_fn(require_permission(permission::ACCOUNT_WRITE))),
        )
        .route(
            "/accounts/{id}/reset-password",
            post(handlers::account::reset_password)
                .layer(from_fn(require_permission(permission::ACCOUNT_WRITE))),
        )
        // 额度
        .route(
            "/accounts/{id}/quota",
            post(handlers::account::adjust_quota)
                .layer(from_fn(require_permission(permission::QUOTA_ADJUST))),
        )
        .route(
            "/accounts/{id}/quota-ledger",
            get(handlers::account::list_quota_ledger),
        )
}

/// 活动与活动下的预约
fn activity_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/activities",
            get(handlers::activity::list_activities)
                .layer(from_fn(require_permission(permission::ACTIVITY_READ))),
        )
        .route(
            "/activities",
            post(handlers::activity::create_activity)
                .layer(from_fn(require_permission(permission::ACTIVITY_WRITE))),
        )
        .route(
            "/activities/{id}",
            get(handlers::activity::get_activity)
                .layer(from_fn(require_permission(permission::ACTIVITY_READ))),
        )
        .route(
            "/activities/{id}",
            put(handlers::activity::update_activity)
                .layer(from_fn(require_permission(permission::ACTIVITY_WRITE))),
        )
        .route(
            "/activities/{id}",
            delete(handlers::activity::delete_activity)
                .layer(from_fn(require_permission(permission::ACTIVITY_WRITE))),
        )
        .route(
            "/activities/{id}/cancel",
            post(handlers::activity::cancel_activity)
                .layer(from_fn(require_permission(permission::ACTIVITY_WRITE))),
        )
        .route(
            "/activities/{id}/attendance",
            get(handlers::attendance::list_activity_attendance)
                .layer(from_fn(require_permission(permission::ATTENDANCE_READ))),
        )
        .route(
            "/activities/{id}/attendance",
            post(handlers::attendance::book_activity)
                .layer(from_fn(require_any_permission(BOOKING_PERMISSIONS))),
        )
}

/// 签到记录
fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/attendance",
            get(handlers::attendance::list_attendance)
                .layer(from_fn(require_permission(permission::ATTENDANCE_READ))),
        )
        .route(
            "/attendance/{id}/cancel",
            post(handlers::attendance::cancel_attendance)
                .layer(from_fn(require_any_permission(BOOKING_PERMISSIONS))),
        )
        .route(
            "/attendance/{id}/check-in",
            post(handlers::attendance::check_in)
                .layer(from_fn(require_permission(permission::ATTENDANCE_MANAGE))),
        )
        .route(
            "/attendance/{id}/absent",
            post(handlers::attendance::mark_absent)
                .layer(from_fn(require_permission(permission::ATTENDANCE_MANAGE))),
        )
}

/// 当前账号自己的数据，所有角色可访问
fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me/attendance", get(handlers::attendance::my_attendance))
        .route("/me/quota-ledger", get(handlers::account::my_quota_ledger))
}

/// 二维码
fn qr_code_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/qr-codes",
            get(handlers::qr_code::list_qr_codes)
                .layer(from_fn(require_permission(permission::QRCODE_READ))),
        )
        .route(
            "/qr-codes",
            post(handlers::qr_code::create_qr_code)
                .layer(from_fn(require_permission(permission::QRCODE_WRITE))),
        )
        .route(
            "/qr-codes/scan",
            post(handlers::qr_code::scan_qr_code)
                .layer(from_fn(require_permission(permission::QRCODE_SCAN))),
        )
        .route(
            "/qr-codes/{id}",
            get(handlers::qr_code::get_qr_code)
                .layer(from_fn(require_permission(permission::QRCODE_READ))),
        )
        .route(
            "/qr-codes/{id}",
            delete(handlers::qr_code::delete_qr_code)
                .layer(from_fn(require_permission(permission::QRCODE_WRITE))),
        )
        .route(
            "/qr-codes/{id}/status",
            patch(handlers::qr_code::set_qr_code_status)
                .layer(from_fn(require_permission(permission::QRCODE_WRITE))),
        )
        .route(
            "/qr-codes/{id}/scans",
            get(handlers::qr_code::list_qr_scans)
                .layer(from_fn(require_permission(permission::QRCODE_READ))),
        )
}

/// 财务记录
fn finance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/finance/records",
            get(handlers::finance::list_records)
                .layer(from_fn(require_permission(permission::FINANCE_READ))),
        )
        .route(
            "/finance/records",
            post(handlers::finance::create_record)
                .layer(from_fn(require_permission(permission::FINANCE_WRITE))),
        )
        .route(
            "/finance/records/{id}",
            get(handlers::finance::get_record)
                .layer(from_fn(require_permission(permission::FINANCE_READ))),
        )
        .route(
            "/finance/records/{id}",
            put(handlers::finance::update_record)
                .layer(from_fn(require_permission(permission::FINANCE_WRITE))),
        )
        .route(
            "/finance/records/{id}",
            delete(handlers::finance::delete_record)
                .layer(from_fn(require_permission(permission::FINANCE_WRITE))),
        )
        .route(
            "/finance/summary",
            get(handlers::finance::summary)
                .layer(from_fn(require_permission(permission::FINANCE_READ))),
        )
}

/// 统计与审计日志
fn report_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/stats/overview",
            get(handlers::stats::overview).layer(from_fn(require_permission(permission::STATS_READ))),
        )
        .route(
            "/operation-logs",
            get(handlers::operation_log::list_operation_logs)
                .layer(from_fn(require_permission(permission::AUDIT_READ))),
        )
}

/// 构建完整的 API 路由
///
/// 不含前缀，由 `build_router` 挂载到 `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(gym_routes())
        .merge(account_routes())
        .merge(activity_routes())
        .merge(attendance_routes())
        .merge(me_routes())
        .merge(qr_code_routes())
        .merge(finance_routes())
        .merge(report_routes())
}

/// 组装应用路由和全局中间件
///
/// 请求经过的顺序（由外到内）：request id → http tracing → 认证 → CORS →
/// 安全头 → 限流 → 审计
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        // 审计位于认证之后，可读取 Claims
        .layer(from_fn_with_state(state.clone(), audit_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn(security_headers))
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn(obs_middleware::http_tracing))
        .layer(from_fn(obs_middleware::request_id))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    use gym_domain::GymError;
    use gym_domain::models::{Account, AccountStatus, Attendance, AttendanceStatus, Gym, Role};
    use gym_domain::password::hash_password;
    use gym_domain::repository::{
        MockAccountRepositoryTrait, MockActivityRepositoryTrait, MockAttendanceRepositoryTrait,
        MockFinanceRepositoryTrait, MockGymRepositoryTrait, MockOperationLogRepositoryTrait,
        MockQrCodeRepositoryTrait, MockQuotaRepositoryTrait, MockStatsRepositoryTrait,
        NewOperationLog,
    };
    use tokio::sync::mpsc;
    use gym_shared::config::AppConfig;

    use crate::state::Repositories;

    const GYM_ID: i64 = 1;

    /// 测试用仓储集合，未设置期望的 mock 被调用时测试失败
    struct TestRepos {
        gyms: MockGymRepositoryTrait,
        accounts: MockAccountRepositoryTrait,
        attendance: MockAttendanceRepositoryTrait,
        operation_logs: MockOperationLogRepositoryTrait,
    }

    impl TestRepos {
        fn new() -> Self {
            let mut operation_logs = MockOperationLogRepositoryTrait::new();
            operation_logs.expect_create().returning(|_| Ok(1));
            Self {
                gyms: MockGymRepositoryTrait::new(),
                accounts: MockAccountRepositoryTrait::new(),
                attendance: MockAttendanceRepositoryTrait::new(),
                operation_logs,
            }
        }

        fn into_state(self) -> AppState {
            let repos = Repositories {
                gyms: Arc::new(self.gyms),
                accounts: Arc::new(self.accounts),
                quota: Arc::new(MockQuotaRepositoryTrait::new()),
                activities: Arc::new(MockActivityRepositoryTrait::new()),
                attendance: Arc::new(self.attendance),
                qr_codes: Arc::new(MockQrCodeRepositoryTrait::new()),
                finance: Arc::new(MockFinanceRepositoryTrait::new()),
                stats: Arc::new(MockStatsRepositoryTrait::new()),
                operation_logs: Arc::new(self.operation_logs),
            };
            AppState::new(repos, &AppConfig::default(), None, None)
        }
    }

    /// 把审计中间件写入的日志转发到 channel，便于断言
    fn audit_channel() -> (
        MockOperationLogRepositoryTrait,
        mpsc::UnboundedReceiver<NewOperationLog>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut operation_logs = MockOperationLogRepositoryTrait::new();
        operation_logs.expect_create().returning(move |log| {
            let _ = tx.send(log.clone());
            Ok(1)
        });
        (operation_logs, rx)
    }

    fn registered(b: &gym_domain::repository::NewBooking) -> Attendance {
        let now = Utc::now();
        Attendance {
            id: 100,
            gym_id: b.gym_id,
            activity_id: b.activity_id,
            member_id: b.member_id,
            status: AttendanceStatus::Registered,
            accessible: true,
            quota_charged: 1,
            booked_by: b.booked_by,
            checked_in_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn app(state: AppState) -> Router {
        build_router(state, CorsLayer::new())
    }

    fn test_gym() -> Gym {
        let now = Utc::now();
        Gym {
            id: GYM_ID,
            name: "Iron Temple".to_string(),
            slug: "iron-temple".to_string(),
            currency: "EUR".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn test_account(id: i64, role: Role) -> Account {
        let now = Utc::now();
        Account {
            id,
            gym_id: GYM_ID,
            email: format!("user{}@example.com", id),
            password_hash: String::new(),
            full_name: format!("User {}", id),
            phone: None,
            role,
            status: AccountStatus::Active,
            quota: 5,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bearer(state: &AppState, account: &Account) -> String {
        let (token, _) = state.jwt_manager.generate_token(account).unwrap();
        format!("Bearer {}", token)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_routes_construction() {
        let _api = api_routes();
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let state = TestRepos::new().into_state();
        let response = app(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "DENY"
        );
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_ready_without_dependencies_is_unavailable() {
        let state = TestRepos::new().into_state();
        let response = app(state)
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["checks"]["database"], "fail");
    }

    #[tokio::test]
    async fn test_missing_token_returns_401() {
        let state = TestRepos::new().into_state();
        let response = app(state)
            .oneshot(Request::get("/api/activities").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_token_returns_401() {
        let state = TestRepos::new().into_state();
        let response = app(state)
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_member_cannot_read_finance() {
        let state = TestRepos::new().into_state();
        let token = bearer(&state, &test_account(5, Role::Member));

        let response = app(state)
            .oneshot(
                Request::get("/api/finance/records")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["code"], "FORBIDDEN");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_pending_member_cannot_book() {
        let state = TestRepos::new().into_state();
        let token = bearer(&state, &test_account(6, Role::PendingMember));

        let response = app(state)
            .oneshot(
                Request::post("/api/activities/10/attendance")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_success_returns_token() {
        let mut repos = TestRepos::new();
        repos
            .gyms
            .expect_get_by_slug()
            .withf(|slug| slug == "iron-temple")
            .returning(|_| Ok(Some(test_gym())));

        let mut account = test_account(1, Role::Admin);
        account.password_hash = hash_password("password123").unwrap();
        repos
            .accounts
            .expect_get_by_email()
            .withf(|gym_id, email| *gym_id == GYM_ID && email == "user1@example.com")
            .returning(move |_, _| Ok(Some(account.clone())));
        repos
            .accounts
            .expect_record_login_success()
            .times(1)
            .returning(|_| Ok(()));

        let state = repos.into_state();
        let jwt = state.jwt_manager.clone();
        let body = serde_json::json!({
            "gymSlug": "iron-temple",
            "email": "User1@Example.com",
            "password": "password123"
        });
        let response = app(state)
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["gym"]["slug"], "iron-temple");
        assert!(json["data"]["account"].get("passwordHash").is_none());

        let token = json["data"]["token"].as_str().unwrap();
        let claims = jwt.verify_token(token).unwrap();
        assert_eq!(claims.sub, "1");
        assert_eq!(claims.gym_id, GYM_ID);
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_login_unknown_gym_returns_401() {
        let mut repos = TestRepos::new();
        repos.gyms.expect_get_by_slug().returning(|_| Ok(None));

        let body = serde_json::json!({
            "gymSlug": "nowhere",
            "email": "a@example.com",
            "password": "password123"
        });
        let response = app(repos.into_state())
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_login_validation_error_returns_400() {
        let state = TestRepos::new().into_state();
        let body = serde_json::json!({
            "gymSlug": "",
            "email": "a@example.com",
            "password": "password123"
        });
        let response = app(state)
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_member_books_activity() {
        let member = test_account(5, Role::Member);
        let mut repos = TestRepos::new();
        let stored = member.clone();
        repos
            .accounts
            .expect_get()
            .withf(|gym_id, id| *gym_id == GYM_ID && *id == 5)
            .returning(move |_, _| Ok(Some(stored.clone())));
        repos
            .attendance
            .expect_book()
            .withf(|b| b.activity_id == 10 && b.member_id == 5 && b.booked_by == 5)
            .times(1)
            .returning(|b| {
                let now = Utc::now();
                Ok(Attendance {
                    id: 100,
                    gym_id: b.gym_id,
                    activity_id: b.activity_id,
                    member_id: b.member_id,
                    status: AttendanceStatus::Registered,
                    accessible: true,
                    quota_charged: 1,
                    booked_by: b.booked_by,
                    checked_in_at: None,
                    cancelled_at: None,
                    created_at: now,
                    updated_at: now,
                })
            });

        let state = repos.into_state();
        let token = bearer(&state, &member);
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/activities/10/attendance")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "registered");
        assert_eq!(json["data"]["quotaCharged"], 1);
    }

    #[tokio::test]
    async fn test_booking_conflicts_map_to_409() {
        let cases = vec![
            (
                GymError::InsufficientQuota {
                    required: 2,
                    available: 1,
                },
                "INSUFFICIENT_QUOTA",
            ),
            (
                GymError::AlreadyBooked {
                    activity_id: 10,
                    member_id: 5,
                },
                "ALREADY_BOOKED",
            ),
            (GymError::ActivityFull(10), "ACTIVITY_FULL"),
        ];

        for (error, code) in cases {
            let member = test_account(5, Role::Member);
            let mut repos = TestRepos::new();
            let stored = member.clone();
            repos
                .accounts
                .expect_get()
                .returning(move |_, _| Ok(Some(stored.clone())));
            let mut error = Some(error);
            repos
                .attendance
                .expect_book()
                .times(1)
                .returning(move |_| Err(error.take().unwrap()));

            let state = repos.into_state();
            let token = bearer(&state, &member);
            let response = app(state)
                .oneshot(
                    Request::post("/api/activities/10/attendance")
                        .header(header::AUTHORIZATION, token)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::CONFLICT, "code {}", code);
            let json = body_json(response).await;
            assert_eq!(json["code"], code);
        }
    }

    #[tokio::test]
    async fn test_booking_unknown_member_returns_404() {
        let trainer = test_account(2, Role::Trainer);
        let mut repos = TestRepos::new();
        repos.accounts.expect_get().returning(|_, _| Ok(None));

        let state = repos.into_state();
        let token = bearer(&state, &trainer);
        let response = app(state)
            .oneshot(
                Request::post("/api/activities/10/attendance")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"memberId": 999}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_with_token() {
        let state = TestRepos::new().into_state();
        let token = bearer(&state, &test_account(5, Role::Member));
        let response = app(state)
            .oneshot(
                Request::post("/api/auth/logout")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_numeric_path_id_returns_json_error() {
        let state = TestRepos::new().into_state();
        let token = bearer(&state, &test_account(5, Role::Member));
        let response = app(state)
            .oneshot(
                Request::post("/api/activities/abc/attendance")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_json_returns_json_error() {
        let state = TestRepos::new().into_state();
        let response = app(state)
            .oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"gymSlug\": "))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_query_returns_json_error() {
        let state = TestRepos::new().into_state();
        let token = bearer(&state, &test_account(5, Role::Member));
        let response = app(state)
            .oneshot(
                Request::get("/api/me/attendance?page=first")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_booking_without_body_is_audited_as_create() {
        let member = test_account(5, Role::Member);
        let mut repos = TestRepos::new();
        let stored = member.clone();
        repos
            .accounts
            .expect_get()
            .returning(move |_, _| Ok(Some(stored.clone())));
        repos
            .attendance
            .expect_book()
            .withf(|b| b.member_id == 5)
            .times(1)
            .returning(|b| Ok(registered(b)));
        let (operation_logs, mut audit_rx) = audit_channel();
        repos.operation_logs = operation_logs;

        let state = repos.into_state();
        let token = bearer(&state, &member);
        let response = app(state)
            .oneshot(
                Request::post("/api/activities/10/attendance")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let log = tokio::time::timeout(std::time::Duration::from_secs(1), audit_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.gym_id, GYM_ID);
        assert_eq!(log.operator_id, 5);
        assert_eq!(log.module, "activities");
        assert_eq!(log.action, "create");
        assert_eq!(log.target_type.as_deref(), Some("activity"));
        assert_eq!(log.target_id.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_failed_write_is_not_audited() {
        let member = test_account(5, Role::Member);
        let mut repos = TestRepos::new();
        let stored = member.clone();
        repos
            .accounts
            .expect_get()
            .returning(move |_, _| Ok(Some(stored.clone())));
        repos
            .attendance
            .expect_book()
            .returning(|_| Err(GymError::ActivityFull(10)));
        let (operation_logs, mut audit_rx) = audit_channel();
        repos.operation_logs = operation_logs;

        let state = repos.into_state();
        let token = bearer(&state, &member);
        let response = app(state)
            .oneshot(
                Request::post("/api/activities/10/attendance")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(audit_rx.try_recv().is_err());
    }
}
