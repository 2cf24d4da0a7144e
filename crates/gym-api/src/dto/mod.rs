//! DTO 模块
//!
//! 包含所有请求和响应的数据传输对象

pub mod request;
pub mod response;

// 重新导出常用类型
pub use request::{
    AccountQuery, ActivityQuery, AdjustQuotaRequest, AttendanceQuery, AttendanceStatusQuery,
    BookRequest, ChangePasswordRequest, CreateAccountRequest, CreateActivityRequest,
    CreateQrCodeRequest, CreateRecordRequest, LoginRequest, OperationLogQuery, PaginationParams,
    QrCodeQuery, RecordQuery, RegisterGymRequest, ResetPasswordRequest, ScanRequest,
    SetAccountStatusRequest, SetQrCodeStatusRequest, SignupRequest, SummaryQuery,
    UpdateAccountRequest, UpdateActivityRequest, UpdateGymRequest, UpdateRecordRequest,
};

pub use response::{
    ApiResponse, CurrentAccountResponse, DeletedResponse, LoginResponse, PageResponse,
    TokenResponse,
};
