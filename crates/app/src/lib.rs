pub mod app;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod payload;
pub mod rate_limit;
pub mod scheduler;
pub mod services;
pub mod transport;

pub use app::{AppConfig, AppState, DEFAULT_TIMEOUT};
pub use credentials::{TOKEN_ENV, load_token};
pub use error::{AppError, Result};
pub use logging::{LogGuard, init_console_logging, init_logging};
pub use payload::{PayloadTotal, UploadPayload, build_payload};
pub use rate_limit::{RateDecision, UPLOAD_INTERVAL, check_rate_limit};
pub use scheduler::{DEFAULT_WATCH_INTERVAL, DEFAULT_WATCH_JITTER, next_run_delay};
pub use services::{
    AppServices, DaySummary, StatusReport, StatusService, SyncOptions, SyncReport, SyncService,
};
pub use transport::{HttpUploader, RetryPolicy, TransportError, Uploader};
