pub mod domain;
pub mod formatter;
pub mod loader;
pub mod ports;
pub mod prompt;
pub mod session;

pub use domain::{
    AnalysisRequest, AnalysisResult, AuditMode, ContractSource, DeliveryOutcome, EmailJob,
    HistoryEntry, Report, ReportSection,
};
pub use ports::{AnalysisService, HistoryStore, MailTransport, PortError, PortResult};
pub use session::{
    ContractUpload, SessionError, SessionOrchestrator, SessionOutcome, SessionStage,
};
