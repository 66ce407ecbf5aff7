pub mod audit_llm;
pub mod db;
pub mod mailer;

pub use audit_llm::OpenAiCompletionAdapter;
pub use db::SqliteHistoryStore;
pub use mailer::{DisabledMailer, SmtpMailer};
