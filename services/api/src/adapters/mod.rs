pub mod db;
pub mod structuring_llm;

pub use db::DbAdapter;
pub use structuring_llm::OpenAiStructuringAdapter;
