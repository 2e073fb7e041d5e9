pub mod db;
pub mod description_llm;
pub mod fcm;
pub mod plantnet;

pub use db::DbAdapter;
pub use description_llm::OpenAiDescriptionAdapter;
pub use fcm::{DisabledPush, FcmAdapter};
pub use plantnet::PlantNetAdapter;
