pub mod bedrock;
pub mod scripted;

pub use bedrock::{BedrockModel, BedrockModelFactory};
pub use scripted::ScriptedModel;
