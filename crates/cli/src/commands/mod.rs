pub mod doctor;
pub mod mcp;
pub mod prompts;
pub mod serve;
pub mod submit;
