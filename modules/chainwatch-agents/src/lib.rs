pub mod analyst;
pub mod decode;
pub mod gate;

pub use analyst::{AnalysisInput, Analyst, Assessment, LlmAnalyst};
pub use decode::{decode_assessment, DecodeError};
pub use gate::{Gate, LlmGate};
