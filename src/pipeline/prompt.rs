//! Request assembly: one [`ImageDocument`] → one [`ExtractionRequest`].
//!
//! Pure and synchronous; the request is a plain value that any
//! [`crate::client::ModelClient`] can serialise for its own wire format.

use crate::pipeline::encode::ImageDocument;
use crate::prompts::{DEFAULT_INSTRUCTION, DEFAULT_SYSTEM_ROLE};

/// A single multimodal request: system role, instruction and one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    system_role: String,
    instruction: String,
    payload: String,
    media_type: &'static str,
}

impl ExtractionRequest {
    pub fn system_role(&self) -> &str {
        &self.system_role
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Base64 image payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// `data:<media type>;base64,<payload>` as accepted by `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.payload)
    }
}

/// Build a request with the default prompts.
pub fn assemble(document: &ImageDocument) -> ExtractionRequest {
    assemble_with(document, None, None)
}

/// Build a request, replacing the system role and/or instruction when given.
pub fn assemble_with(
    document: &ImageDocument,
    system_role: Option<&str>,
    instruction: Option<&str>,
) -> ExtractionRequest {
    assemble_payload(
        document.payload(),
        document.media_type(),
        system_role,
        instruction,
    )
}

/// Build a request from an already-encoded payload.
pub fn assemble_payload(
    payload: &str,
    media_type: &'static str,
    system_role: Option<&str>,
    instruction: Option<&str>,
) -> ExtractionRequest {
    ExtractionRequest {
        system_role: system_role.unwrap_or(DEFAULT_SYSTEM_ROLE).to_string(),
        instruction: instruction.unwrap_or(DEFAULT_INSTRUCTION).to_string(),
        payload: payload.to_string(),
        media_type,
    }
}
