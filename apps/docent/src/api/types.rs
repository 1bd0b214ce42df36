//! Request and response bodies of the HTTP API.

use docent_core::{ChatSession, Document, DocumentKind, Message};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

/// Body of `POST /sessions/{id}/document`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDocumentRequest {
    /// File name shown back to the user.
    pub name: String,
    /// Raw file bytes, standard base64.
    pub content_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub pages: usize,
    pub chars: usize,
}

impl From<&Document> for DocumentInfo {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.to_string(),
            name: doc.name.clone(),
            kind: doc.kind,
            pages: doc.page_count(),
            chars: doc.char_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDocumentResponse {
    #[serde(flatten)]
    pub document: DocumentInfo,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub ok: bool,
    pub turn: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub title: String,
    pub turns: u32,
    pub scope: String,
    pub document: Option<DocumentInfo>,
    pub messages: Vec<Message>,
}

impl From<&ChatSession> for SessionView {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.to_string(),
            title: session.title.clone(),
            turns: session.turns,
            scope: session.composer.scope.name.clone(),
            document: session.document.as_ref().map(DocumentInfo::from),
            messages: session.transcript.messages().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionListEntry {
    pub id: String,
    pub title: String,
    pub turns: u32,
    pub messages: usize,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
