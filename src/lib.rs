//! paperchat: ask questions about an uploaded PDF.
//!
//! A small HTTP service. POST /upload takes a PDF, extracts its text, and
//! keeps it in memory (one document at a time). POST /ask forwards a
//! question about that text to the Gemini API and relays the answer.

pub mod document;
pub mod gemini;
pub mod pdf_text;
pub mod server;
pub mod settings;
