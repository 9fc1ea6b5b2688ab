//! Property-based tests for rendering and token lookup.
//!
//! - Rendering is deterministic for a fixed model and settings
//! - Every declared value resolves back from its own token
//! - Distinct texts never share a token
//! - The engine flag string is a pure function of the settings
