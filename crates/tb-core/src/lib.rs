//! Domain core for tutor-bridge: conversation model, safety filtering,
//! input sanitization, prompt assembly and the ports the server implements.

pub mod domain;
