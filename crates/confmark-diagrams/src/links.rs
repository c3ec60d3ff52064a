//! Service URLs built from transport tokens.
//!
//! Given the same token, the rendering service returns a stable image and the
//! editors accept a deep link for manual editing. Tokens come from
//! [`codec::encode`](crate::codec::encode); the image URL for a diagram
//! therefore decodes back to the original source.

/// Mermaid rendering-service URL for a PNG of the encoded diagram.
#[must_use]
pub fn mermaid_image_url(token: &str) -> String {
    format!("https://mermaid.ink/img/pako:{token}?type=png")
}

/// Mermaid live editor deep link for the encoded diagram.
#[must_use]
pub fn mermaid_editor_url(token: &str) -> String {
    format!("https://mermaid.live/edit#pako:{token}")
}

/// diagrams.net editor deep link for the encoded diagram.
#[must_use]
pub fn drawio_editor_url(token: &str) -> String {
    format!("https://app.diagrams.net/#R{token}")
}
