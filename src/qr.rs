//! Pairing QR rendering.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Render a pairing QR payload as a `data:image/svg+xml` URL suitable for
/// dropping straight into an `<img src>` attribute.
pub fn svg_data_url(payload: &str) -> Result<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        anyhow::bail!("QR payload is empty");
    }

    let code = qrcode::QrCode::new(payload.as_bytes())
        .map_err(|err| anyhow!("failed to encode QR payload: {err}"))?;

    let svg = code
        .render::<qrcode::render::svg::Color>()
        .quiet_zone(true)
        .min_dimensions(256, 256)
        .build();

    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(svg.as_bytes())
    ))
}

/// Render a pairing QR payload into terminal-friendly text.
pub fn terminal(payload: &str) -> Result<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        anyhow::bail!("QR payload is empty");
    }

    let code = qrcode::QrCode::new(payload.as_bytes())
        .map_err(|err| anyhow!("failed to encode QR payload: {err}"))?;

    Ok(code
        .render::<qrcode::render::unicode::Dense1x2>()
        .quiet_zone(true)
        .build())
}
