use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::svg;

use crate::domain::repository::QrRenderer;
use crate::error::MfaServiceError;

/// Renders otpauth payloads as SVG, base64-wrapped into a data URL that
/// clients can drop straight into an `<img>` tag.
#[derive(Clone)]
pub struct SvgQrRenderer;

impl QrRenderer for SvgQrRenderer {
    fn render_data_url(&self, payload: &str) -> Result<String, MfaServiceError> {
        let code =
            QrCode::new(payload.as_bytes()).map_err(|_| MfaServiceError::QrGenerationFailed)?;
        let image = code
            .render()
            .min_dimensions(240, 240)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();
        Ok(format!(
            "data:image/svg+xml;base64,{}",
            STANDARD.encode(image)
        ))
    }
}
