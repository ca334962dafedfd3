use qrcode::render::svg;
use qrcode::QrCode;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),
}

impl From<QrGenerationError> for crate::error::AppError {
    fn from(err: QrGenerationError) -> Self {
        crate::error::AppError::Internal(anyhow::anyhow!(err))
    }
}

/// Renders a voucher code as a scannable SVG.
pub fn voucher_qr_svg(code: &str) -> Result<String, QrGenerationError> {
    let qr = QrCode::new(code.as_bytes())?;
    let svg = qr.render::<svg::Color>().min_dimensions(200, 200).build();
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voucher_qr_svg() {
        let svg = voucher_qr_svg("AB129F8E-X7K2QP").unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }

    #[test]
    fn test_same_code_same_image() {
        assert_eq!(
            voucher_qr_svg("AB129F8E-X7K2QP").unwrap(),
            voucher_qr_svg("AB129F8E-X7K2QP").unwrap()
        );
    }
}
