use base64::Engine as _;

use crate::errors::ScreenLoopResult;

/// A screenshot of the surface, as captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub image_bytes: Vec<u8>,
    pub mime_type: String,
}

impl Observation {
    /// Wraps captured bytes, sniffing the format. Unknown formats are labelled PNG,
    /// which is what every backend asks for.
    pub fn new(image_bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&image_bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "image/png".to_string());
        Self { image_bytes, mime_type }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.image_bytes)
    }

    /// Self-describing payload for the model: `data:<mime>;base64,<bytes>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Reads width/height from the image header without decoding pixels.
    pub fn dimensions(&self) -> ScreenLoopResult<(u32, u32)> {
        let reader = image::ImageReader::new(std::io::Cursor::new(&self.image_bytes))
            .with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    pub fn len(&self) -> usize {
        self.image_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_bytes.is_empty()
    }
}
