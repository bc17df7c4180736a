//! Stage 1: free-text extraction of a single image.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;

use crate::error::ExtractionError;
use crate::types::{ExtractionResult, ImageRole};
use crate::vision::{ChatModel, ContentPart};

pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

const PACKAGE_PROMPT: &str = "Por favor, extraia todas as informações contidas nesta imagem da caixa. \
Liste todos os detalhes visíveis como textos, números, códigos de barras, etiquetas, endereços, \
dimensões, produtos e qualquer outra informação relevante.";

const INVOICE_PROMPT: &str = "Por favor, extraia todas as informações contidas nesta nota fiscal. \
Liste todos os detalhes visíveis como número da nota, data, produtos, quantidades, valores, \
destinatário, remetente, CNPJ, e qualquer outra informação relevante.";

/// Instruction sent alongside the image for each role.
pub fn instruction(role: ImageRole) -> &'static str {
    match role {
        ImageRole::Package => PACKAGE_PROMPT,
        ImageRole::Invoice => INVOICE_PROMPT,
    }
}

/// A validated image waiting to be described.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    role: ImageRole,
    bytes: Vec<u8>,
    format: ImageFormat,
    source: Option<String>,
}

impl ExtractionRequest {
    pub fn new(bytes: Vec<u8>, role: ImageRole, source: Option<String>) -> Result<Self, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyImage);
        }
        let len = bytes.len() as u64;
        if len > MAX_IMAGE_BYTES {
            return Err(ExtractionError::TooLarge {
                bytes: len,
                limit: MAX_IMAGE_BYTES,
            });
        }
        let format = sniff_format(&bytes)?;
        Ok(Self {
            role,
            bytes,
            format,
            source,
        })
    }

    pub fn from_path(path: impl AsRef<Path>, role: ImageRole) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ExtractionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        Self::new(bytes, role, name)
    }

    /// Same image, relabelled for another pipeline slot.
    pub fn with_role(mut self, role: ImageRole) -> Self {
        self.role = role;
        self
    }

    pub fn role(&self) -> ImageRole {
        self.role
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.to_mime_type(),
            BASE64.encode(&self.bytes)
        )
    }
}

fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, ExtractionError> {
    match image::guess_format(bytes) {
        Ok(
            format @ (ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Gif
            | ImageFormat::Bmp
            | ImageFormat::WebP),
        ) => Ok(format),
        Ok(other) => Err(ExtractionError::UnsupportedFormat(format!("{:?}", other))),
        Err(_) => Err(ExtractionError::UnsupportedFormat(
            "not a PNG, JPEG, GIF, BMP or WebP image".to_string(),
        )),
    }
}

/// Describe one image. The reply is returned verbatim.
pub fn extract<M: ChatModel + ?Sized>(
    model: &M,
    request: &ExtractionRequest,
) -> Result<ExtractionResult, ExtractionError> {
    tracing::info!(
        role = %request.role,
        source = request.source().unwrap_or("<memory>"),
        bytes = request.bytes.len(),
        "Extracting image"
    );
    let raw_text = model.complete(vec![
        ContentPart::Text(instruction(request.role).to_string()),
        ContentPart::ImageDataUrl(request.data_url()),
    ])?;
    Ok(ExtractionResult {
        role: request.role,
        raw_text,
        source: request.source.clone(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_images::{JPEG, PNG};
    use super::*;
    use crate::error::ServiceError;
    use std::cell::RefCell;

    struct Recorder {
        reply: Option<String>,
        seen: RefCell<Vec<Vec<ContentPart>>>,
    }

    impl ChatModel for Recorder {
        fn complete(&self, content: Vec<ContentPart>) -> Result<String, ServiceError> {
            self.seen.borrow_mut().push(content);
            self.reply.clone().ok_or(ServiceError::Timeout)
        }
    }

    #[test]
    fn rejects_empty_image() {
        let err = ExtractionRequest::new(Vec::new(), ImageRole::Package, None).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyImage));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = ExtractionRequest::new(b"%PDF-1.7".to_vec(), ImageRole::Invoice, None).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
    }

    #[test]
    fn rejects_oversized_image() {
        let mut bytes = PNG.to_vec();
        bytes.resize(MAX_IMAGE_BYTES as usize + 1, 0);
        let err = ExtractionRequest::new(bytes, ImageRole::Package, None).unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { .. }));
    }

    #[test]
    fn data_url_uses_sniffed_mime() {
        let req = ExtractionRequest::new(JPEG.to_vec(), ImageRole::Invoice, None).unwrap();
        assert_eq!(req.format(), ImageFormat::Jpeg);
        assert!(req.data_url().starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn with_role_relabels_same_image() {
        let req = ExtractionRequest::new(PNG.to_vec(), ImageRole::Package, Some("a.png".into()))
            .unwrap();
        assert_eq!(req.role(), ImageRole::Package);
        let req = req.with_role(ImageRole::Invoice);
        assert_eq!(req.role(), ImageRole::Invoice);
        assert_eq!(req.source(), Some("a.png"));
        assert_eq!(req.format(), ImageFormat::Png);
    }

    #[test]
    fn from_path_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExtractionRequest::from_path(dir.path().join("nope.png"), ImageRole::Package).unwrap_err();
        match err {
            ExtractionError::Read { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caixa.png");
        std::fs::write(&path, PNG).unwrap();
        let req = ExtractionRequest::from_path(&path, ImageRole::Package).unwrap();
        assert_eq!(req.source(), Some("caixa.png"));
    }

    #[test]
    fn extract_sends_role_prompt_and_image() {
        let model = Recorder {
            reply: Some("Produto A x2".into()),
            seen: RefCell::new(Vec::new()),
        };
        let req = ExtractionRequest::new(PNG.to_vec(), ImageRole::Invoice, Some("nf.png".into())).unwrap();

        let result = extract(&model, &req).unwrap();

        assert_eq!(result.role, ImageRole::Invoice);
        assert_eq!(result.raw_text, "Produto A x2");
        assert_eq!(result.source.as_deref(), Some("nf.png"));
        let seen = model.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0], ContentPart::Text(INVOICE_PROMPT.to_string()));
        match &seen[0][1] {
            ContentPart::ImageDataUrl(url) => assert!(url.starts_with("data:image/png;base64,")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn extract_passes_reply_through_untouched() {
        let model = Recorder {
            reply: Some("  nothing useful here \n".into()),
            seen: RefCell::new(Vec::new()),
        };
        let req = ExtractionRequest::new(PNG.to_vec(), ImageRole::Package, None).unwrap();
        assert_eq!(extract(&model, &req).unwrap().raw_text, "  nothing useful here \n");
    }

    #[test]
    fn extract_surfaces_service_error() {
        let model = Recorder {
            reply: None,
            seen: RefCell::new(Vec::new()),
        };
        let req = ExtractionRequest::new(PNG.to_vec(), ImageRole::Package, None).unwrap();
        let err = extract(&model, &req).unwrap_err();
        assert!(matches!(err, ExtractionError::Service(ServiceError::Timeout)));
        assert_eq!(model.seen.borrow().len(), 1);
    }

    #[test]
    fn prompts_differ_by_role() {
        assert_ne!(instruction(ImageRole::Package), instruction(ImageRole::Invoice));
        assert!(instruction(ImageRole::Invoice).contains("nota fiscal"));
    }
}
