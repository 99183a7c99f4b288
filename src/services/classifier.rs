//! Gate that lets only images through to the stripper.

use crate::errors::SanitizeError;

const IMAGE_PREFIX: &str = "image/";

/// Accept a declared MIME type iff it names an image.
///
/// Case-sensitive, matching how the store reports content types.
pub fn ensure_image(mime_type: &str) -> Result<(), SanitizeError> {
    if mime_type.starts_with(IMAGE_PREFIX) {
        Ok(())
    } else {
        Err(SanitizeError::NotAnImage {
            mime_type: mime_type.to_string(),
        })
    }
}
