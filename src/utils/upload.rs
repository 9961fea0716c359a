use base64::{Engine, engine::general_purpose::STANDARD};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// 16 MiB
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Images are kept inline in the `images` table as base64 text.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
