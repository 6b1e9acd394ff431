//! Gzip for response and request bodies.

use tower_http::compression::{CompressionLayer, CompressionLevel};
use tower_http::decompression::RequestDecompressionLayer;

/// Compresses responses with gzip at `level` (1 fastest, 9 smallest) when the
/// client sends `Accept-Encoding: gzip`. Bodies under 32 bytes stay plain.
pub fn layer(level: u32) -> CompressionLayer {
    CompressionLayer::new()
        .gzip(true)
        .quality(CompressionLevel::Precise(level as i32))
}

/// Inflates request bodies sent with `Content-Encoding: gzip`. Any other
/// encoding is answered with `415 Unsupported Media Type`.
pub fn decompression_layer() -> RequestDecompressionLayer {
    RequestDecompressionLayer::new()
        .gzip(true)
}
