//! Compress stage: shrink local raster images before upload
//!
//! Skipped entirely when disabled in options. Network references carry no
//! local bytes, so they pass through untouched. Re-encoding happens in
//! memory; a result that fails to decode or does not shrink keeps the
//! original bytes.

use async_trait::async_trait;
use tracing::debug;

use super::{Handler, PipelineContext, Signal};

pub struct CompressHandler;

#[async_trait]
impl Handler for CompressHandler {
    fn name(&self) -> &'static str {
        "compress"
    }

    async fn handle(&self, ctx: &mut PipelineContext) -> Signal {
        if !ctx.options.compress {
            return Signal::Continue;
        }
        let quality = ctx.options.compress_quality.clamp(1, 100);
        for (name, file) in ctx.files.iter_mut() {
            if let Some(smaller) = recompress(&file.bytes, name, quality) {
                debug!(
                    image = %name,
                    before = file.bytes.len(),
                    after = smaller.len(),
                    "recompressed"
                );
                file.bytes = smaller;
            }
        }
        Signal::Continue
    }
}

/// Re-encode raster bytes; `None` when the format is not handled, decoding
/// fails, or the result would not shrink.
fn recompress(bytes: &[u8], name: &str, quality: u8) -> Option<Vec<u8>> {
    let extension = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    let decoded = image::load_from_memory(bytes).ok()?;
    let mut out = Vec::new();
    match extension.as_str() {
        "jpg" | "jpeg" => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            decoded.write_with_encoder(encoder).ok()?;
        }
        "png" => {
            decoded
                .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
                .ok()?;
        }
        _ => return None,
    }
    (out.len() < bytes.len()).then_some(out)
}
