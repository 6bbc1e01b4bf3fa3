use image::Rgba;
use photoedit_contracts::EditorResult;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{EditRequest, EditResponse, ImageEditProvider};
use crate::raster::map_image_error;
use crate::render::encode_png;

/// Offline stand-in for a remote model. Tints the submitted image towards a
/// colour derived from the instruction, so the same request always yields the
/// same pixels.
pub struct DryrunProvider;

impl ImageEditProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn edit(&self, request: &EditRequest) -> EditorResult<EditResponse> {
        let mut surface = image::load_from_memory(request.image.bytes())
            .map_err(map_image_error)?
            .into_rgba8();
        let (r, g, b) = color_from_instruction(&request.instruction);
        for pixel in surface.pixels_mut() {
            let Rgba([pr, pg, pb, pa]) = *pixel;
            *pixel = Rgba([blend(pr, r), blend(pg, g), blend(pb, b), pa]);
        }
        let image = encode_png(&surface)?;

        Ok(EditResponse {
            image,
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "model": request.model,
                "instruction_fingerprint": instruction_fingerprint(&request.instruction),
                "image_bytes": request.image.len(),
            })),
            warnings: Vec::new(),
        })
    }
}

fn blend(source: u8, tint: u8) -> u8 {
    ((u16::from(source) * 3 + u16::from(tint)) / 4) as u8
}

fn color_from_instruction(instruction: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(instruction.trim().as_bytes());
    (digest[0], digest[1], digest[2])
}

fn instruction_fingerprint(instruction: &str) -> String {
    let digest = Sha256::digest(instruction.trim().as_bytes());
    hex::encode(&digest[..6])
}

fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use photoedit_contracts::EditorError;

    use super::{color_from_instruction, DryrunProvider};
    use crate::providers::{EditRequest, ImageEditProvider};
    use crate::raster::RasterBuffer;
    use crate::render::encode_png;

    fn request(instruction: &str) -> anyhow::Result<EditRequest> {
        let surface = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 0, 180]));
        Ok(EditRequest {
            image: encode_png(&surface)?,
            instruction: instruction.to_string(),
            model: "dryrun".to_string(),
        })
    }

    #[test]
    fn tints_towards_instruction_colour_and_keeps_geometry() -> anyhow::Result<()> {
        let response = DryrunProvider.edit(&request("add a rainbow")?)?;
        let edited = image::load_from_memory(response.image.bytes())?.into_rgba8();
        assert_eq!(edited.dimensions(), (3, 2));

        let (r, g, b) = color_from_instruction("add a rainbow");
        let expected = Rgba([
            ((200u16 * 3 + u16::from(r)) / 4) as u8,
            ((100u16 * 3 + u16::from(g)) / 4) as u8,
            (u16::from(b) / 4) as u8,
            180,
        ]);
        assert!(edited.pixels().all(|pixel| *pixel == expected));
        assert_eq!(response.provider_request["endpoint"], "dryrun-native");
        Ok(())
    }

    #[test]
    fn same_instruction_gives_same_bytes() -> anyhow::Result<()> {
        let first = DryrunProvider.edit(&request("warmer")?)?;
        let second = DryrunProvider.edit(&request("warmer")?)?;
        assert_eq!(first.image.bytes(), second.image.bytes());
        Ok(())
    }

    #[test]
    fn undecodable_input_is_a_decode_error() {
        let request = EditRequest {
            image: RasterBuffer::png(b"not an image".to_vec()),
            instruction: "anything".to_string(),
            model: "dryrun".to_string(),
        };
        let err = DryrunProvider.edit(&request).unwrap_err();
        assert!(matches!(
            err,
            EditorError::DecodeFailure(_) | EditorError::UnsupportedFormat(_)
        ));
    }
}
