/// Textures uploaded from decoded pixel buffers
use crate::context::{GraphicsContext, TextureHandle};
use crate::error::{RenderError, Result};

/// A decoded 8-bit RGBA image supplied by the image-decoding collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(RenderError::ImageSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self { width, height, rgba })
    }

    /// A single-color image, handy as a placeholder
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, rgba }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }
}

/// A texture living on the GPU. Mipmapped, linearly filtered, repeating.
#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    width: u32,
    height: u32,
}

impl Texture {
    pub fn new(ctx: &mut dyn GraphicsContext, image: &TextureImage) -> Result<Self> {
        let handle = ctx.create_texture(image).map_err(RenderError::Resource)?;
        log::debug!(
            "uploaded {}x{} texture as {:?}",
            image.width(),
            image.height(),
            handle
        );
        Ok(Self {
            handle,
            width: image.width(),
            height: image.height(),
        })
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn release(self, ctx: &mut dyn GraphicsContext) {
        ctx.delete_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContext;

    #[test]
    fn test_rejects_short_pixel_buffer() {
        let err = TextureImage::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ImageSize {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn test_upload_and_release() {
        let mut ctx = HeadlessContext::new();
        let texture = Texture::new(&mut ctx, &TextureImage::solid(4, 2, [255, 0, 0, 255])).unwrap();
        assert_eq!(texture.size(), (4, 2));
        assert_eq!(ctx.live_resources(), 1);
        texture.release(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }
}
