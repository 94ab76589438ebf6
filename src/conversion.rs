//! Decoded picture to packed 24-bit raster conversion.
//!
//! [`PixelBuffer`] is the caller-visible output raster: packed 24-bit
//! pixels, the same size as the video, with a row stride that may exceed
//! `width * 3`. [`PixelConverter`] wraps a backend
//! [`PictureConverter`] and checks every output buffer against the session's
//! dimensions before handing it over.

use image::RgbImage;

use crate::{backend::PictureConverter, config::ChannelOrder, error::FrameSeekError};

/// Bytes per output pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// A packed 24-bit output raster.
///
/// # Example
///
/// ```
/// use frameseek::PixelBuffer;
///
/// let buffer = PixelBuffer::with_stride(4, 2, 16)?;
/// assert_eq!(buffer.as_bytes().len(), 32);
/// assert_eq!(buffer.row(1).map(<[u8]>::len), Some(12));
/// # Ok::<(), frameseek::FrameSeekError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    channel_order: ChannelOrder,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer with tightly packed rows.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride,
            channel_order: ChannelOrder::Rgb,
            data: vec![0; stride * height as usize],
        }
    }

    /// Allocate a zeroed buffer whose rows are `stride` bytes apart.
    ///
    /// # Errors
    ///
    /// Returns [`FrameSeekError::InvalidStride`] if `stride` cannot hold one
    /// row of packed pixels.
    pub fn with_stride(width: u32, height: u32, stride: usize) -> Result<Self, FrameSeekError> {
        let minimum = width as usize * BYTES_PER_PIXEL;
        if stride < minimum {
            return Err(FrameSeekError::InvalidStride { stride, minimum });
        }

        Ok(Self {
            width,
            height,
            stride,
            channel_order: ChannelOrder::Rgb,
            data: vec![0; stride * height as usize],
        })
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Distance between the starts of two rows, in bytes.
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Byte order of the pixels last written into this buffer.
    pub const fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    /// The raw raster, row padding included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw raster, row padding included.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The packed pixels of row `y`, without padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data
            .get(start..start + self.width as usize * BYTES_PER_PIXEL)
    }

    /// The pixel at `(x, y)` as `[red, green, blue]`, whatever the channel
    /// order of the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width {
            return None;
        }
        let start = x as usize * BYTES_PER_PIXEL;
        let bytes = self.row(y)?.get(start..start + BYTES_PER_PIXEL)?;
        let [red, green, blue] = self.channel_order.offsets();
        Some([bytes[red], bytes[green], bytes[blue]])
    }

    /// Copy the raster into an [`RgbImage`], stripping row padding and
    /// restoring RGB order.
    pub fn to_rgb_image(&self) -> RgbImage {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let mut packed = vec![0; row_bytes * self.height as usize];
        crate::utilities::copy_rows(
            &self.data,
            self.stride,
            &mut packed,
            row_bytes,
            row_bytes,
            self.height as usize,
        );

        if self.channel_order == ChannelOrder::Bgr {
            for pixel in packed.chunks_exact_mut(BYTES_PER_PIXEL) {
                pixel.swap(0, 2);
            }
        }

        RgbImage::from_fn(self.width, self.height, |x, y| {
            let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            image::Rgb([packed[start], packed[start + 1], packed[start + 2]])
        })
    }
}

/// Converts the session's decoded picture into caller buffers.
///
/// The conversion never scales: output buffers must have the session's
/// width and height.
pub(crate) struct PixelConverter<C: PictureConverter> {
    inner: C,
    width: u32,
    height: u32,
    channel_order: ChannelOrder,
}

impl<C: PictureConverter> PixelConverter<C> {
    pub(crate) const fn new(inner: C, width: u32, height: u32, channel_order: ChannelOrder) -> Self {
        Self {
            inner,
            width,
            height,
            channel_order,
        }
    }

    pub(crate) fn convert(
        &mut self,
        picture: &C::Picture,
        output: &mut PixelBuffer,
    ) -> Result<(), FrameSeekError> {
        if output.width != self.width || output.height != self.height {
            return Err(FrameSeekError::BufferMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: output.width,
                actual_height: output.height,
            });
        }

        let stride = output.stride;
        self.inner
            .convert(picture, &mut output.data, stride)
            .map_err(|error| FrameSeekError::Conversion(error.to_string()))?;
        output.channel_order = self.channel_order;
        Ok(())
    }
}
