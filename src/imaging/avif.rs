//! HEIF-container decode for AV1-coded images.
//!
//! The `image` crate's `"avif"` feature only provides the encoder (rav1e);
//! its decoder needs the C library dav1d. Instead the container is parsed
//! with `avif-parse` and the AV1 payload decoded with `rav1d`, the pure
//! Rust port of dav1d.
//!
//! HEVC-coded HEIC files share the container but have no pure-Rust
//! decoder; they fail at the AV1 decode step.
//!
//! An auxiliary alpha item, when present, is decoded separately and merged
//! into an RGBA image.

use super::backend::BackendError;
use image::{DynamicImage, RgbImage, RgbaImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::{Dav1dContext, Dav1dSettings};
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;
use std::ptr::NonNull;

fn failed(message: impl Into<String>) -> BackendError {
    BackendError::ProcessingFailed(message.into())
}

/// Owns an open rav1d context and closes it on drop.
struct Decoder {
    ctx: Option<Dav1dContext>,
}

impl Decoder {
    fn open() -> Result<Self, BackendError> {
        let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
        let settings_ptr = NonNull::new(settings.as_mut_ptr())
            .ok_or_else(|| failed("rav1d settings pointer is null"))?;
        unsafe { dav1d::dav1d_default_settings(settings_ptr) };
        let mut settings = unsafe { settings.assume_init() };
        settings.n_threads = 1;
        settings.max_frame_delay = 1;

        let mut ctx = None;
        let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
        if rc.0 != 0 {
            return Err(failed(format!("rav1d open failed ({})", rc.0)));
        }
        Ok(Self { ctx })
    }

    /// Feed one complete AV1 item and pull the single decoded picture.
    fn decode_still(&mut self, av1: &[u8]) -> Result<Picture, BackendError> {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(failed("rav1d data_create failed"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d::dav1d_send_data(self.ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(failed(format!("rav1d send_data failed ({})", rc.0)));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d::dav1d_get_picture(self.ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(failed(format!("rav1d get_picture failed ({})", rc.0)));
        }
        Ok(Picture { pic })
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        unsafe { dav1d::dav1d_close(NonNull::new(&mut self.ctx)) };
    }
}

/// A decoded picture, unreferenced on drop.
struct Picture {
    pic: Dav1dPicture,
}

impl Picture {
    fn dimensions(&self) -> (u32, u32) {
        (self.pic.p.w as u32, self.pic.p.h as u32)
    }

    /// The luma plane as 8-bit samples. Alpha items are coded this way.
    fn to_luma(&self) -> Result<Vec<u8>, BackendError> {
        let p = &self.pic;
        let (width, height) = self.dimensions();
        let y_ptr = p.data[0]
            .ok_or_else(|| failed("decoded AV1 alpha has no luma plane"))?
            .as_ptr() as *const u8;
        let bpc = p.p.bpc as u32;
        let scale = 255.0 / ((1u32 << bpc) - 1) as f32;

        let mut luma = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            for col in 0..width {
                let v = sample(y_ptr, p.stride[0], col, row, bpc) * scale;
                luma.push(v.round().clamp(0.0, 255.0) as u8);
            }
        }
        Ok(luma)
    }

    fn to_rgb(&self) -> Result<RgbImage, BackendError> {
        let p = &self.pic;
        let width = p.p.w as u32;
        let height = p.p.h as u32;
        let layout = p.p.layout;

        let y_ptr = p.data[0]
            .ok_or_else(|| failed("decoded AV1 picture has no luma plane"))?
            .as_ptr() as *const u8;

        let (u_ptr, v_ptr, ss_x, ss_y, monochrome) = if layout == DAV1D_PIXEL_LAYOUT_I400 {
            (y_ptr, y_ptr, false, false, true)
        } else {
            let (ss_x, ss_y) = match layout {
                DAV1D_PIXEL_LAYOUT_I420 => (true, true),
                DAV1D_PIXEL_LAYOUT_I422 => (true, false),
                DAV1D_PIXEL_LAYOUT_I444 => (false, false),
                other => return Err(failed(format!("Unsupported AV1 pixel layout: {other}"))),
            };
            let plane = |i: usize| {
                p.data[i]
                    .map(|ptr| ptr.as_ptr() as *const u8)
                    .ok_or_else(|| failed("decoded AV1 picture is missing a chroma plane"))
            };
            (plane(1)?, plane(2)?, ss_x, ss_y, false)
        };

        let planes = YuvPlanes {
            y_ptr,
            u_ptr,
            v_ptr,
            y_stride: p.stride[0],
            uv_stride: if monochrome { 0 } else { p.stride[1] },
            bpc: p.p.bpc as u32,
            ss_x,
            ss_y,
            monochrome,
        };

        RgbImage::from_raw(width, height, planes.to_rgb(width, height))
            .ok_or_else(|| failed("decoded AV1 buffer does not match its dimensions"))
    }
}

impl Drop for Picture {
    fn drop(&mut self) {
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut self.pic)) };
    }
}

/// Borrowed YUV plane pointers from a live [`Picture`].
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (e.g. I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self, width: u32, height: u32) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            for col in 0..width {
                let luma = sample(self.y_ptr, self.y_stride, col, row, self.bpc);
                let [r, g, b] = if self.monochrome {
                    let v = (luma * scale).clamp(0.0, 255.0);
                    [v, v, v]
                } else {
                    let c_col = if self.ss_x { col / 2 } else { col };
                    let c_row = if self.ss_y { row / 2 } else { row };
                    let cb = sample(self.u_ptr, self.uv_stride, c_col, c_row, self.bpc) - center;
                    let cr = sample(self.v_ptr, self.uv_stride, c_col, c_row, self.bpc) - center;
                    [
                        ((luma + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((luma - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((luma + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    ]
                };
                rgb.extend_from_slice(&[r as u8, g as u8, b as u8]);
            }
        }
        rgb
    }
}

/// One plane sample; 10- and 12-bit content is stored as u16.
#[inline]
fn sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let offset = y as isize * stride + x as isize * 2;
        (unsafe { (ptr.offset(offset) as *const u16).read_unaligned() }) as f32
    }
}

/// Decode the primary item of a HEIF container holding AV1 data.
///
/// Returns RGB8, or RGBA8 when the container carries an alpha item.
pub fn decode_heif_av1(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let container = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| failed(format!("Failed to parse HEIF container: {e:?}")))?;

    let mut decoder = Decoder::open()?;
    let picture = decoder.decode_still(&container.primary_item)?;
    let rgb = picture.to_rgb()?;

    let Some(alpha_item) = container.alpha_item.as_deref() else {
        return Ok(DynamicImage::ImageRgb8(rgb));
    };

    // Separate context: the alpha item is its own AV1 sequence.
    let mut alpha_decoder = Decoder::open()?;
    let alpha_picture = alpha_decoder.decode_still(alpha_item)?;
    if alpha_picture.dimensions() != rgb.dimensions() {
        return Err(failed(format!(
            "alpha item is {:?}, color item is {:?}",
            alpha_picture.dimensions(),
            rgb.dimensions()
        )));
    }
    let alpha = alpha_picture.to_luma()?;
    Ok(DynamicImage::ImageRgba8(merge_alpha(
        &rgb,
        &alpha,
        container.premultiplied_alpha,
    )))
}

/// Attach a row-major alpha plane to `rgb`, undoing premultiplication when
/// the container says color was stored multiplied by alpha.
fn merge_alpha(rgb: &RgbImage, alpha: &[u8], premultiplied: bool) -> RgbaImage {
    let width = rgb.width();
    RgbaImage::from_fn(width, rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let a = alpha[(y * width + x) as usize];
        let unmultiply = |c: u8| match (premultiplied, a) {
            (false, _) => c,
            (true, 0) => 0,
            (true, a) => ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8,
        };
        image::Rgba([unmultiply(r), unmultiply(g), unmultiply(b), a])
    })
}
