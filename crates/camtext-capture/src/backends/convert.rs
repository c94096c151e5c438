use camtext_types::{Frame, FrameResult, PixelFormat};

/// Packs tightly laid out RGBA pixels into a frame of the session's pixel format.
pub(crate) fn rgba_to_frame(
    rgba: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> FrameResult<Frame> {
    match format {
        PixelFormat::Bgra => {
            let mut data = Vec::with_capacity(rgba.len());
            for pixel in rgba.chunks_exact(4) {
                data.extend_from_slice(&[pixel[2], pixel[1], pixel[0], pixel[3]]);
            }
            Frame::from_bgra_owned(width, height, width as usize * 4, None, data)
        }
        PixelFormat::Nv12 => {
            let w = width as usize;
            let h = height as usize;
            // Interleaved CbCr pairs need an even row length.
            let stride = w + (w & 1);
            let chroma_rows = h.div_ceil(2);
            let mut data = vec![128u8; stride * (h + chroma_rows)];
            let (luma, chroma) = data.split_at_mut(stride * h);

            for (index, pixel) in rgba.chunks_exact(4).take(w * h).enumerate() {
                let (y, _, _) = bt601(pixel[0], pixel[1], pixel[2]);
                luma[(index / w) * stride + index % w] = y;
            }

            for cy in 0..chroma_rows {
                for cx in 0..stride / 2 {
                    let mut u_sum = 0u32;
                    let mut v_sum = 0u32;
                    let mut count = 0u32;
                    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let px = cx * 2 + dx;
                        let py = cy * 2 + dy;
                        if px >= w || py >= h {
                            continue;
                        }
                        let offset = (py * w + px) * 4;
                        let (_, u, v) = bt601(rgba[offset], rgba[offset + 1], rgba[offset + 2]);
                        u_sum += u as u32;
                        v_sum += v as u32;
                        count += 1;
                    }
                    if count > 0 {
                        let base = cy * stride + cx * 2;
                        chroma[base] = (u_sum / count) as u8;
                        chroma[base + 1] = (v_sum / count) as u8;
                    }
                }
            }
            Frame::from_nv12_owned(width, height, stride, None, data)
        }
    }
}

/// Studio-swing BT.601 conversion.
fn bt601(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}
