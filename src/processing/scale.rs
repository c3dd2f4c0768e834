//! Plane scaling

use crate::error::{Error, Result};

/// Nearest-neighbour resize of a single 8-bit plane
pub fn scale_plane(
    input: &[u8],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> Result<Vec<u8>> {
    let src_w = src_width as usize;
    let src_h = src_height as usize;
    let dst_w = dst_width as usize;
    let dst_h = dst_height as usize;

    if input.len() < src_w * src_h {
        return Err(Error::Decode("Plane buffer too small".into()));
    }
    if src_w == dst_w && src_h == dst_h {
        return Ok(input[..src_w * src_h].to_vec());
    }
    if dst_w == 0 || dst_h == 0 {
        return Ok(Vec::new());
    }

    let mut output = vec![0u8; dst_w * dst_h];

    for y in 0..dst_h {
        let src_y = y * src_h / dst_h;
        let src_row = src_y * src_w;
        let dst_row = y * dst_w;
        for x in 0..dst_w {
            let src_x = x * src_w / dst_w;
            output[dst_row + x] = input[src_row + src_x];
        }
    }

    Ok(output)
}
