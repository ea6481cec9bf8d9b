//! PNG and TIFF predictors, applied after Flate/LZW decompression and
//! undone before re-compression. `/Predictor` values: 1 = none,
//! 2 = TIFF horizontal differencing, >=10 = PNG (per-row filter-type
//! byte chosen by the encoder, inverted by tag on decode).

use crate::dictionary::Dictionary;
use crate::error::{FilterError, Result};
use crate::object::Object;

struct Params {
    predictor: i64,
    colors: usize,
    bits_per_component: usize,
    columns: usize,
}

fn read_params(dict: Option<&Dictionary>) -> Params {
    let get_i64 = |key: &[u8], default: i64| -> i64 {
        dict.and_then(|d| d.get(key).ok()).and_then(|o| o.as_i64().ok()).unwrap_or(default)
    };
    Params {
        predictor: get_i64(b"Predictor", 1),
        colors: get_i64(b"Colors", 1).max(1) as usize,
        bits_per_component: get_i64(b"BitsPerComponent", 8).max(1) as usize,
        columns: get_i64(b"Columns", 1).max(1) as usize,
    }
}

fn bytes_per_pixel(p: &Params) -> usize {
    ((p.colors * p.bits_per_component) as f64 / 8.0).ceil() as usize
}

fn row_stride(p: &Params) -> usize {
    ((p.colors * p.bits_per_component * p.columns) as f64 / 8.0).ceil() as usize
}

/// Invert the predictor transform after decompression.
pub fn undo(dict: Option<&Dictionary>, data: Vec<u8>) -> Result<Vec<u8>> {
    let params = read_params(dict);
    match params.predictor {
        1 => Ok(data),
        2 => Ok(undo_tiff(&params, &data)),
        10..=15 => undo_png(&params, &data),
        _ => Err(FilterError::BadPredictor.into()),
    }
}

/// Apply the predictor transform before (re-)compression.
pub fn apply(dict: Option<&Dictionary>, data: &[u8]) -> Result<Vec<u8>> {
    let params = read_params(dict);
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(apply_tiff(&params, data)),
        10..=15 => Ok(apply_png(&params, data)),
        _ => Err(FilterError::BadPredictor.into()),
    }
}

fn undo_tiff(p: &Params, data: &[u8]) -> Vec<u8> {
    if p.bits_per_component != 8 {
        // Sub-byte TIFF prediction is rare in the wild; treat as
        // already-plain rather than corrupting the bitstream.
        return data.to_vec();
    }
    let bpp = bytes_per_pixel(p);
    let stride = row_stride(p);
    let mut out = data.to_vec();
    for row in out.chunks_mut(stride) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    out
}

fn apply_tiff(p: &Params, data: &[u8]) -> Vec<u8> {
    if p.bits_per_component != 8 {
        return data.to_vec();
    }
    let bpp = bytes_per_pixel(p);
    let stride = row_stride(p);
    let mut out = data.to_vec();
    for row in out.chunks_mut(stride) {
        for i in (bpp..row.len()).rev() {
            row[i] = row[i].wrapping_sub(row[i - bpp]);
        }
    }
    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i32, b as i32, c as i32);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn undo_png(p: &Params, data: &[u8]) -> Result<Vec<u8>> {
    let bpp = bytes_per_pixel(p).max(1);
    let stride = row_stride(p);
    let row_len = stride + 1; // leading filter-type byte
    if row_len == 1 || data.len() % row_len != 0 {
        return Err(FilterError::BadPredictor.into());
    }
    let rows = data.len() / row_len;
    let mut out = vec![0u8; rows * stride];
    let mut prev_row = vec![0u8; stride];

    for r in 0..rows {
        let src = &data[r * row_len..(r + 1) * row_len];
        let filter_type = src[0];
        let src_row = &src[1..];
        let dst_start = r * stride;

        for i in 0..stride {
            let a = if i >= bpp { out[dst_start + i - bpp] } else { 0 };
            let b = prev_row[i];
            let c = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let x = src_row[i];
            out[dst_start + i] = match filter_type {
                0 => x,
                1 => x.wrapping_add(a),
                2 => x.wrapping_add(b),
                3 => x.wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => x.wrapping_add(paeth(a, b, c)),
                _ => return Err(FilterError::BadPredictor.into()),
            };
        }
        prev_row.copy_from_slice(&out[dst_start..dst_start + stride]);
    }
    Ok(out)
}

fn apply_png(p: &Params, data: &[u8]) -> Vec<u8> {
    // Encode with the "None" filter type on every row. This is always
    // a valid PNG-predicted stream (decoders must support it) even
    // though it forgoes the compression benefit Up/Paeth would give;
    // matching a specific encoder's row-by-row filter heuristic isn't
    // required for round-trip correctness.
    let stride = row_stride(p);
    if stride == 0 {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len() + data.len() / stride.max(1) + 1);
    for row in data.chunks(stride) {
        out.push(0u8);
        out.extend_from_slice(row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parms(predictor: i64, colors: i64, bpc: i64, columns: i64) -> Dictionary {
        let mut d = Dictionary::new();
        d.set(b"Predictor".to_vec(), Object::Integer(predictor));
        d.set(b"Colors".to_vec(), Object::Integer(colors));
        d.set(b"BitsPerComponent".to_vec(), Object::Integer(bpc));
        d.set(b"Columns".to_vec(), Object::Integer(columns));
        d
    }

    #[test]
    fn png_predictor_round_trips() {
        let params = parms(15, 3, 8, 4);
        let plain: Vec<u8> = (0..36u8).collect();
        let predicted = apply(Some(&params), &plain).unwrap();
        let restored = undo(Some(&params), predicted).unwrap();
        assert_eq!(restored, plain);
    }

    #[test]
    fn tiff_predictor_round_trips() {
        let params = parms(2, 1, 8, 8);
        let plain: Vec<u8> = vec![10, 20, 15, 5, 200, 3, 90, 91];
        let predicted = apply(Some(&params), &plain).unwrap();
        let restored = undo(Some(&params), predicted).unwrap();
        assert_eq!(restored, plain);
    }
}
