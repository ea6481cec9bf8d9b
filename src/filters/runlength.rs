//! `RunLengthDecode`: control byte `b` — `0..=127` copies `b+1`
//! literal bytes; `129..=255` repeats the next byte `257-b` times;
//! `128` is EOD.

use crate::error::{FilterError, Result};

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let control = data[i];
        i += 1;
        match control {
            0..=127 => {
                let count = control as usize + 1;
                let end = i + count;
                if end > data.len() {
                    return Err(FilterError::Malformed.into());
                }
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            128 => break,
            _ => {
                let count = 257 - control as usize;
                let byte = *data.get(i).ok_or(FilterError::Malformed)?;
                out.extend(std::iter::repeat(byte).take(count));
                i += 1;
            }
        }
    }
    Ok(out)
}

pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 1);
    let mut i = 0;
    while i < data.len() {
        // Look for a run of identical bytes first.
        let run_len = data[i..].iter().take_while(|&&b| b == data[i]).count();
        if run_len >= 2 {
            let run_len = run_len.min(128);
            out.push((257 - run_len) as u8);
            out.push(data[i]);
            i += run_len;
            continue;
        }
        // Otherwise accumulate a literal span up to the next run.
        let mut span = 1;
        while i + span < data.len() && span < 128 {
            let remaining = &data[i + span..];
            let next_run = remaining.iter().take_while(|&&b| b == remaining[0]).count();
            if next_run >= 2 {
                break;
            }
            span += 1;
        }
        out.push((span - 1) as u8);
        out.extend_from_slice(&data[i..i + span]);
        i += span;
    }
    out.push(128);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_data() {
        let plain = b"AAAAAAAAAABBBBBBBCCCCCCCCDDeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee".to_vec();
        let encoded = encode(&plain);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn literal_bytes_round_trip() {
        let plain = b"abcdefg".to_vec();
        let encoded = encode(&plain);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, plain);
    }
}
