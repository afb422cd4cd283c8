/// Minimal CBOR scanning, enough to find the body inside a submitted transaction

/// Encoded length of the first data item in `bytes`
pub fn item_len(bytes: &[u8]) -> Option<usize> {
    let (major, arg, header) = header(bytes)?;
    match major {
        0 | 1 | 7 => Some(header),
        2 | 3 => {
            let end = header.checked_add(usize::try_from(arg).ok()?)?;
            (end <= bytes.len()).then_some(end)
        }
        4 | 5 => {
            let items = if major == 5 { arg.checked_mul(2)? } else { arg };
            let mut offset = header;
            for _ in 0..items {
                offset += item_len(bytes.get(offset..)?)?;
            }
            Some(offset)
        }
        6 => Some(header + item_len(bytes.get(header..)?)?),
        _ => None,
    }
}

/// Returns (major type, argument, header length)
fn header(bytes: &[u8]) -> Option<(u8, u64, usize)> {
    let first = *bytes.first()?;
    let major = first >> 5;
    let info = first & 0x1f;

    let (arg, len) = match info {
        0..=23 => (info as u64, 1),
        24 => (*bytes.get(1)? as u64, 2),
        25 => (u16::from_be_bytes(bytes.get(1..3)?.try_into().ok()?) as u64, 3),
        26 => (u32::from_be_bytes(bytes.get(1..5)?.try_into().ok()?) as u64, 5),
        27 => (u64::from_be_bytes(bytes.get(1..9)?.try_into().ok()?), 9),
        _ => return None,
    };
    Some((major, arg, len))
}

/// Body of a `[body, witnesses, valid, aux]` transaction
pub fn transaction_body(tx: &[u8]) -> Option<&[u8]> {
    if *tx.first()? != 0x84 {
        return None;
    }
    let len = item_len(tx.get(1..)?)?;
    tx.get(1..1 + len)
}
