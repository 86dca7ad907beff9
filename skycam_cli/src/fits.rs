use allsky340::Image;
use std::io::{self, Write};

const RECORD: usize = 2880;
const CARD: usize = 80;
/// Unsigned 16 bit pixels are stored as signed with this offset
const BZERO: i32 = 32768;

pub enum Value<'a> {
    Logical(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
}

/// One 80 column header card, values in fixed format
pub fn card(keyword: &str, value: Value, comment: &str) -> String {
    let value = match value {
        Value::Logical(b) => format!("{:>20}", if b { "T" } else { "F" }),
        Value::Int(i) => format!("{:>20}", i),
        Value::Float(f) => format!("{:>20}", format!("{:.6}", f)),
        Value::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
    };
    let mut card = format!("{:<8}= {}", keyword, value);
    if !comment.is_empty() {
        card.push_str(" / ");
        card.push_str(comment);
    }
    card.truncate(CARD);
    format!("{:<80}", card)
}

/// Writes `image` as a single primary HDU, row 0 first
pub fn write_fits<W: Write>(out: &mut W, image: &Image, extra_cards: &[String]) -> io::Result<()> {
    let mut header = vec![
        card("SIMPLE", Value::Logical(true), "conforms to FITS standard"),
        card("BITPIX", Value::Int(16), "array data type"),
        card("NAXIS", Value::Int(2), "number of array dimensions"),
        card("NAXIS1", Value::Int(image.cols() as i64), ""),
        card("NAXIS2", Value::Int(image.rows() as i64), ""),
        card("BZERO", Value::Int(BZERO as i64), "offset data range to that of unsigned short"),
        card("BSCALE", Value::Int(1), "default scaling factor"),
    ];
    header.extend(extra_cards.iter().cloned());
    header.push(format!("{:<80}", "END"));

    let mut header = header.concat().into_bytes();
    header.resize(padded(header.len()), b' ');
    out.write_all(&header)?;

    let mut data: Vec<u8> = image
        .pixels()
        .iter()
        .flat_map(|p| ((*p as i32 - BZERO) as i16).to_be_bytes())
        .collect();
    data.resize(padded(data.len()), 0);
    out.write_all(&data)
}

fn padded(len: usize) -> usize {
    (len + RECORD - 1) / RECORD * RECORD
}

#[cfg(test)]
mod tests {
    use super::*;
    use allsky340::Crop;
    use pretty_assertions::assert_eq;

    #[test]
    fn card_layout() {
        let simple = card("SIMPLE", Value::Logical(true), "");
        assert_eq!(simple.len(), 80);
        assert_eq!(&simple[..30], "SIMPLE  =                    T");

        let exptime = card("EXPTIME", Value::Float(60.0), "Exposure time (s)");
        assert_eq!(
            exptime.trim_end(),
            "EXPTIME =            60.000000 / Exposure time (s)"
        );

        let date = card("DATE-OBS", Value::Str("2013/01/14"), "");
        assert_eq!(date.trim_end(), "DATE-OBS= '2013/01/14'");
        assert_eq!(card("IMAGETYP", Value::Str("it's"), "").trim_end(), "IMAGETYP= 'it''s   '");
    }

    #[test]
    fn fits_layout() {
        let mut raw = vec![0u8; Crop::Cropped.pixel_count() * 2];
        // Last scanned pixel becomes the first pixel of row 0
        let last = raw.len() - 1024;
        raw[last] = 0x00;
        raw[last + 1] = 0x80;
        let image = Image::decode(&raw, Crop::Cropped).unwrap();

        let mut out = Vec::new();
        write_fits(&mut out, &image, &[card("EXPTIME", Value::Float(1.0), "")]).unwrap();
        assert_eq!(out.len() % RECORD, 0);
        assert_eq!(out.len(), RECORD + padded(245_760 * 2));

        let header = std::str::from_utf8(&out[..RECORD]).unwrap();
        assert!(header.contains("NAXIS1  =                  512"));
        assert!(header.contains("NAXIS2  =                  480"));
        assert!(header.contains("EXPTIME ="));
        assert!(header.contains(&format!("{:<80}", "END")));

        // 0x8000 - 32768 = 0, 0 - 32768 = i16::MIN
        assert_eq!(&out[RECORD..RECORD + 4], &[0x00, 0x00, 0x80, 0x00]);
    }
}
