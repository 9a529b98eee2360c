//! EXIF extraction for the metadata panel

use crate::domain::{ExifData, PhotoGroup};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Reads the camera metadata of a JPEG or TIFF-based RAW file.
///
/// Returns `None` when the file cannot be opened or carries no EXIF block.
/// Individual fields the camera did not write stay `None`.
pub fn read_exif(path: &Path) -> Option<ExifData> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            trace!(path = %path.display(), error = %e, "no EXIF");
            return None;
        }
    };

    Some(ExifData {
        shutter_speed: field(&exif, Tag::ExposureTime).and_then(|f| shutter_speed(&exif, f)),
        aperture: field(&exif, Tag::FNumber)
            .and_then(first_rational)
            .map(format_aperture),
        iso: field(&exif, Tag::PhotographicSensitivity).map(|f| display(&exif, f)),
        focal_length: field(&exif, Tag::FocalLength)
            .and_then(first_rational)
            .map(format_focal_length),
        date_time: field(&exif, Tag::DateTime).map(|f| display(&exif, f)),
        model: field(&exif, Tag::Model).map(|f| display(&exif, f)),
        lens: field(&exif, Tag::LensModel).and_then(|f| lens_model(&exif, f)),
    })
}

/// Attaches EXIF to a freshly imported group, preferring the JPEG half and
/// falling back to the RAW half.
pub fn attach_exif(group: PhotoGroup) -> PhotoGroup {
    let exif = group.assets().find_map(|asset| read_exif(asset.path()));
    group.with_exif(exif)
}

fn field(exif: &Exif, tag: Tag) -> Option<&Field> {
    exif.get_field(tag, In::PRIMARY)
}

fn display(exif: &Exif, field: &Field) -> String {
    field
        .display_value()
        .with_unit(exif)
        .to_string()
        .trim_matches('"')
        .to_string()
}

fn first_rational(field: &Field) -> Option<f64> {
    match field.value {
        Value::Rational(ref vals) => vals
            .first()
            .filter(|v| v.denom != 0)
            .map(|v| f64::from(v.num) / f64::from(v.denom)),
        _ => None,
    }
}

fn shutter_speed(exif: &Exif, field: &Field) -> Option<String> {
    match field.value {
        Value::Rational(_) => first_rational(field).and_then(format_exposure),
        _ => Some(display(exif, field)),
    }
}

fn lens_model(exif: &Exif, field: &Field) -> Option<String> {
    let lens = match field.value {
        Value::Ascii(ref parts) => parts
            .iter()
            .filter_map(|bytes| std::str::from_utf8(bytes).ok())
            .map(clean_lens)
            .find(|s| !s.is_empty())?,
        _ => {
            let shown = display(exif, field);
            clean_lens(shown.split(',').next().unwrap_or_default())
        }
    };
    (!lens.is_empty()).then_some(lens)
}

fn clean_lens(raw: &str) -> String {
    raw.trim_matches('\0').trim().trim_matches('"').to_string()
}

/// `1/250` below one second, `2.5s` otherwise.
pub fn format_exposure(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    if seconds >= 1.0 {
        Some(format!("{:.1}s", seconds))
    } else {
        Some(format!("1/{}", (1.0 / seconds).round() as u32))
    }
}

pub fn format_aperture(f_number: f64) -> String {
    format!("f/{:.1}", f_number)
}

pub fn format_focal_length(mm: f64) -> String {
    format!("{:.0}mm", mm)
}

#[cfg(test)]
pub(crate) mod testing {
    use exif::experimental::Writer;
    use exif::{Field, In, Tag, Value};
    use std::io::Cursor;
    use std::path::Path;

    /// Writes a bare TIFF carrying only a camera model tag. The EXIF reader
    /// sniffs the container, so any extension works.
    pub fn write_model_tag(path: &Path, model: &str) {
        let field = Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![model.as_bytes().to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&field);
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        std::fs::write(path, buf.into_inner()).unwrap();
    }
}
