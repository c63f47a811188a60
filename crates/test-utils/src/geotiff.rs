//! Minimal single-band GeoTIFF writer for fixture files.
//!
//! Writes Float32 data with the model pixel scale, tiepoint, GeoKey
//! directory and GDAL nodata tags that readers look for.

use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Extent of a fixture raster as (min_x, min_y, max_x, max_y).
pub type Extent = (f64, f64, f64, f64);

fn write_to<W: Write + Seek>(
    writer: W,
    width: u32,
    height: u32,
    extent: Extent,
    epsg: u16,
    data: &[f32],
    nodata: Option<f64>,
) {
    assert_eq!(data.len(), (width * height) as usize, "data must fill the grid");

    let (min_x, min_y, max_x, max_y) = extent;
    let scale = [
        (max_x - min_x) / width as f64,
        (max_y - min_y) / height as f64,
        0.0,
    ];
    let tiepoint = [0.0, 0.0, 0.0, min_x, max_y, 0.0];
    let geographic = matches!(epsg, 4326 | 4269);
    let geokeys: Vec<u16> = vec![
        1, 1, 0, 3,
        1024, 0, 1, if geographic { 2 } else { 1 },
        1025, 0, 1, 1,
        if geographic { 2048 } else { 3072 }, 0, 1, epsg,
    ];

    let mut encoder = TiffEncoder::new(writer).expect("create tiff encoder");
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(width, height)
        .expect("create tiff image");

    let tags = image.encoder();
    tags.write_tag(Tag::Unknown(33550), &scale[..]).expect("write scale");
    tags.write_tag(Tag::Unknown(33922), &tiepoint[..]).expect("write tiepoint");
    tags.write_tag(Tag::Unknown(34735), geokeys.as_slice()).expect("write geokeys");
    if let Some(nodata) = nodata {
        let text = nodata.to_string();
        tags.write_tag(Tag::Unknown(42113), text.as_str()).expect("write nodata");
    }

    image.write_data(data).expect("write pixels");
}

/// Encode a single-band GeoTIFF into memory.
pub fn geotiff_bytes(
    width: u32,
    height: u32,
    extent: Extent,
    epsg: u16,
    data: &[f32],
    nodata: Option<f64>,
) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_to(&mut cursor, width, height, extent, epsg, data, nodata);
    cursor.into_inner()
}

/// Write a single-band GeoTIFF to `path`.
pub fn write_test_geotiff(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    extent: Extent,
    epsg: u16,
    data: &[f32],
    nodata: Option<f64>,
) {
    let bytes = geotiff_bytes(width, height, extent, epsg, data, nodata);
    std::fs::write(path, bytes).expect("write fixture file");
}

/// Write a GeoTIFF into a fresh temporary directory. Keep the returned
/// directory alive for as long as the file is needed.
pub fn temp_geotiff(
    width: u32,
    height: u32,
    extent: Extent,
    epsg: u16,
    data: &[f32],
    nodata: Option<f64>,
) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("fixture.tif");
    write_test_geotiff(&path, width, height, extent, epsg, data, nodata);
    (dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geotiff_bytes_are_tiff() {
        let bytes = geotiff_bytes(2, 2, (0.0, 0.0, 2.0, 2.0), 4326, &[1.0, 2.0, 3.0, 4.0], None);
        assert!(bytes.starts_with(b"II") || bytes.starts_with(b"MM"));
    }

    #[test]
    fn test_temp_geotiff_exists() {
        let (_dir, path) = temp_geotiff(1, 1, (0.0, 0.0, 1.0, 1.0), 4326, &[5.0], Some(-9999.0));
        assert!(path.exists());
    }
}
